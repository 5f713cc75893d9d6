//! Interactive chat loop
//!
//! One session for the whole run. Answers stream to stdout as they arrive;
//! a failed turn prints `[Error] ...` and the loop reads the next line with
//! history unchanged. Ctrl-C or an exit word ends the loop.

use crate::output;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;
use wattwise_common::{Agent, AgentDeps, ConversationSession};

/// What the loop should do after a turn
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run the loop on stdin
pub async fn run(agent: &Agent, deps: &AgentDeps) -> Result<()> {
    let mut session = ConversationSession::new();
    run_on(agent, deps, &mut session, BufReader::new(tokio::io::stdin())).await
}

/// Run the loop on any line source
pub async fn run_on<R>(
    agent: &Agent,
    deps: &AgentDeps,
    session: &mut ConversationSession,
    input: R,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        output::print_prompt()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                debug!("Interrupted at prompt");
                break;
            }
        };

        // EOF
        let Some(line) = line else {
            println!();
            break;
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if output::is_exit_command(text) {
            println!("Goodbye!");
            break;
        }

        if turn(agent, deps, session, text).await? == Flow::Quit {
            break;
        }
    }

    Ok(())
}

/// Stream one answer to stdout; Ctrl-C abandons it
pub async fn turn(
    agent: &Agent,
    deps: &AgentDeps,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Flow> {
    turn_until(agent, deps, session, text, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

/// Stream one answer until it ends or `interrupt` resolves
///
/// `interrupt` is polled across every fragment, so a signal that lands
/// between two fragments still counts.
pub async fn turn_until<F>(
    agent: &Agent,
    deps: &AgentDeps,
    session: &mut ConversationSession,
    text: &str,
    interrupt: F,
) -> Result<Flow>
where
    F: Future<Output = ()>,
{
    output::print_assistant_label()?;

    let mut stream = match agent.run_stream(session, text, deps) {
        Ok(stream) => stream,
        Err(e) => {
            println!();
            output::print_error(&e);
            return Ok(Flow::Continue);
        }
    };

    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            fragment = stream.next() => match fragment {
                Some(Ok(fragment)) => output::print_fragment(&fragment)?,
                Some(Err(e)) => {
                    println!();
                    output::print_error(&e);
                    break;
                }
                None => {
                    println!();
                    break;
                }
            },
            _ = &mut interrupt => {
                // Dropping the stream abandons the turn
                println!("\n{}", "[Interrupted]".yellow());
                return Ok(Flow::Quit);
            }
        }
    }

    println!();
    Ok(Flow::Continue)
}
