//! CLI parsing and chat loop tests

use async_trait::async_trait;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use wattwise_common::llm::{
    Completion, CompletionProvider, CompletionRequest, CompletionStream, ProviderError,
    ScriptedProvider, ScriptedReply, StreamEvent,
};
use wattwise_common::{Agent, AgentDeps, ConversationSession, FactStore, RawFact, StoreError};
use wattwisectl::chat;
use wattwisectl::cli::{Cli, Commands};

struct NoFacts;

#[async_trait]
impl FactStore for NoFacts {
    async fn search(&self, _query: &str) -> Result<Vec<RawFact>, StoreError> {
        Ok(vec![])
    }

    async fn healthcheck(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[test]
fn test_no_subcommand_means_chat() {
    let cli = Cli::try_parse_from(["wattwisectl"]).unwrap();
    assert_eq!(cli.command(), Commands::Chat);
    assert!(!cli.verbose);
}

#[test]
fn test_ask_joins_words_and_global_flags() {
    let cli = Cli::try_parse_from([
        "wattwisectl",
        "ask",
        "how",
        "much",
        "--json",
        "--verbose",
        "--config",
        "/tmp/wattwise.toml",
    ])
    .unwrap();

    assert!(cli.verbose);
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/wattwise.toml")));
    assert_eq!(
        cli.command(),
        Commands::Ask {
            question: vec!["how".to_string(), "much".to_string()],
            json: true,
        }
    );
}

#[test]
fn test_calc_defaults_to_hours() {
    let cli = Cli::try_parse_from([
        "wattwisectl",
        "calc",
        "--appliance",
        "Fridge",
        "--duration",
        "3",
        "--city",
        "Boston",
    ])
    .unwrap();

    match cli.command() {
        Commands::Calc {
            appliance,
            duration,
            unit,
            rate,
            city,
            json,
        } => {
            assert_eq!(appliance, "Fridge");
            assert_eq!(duration, 3.0);
            assert_eq!(unit, "hours/day");
            assert_eq!(rate, None);
            assert_eq!(city.as_deref(), Some("Boston"));
            assert!(!json);
        }
        other => panic!("expected calc, got {other:?}"),
    }
}

#[test]
fn test_search_requires_query() {
    assert!(Cli::try_parse_from(["wattwisectl", "search"]).is_err());
}

#[tokio::test]
async fn test_chat_loop_survives_failed_turn_and_stops_on_exit() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Err(ProviderError::Timeout(30)),
        Ok(ScriptedReply::text(&["A fridge ", "uses 150W."])),
        Ok(ScriptedReply::text(&["never asked"])),
    ]));
    let agent = Agent::new(provider.clone(), "instructions");
    let deps = AgentDeps::new(Arc::new(NoFacts));
    let mut session = ConversationSession::new();

    let input = b"first question\n\n  second question  \nbye\nthird question\n";
    chat::run_on(&agent, &deps, &mut session, BufReader::new(&input[..]))
        .await
        .unwrap();

    // Failed turn left no trace; loop stopped at "bye"
    assert_eq!(provider.call_count(), 2);
    assert_eq!(session.len(), 2);
    assert_eq!(session.history()[0].content, "second question");
    assert_eq!(session.history()[1].content, "A fridge uses 150W.");
}

#[tokio::test]
async fn test_chat_loop_ends_at_eof() {
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(ScriptedReply::text(&["ok"]))]));
    let agent = Agent::new(provider, "instructions");
    let deps = AgentDeps::new(Arc::new(NoFacts));
    let mut session = ConversationSession::new();

    chat::run_on(&agent, &deps, &mut session, BufReader::new(&b"hello"[..]))
        .await
        .unwrap();
    assert_eq!(session.len(), 2);
}

/// Streams one fragment, then stalls without ending the round
struct StallingProvider;

#[async_trait]
impl CompletionProvider for StallingProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, ProviderError> {
        Err(ProviderError::EmptyResponse)
    }

    async fn stream(&self, _request: &CompletionRequest) -> Result<CompletionStream, ProviderError> {
        let (tx, stream) = CompletionStream::channel(4);
        tokio::spawn(async move {
            let _ = tx.send(Ok(StreamEvent::Delta("A fridge ".to_string()))).await;
            std::future::pending::<()>().await;
            drop(tx);
        });
        Ok(stream)
    }
}

#[tokio::test]
async fn test_interrupt_mid_answer_abandons_turn() {
    let agent = Agent::new(Arc::new(StallingProvider), "instructions");
    let deps = AgentDeps::new(Arc::new(NoFacts));
    let mut session = ConversationSession::new();

    let flow = chat::turn_until(
        &agent,
        &deps,
        &mut session,
        "fridge?",
        tokio::time::sleep(Duration::from_millis(50)),
    )
    .await
    .unwrap();

    assert_eq!(flow, chat::Flow::Quit);
    assert!(session.is_empty());
    assert!(!session.turn_in_progress());
}
