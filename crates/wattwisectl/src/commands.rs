//! One-shot subcommands

use crate::output;
use anyhow::{Context, Result};
use tracing::info;
use wattwise_common::tool;
use wattwise_common::{
    build_query, Agent, AgentDeps, Appliance, City, ConversationSession, DurationUnit, Message,
    UsageForm,
};

/// Answer a single question without streaming
pub async fn ask(agent: &Agent, deps: &AgentDeps, question: &str, json: bool) -> Result<()> {
    let mut session = ConversationSession::new();
    let reply = agent.run(&mut session, question, deps).await?;
    print_reply(&reply, json)
}

/// Turn calculator flags into a usage form
pub fn usage_form(
    appliance: &str,
    duration: f64,
    unit: &str,
    rate: Option<f64>,
    city: Option<&str>,
) -> Result<UsageForm> {
    let appliance: Appliance = appliance.parse()?;
    let unit: DurationUnit = unit.parse()?;

    let mut form = UsageForm::new(appliance, duration, unit);
    if let Some(rate) = rate {
        form = form.with_custom_rate(rate);
    }
    if let Some(city) = city {
        form = form.with_city(city.parse::<City>()?);
    }
    Ok(form)
}

/// Build the calculator query and run it through the agent
pub async fn calc(agent: &Agent, deps: &AgentDeps, form: &UsageForm, json: bool) -> Result<()> {
    let query = build_query(form)?;
    info!(query = %query, "Calculator query built");
    ask(agent, deps, &query, json).await
}

/// Print raw knowledge-graph hits
pub async fn search(deps: &AgentDeps, query: &str) -> Result<()> {
    let facts = tool::search(deps.store.as_ref(), query)
        .await
        .with_context(|| format!("Search for {:?} failed", query))?;

    if facts.is_empty() {
        println!("No facts found.");
        return Ok(());
    }

    for fact in &facts {
        println!("{}", output::format_fact(fact));
        println!("---");
    }
    Ok(())
}

fn print_reply(reply: &Message, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reply)?);
    } else {
        println!("{}", reply.content);
    }
    Ok(())
}
