//! Startup wiring shared by the chat loop and the form server
//!
//! Opens the fact store once, checks it, and builds the agent for the
//! requested output format. Whoever calls [`open_store`] owns the handle
//! and closes it on the way out.

use crate::agent::{Agent, AgentDeps};
use crate::config::WattwiseConfig;
use crate::llm::OpenAiBackend;
use crate::prompt::{OutputFormat, SystemInstructions};
use crate::store::{FactStore, GraphitiClient};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Connect to the fact store and check that its indices are usable
///
/// A failed healthcheck is logged and tolerated; searches will report
/// their own errors.
pub async fn open_store(config: &WattwiseConfig) -> Result<Arc<dyn FactStore>> {
    let client = GraphitiClient::new(config.store.clone())
        .context("Failed to set up fact store client")?;

    match client.healthcheck().await {
        Ok(()) => info!(uri = %config.store.uri, "Fact store ready"),
        Err(e) => warn!(
            uri = %config.store.uri,
            error = %e,
            "Fact store healthcheck failed, continuing (indices may already exist)"
        ),
    }

    Ok(Arc::new(client))
}

/// Build the agent against the configured provider
pub fn build_agent(config: &WattwiseConfig, format: OutputFormat) -> Result<Agent> {
    let api_key = config
        .provider
        .resolve_api_key(|key| std::env::var(key).ok())?;
    let backend = OpenAiBackend::new(&config.provider, api_key)
        .context("Failed to set up completion provider")?;

    info!(model = backend.model(), base_url = %config.provider.base_url, "Provider ready");

    let instructions = SystemInstructions::new(format, &config.agent).render();
    Ok(Agent::new(Arc::new(backend), instructions)
        .with_max_tool_rounds(config.agent.max_tool_rounds))
}

/// Agent plus the store handle it searches
pub struct Runtime {
    pub agent: Agent,
    pub deps: AgentDeps,
}

impl Runtime {
    pub async fn start(config: &WattwiseConfig, format: OutputFormat) -> Result<Self> {
        // Credentials first: a missing key should fail before any network I/O
        let agent = build_agent(config, format)?;
        let store = open_store(config).await?;
        Ok(Self {
            agent,
            deps: AgentDeps::new(store),
        })
    }

    /// Close the store; errors are logged, not returned
    pub async fn shutdown(&self) {
        if let Err(e) = self.deps.store.close().await {
            warn!(error = %e, "Failed to close fact store");
        }
    }
}
