//! Knowledge-graph search tool
//!
//! The only capability the agent has. It forwards the query verbatim,
//! normalizes the hits, and reports store failures without retrying.

use crate::fact::{normalize_batch, Fact};
use crate::llm::ToolSpec;
use crate::store::{FactStore, StoreError};
use serde::Deserialize;
use tracing::{debug, error};

/// Name the provider uses to call the tool
pub const SEARCH_TOOL_NAME: &str = "search_knowledge_graph";

/// Tool description advertised to the provider
pub fn search_tool_spec() -> ToolSpec {
    ToolSpec {
        name: SEARCH_TOOL_NAME.to_string(),
        description: "Search the energy knowledge graph for appliance power ratings, \
                      unit conversions, regional electricity rates and physical analogies. \
                      Returns a list of facts in relevance order."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find information in the knowledge graph"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

#[derive(Debug, Deserialize)]
struct SearchArguments {
    query: String,
}

/// Pull the query text out of the provider's JSON arguments
pub fn parse_search_arguments(arguments: &str) -> Result<String, String> {
    let parsed: SearchArguments = serde_json::from_str(arguments)
        .map_err(|e| format!("expected {{\"query\": string}}, got {}: {}", arguments, e))?;
    Ok(parsed.query)
}

/// Search the store and normalize the results
///
/// Malformed records are dropped. Store errors are logged and returned; the
/// connection belongs to the caller and is left alone.
pub async fn search(store: &dyn FactStore, query: &str) -> Result<Vec<Fact>, StoreError> {
    match store.search(query).await {
        Ok(raws) => {
            let facts = normalize_batch(&raws);
            debug!(
                query,
                received = raws.len(),
                kept = facts.len(),
                "Knowledge graph search finished"
            );
            Ok(facts)
        }
        Err(e) => {
            error!(query, error = %e, "Error searching knowledge graph");
            Err(e)
        }
    }
}
