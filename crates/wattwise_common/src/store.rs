//! Fact store client
//!
//! The temporal knowledge graph lives behind a Graphiti-compatible HTTP
//! service. Retrieval ranking is entirely the service's business; this
//! module only sends the query and hands back the records in the order
//! they arrived.
//!
//! The handle is opened once per run and closed by whoever opened it.
//! Nothing in a turn ever closes or resets it.

use crate::config::StoreConfig;
use crate::fact::RawFact;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Fact store errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("fact store unreachable: {0}")]
    Unreachable(String),

    #[error("fact store timed out after {0} seconds")]
    Timeout(u64),

    #[error("fact store rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("fact store returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("fact store connection is closed")]
    Closed,
}

/// Retrieval boundary of the knowledge graph
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Run a hybrid search and return raw hits in relevance order
    async fn search(&self, query: &str) -> Result<Vec<RawFact>, StoreError>;

    /// Check that the service is up and its indices are usable
    async fn healthcheck(&self) -> Result<(), StoreError>;

    /// Release the connection; later searches fail with [`StoreError::Closed`]
    async fn close(&self) -> Result<(), StoreError>;
}

/// HTTP client for a Graphiti-compatible retrieval service
pub struct GraphitiClient {
    config: StoreConfig,
    http: reqwest::Client,
    closed: AtomicBool,
}

impl GraphitiClient {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unreachable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            closed: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.uri.trim_end_matches('/'), path)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.config.timeout_secs)
        } else {
            StoreError::Unreachable(e.to_string())
        }
    }

    /// Request body for `/search`
    pub fn search_body(&self, query: &str) -> Value {
        let mut body = serde_json::json!({
            "query": query,
            "max_facts": self.config.max_facts,
        });
        if !self.config.group_ids.is_empty() {
            body["group_ids"] = serde_json::json!(self.config.group_ids);
        }
        body
    }
}

#[async_trait]
impl FactStore for GraphitiClient {
    async fn search(&self, query: &str) -> Result<Vec<RawFact>, StoreError> {
        self.ensure_open()?;
        debug!(query, "Searching fact store");

        let response = self
            .http
            .post(self.url("search"))
            .basic_auth(&self.config.user, Some(&self.config.password))
            .json(&self.search_body(query))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        parse_search_response(&json)
    }

    async fn healthcheck(&self) -> Result<(), StoreError> {
        self.ensure_open()?;

        let response = self
            .http
            .get(self.url("healthcheck"))
            .basic_auth(&self.config.user, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::Rejected { status, body })
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(uri = %self.config.uri, "Fact store connection closed");
        }
        Ok(())
    }
}

/// Pull the hit list out of a `/search` response
///
/// Accepts `{"facts": [...]}` or a bare array. Individual hits are
/// extracted leniently; whether they are usable is decided later by the
/// normalizer.
pub fn parse_search_response(json: &Value) -> Result<Vec<RawFact>, StoreError> {
    let hits = match json {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("facts")
            .and_then(Value::as_array)
            .ok_or_else(|| StoreError::InvalidResponse("missing \"facts\" array".to_string()))?,
        _ => {
            return Err(StoreError::InvalidResponse(
                "expected an object or array".to_string(),
            ))
        }
    };

    Ok(hits.iter().map(RawFact::from_json).collect())
}
