//! Fact model and normalization
//!
//! The fact store hands back loosely shaped records. Everything the agent
//! sees goes through [`normalize`] first, so downstream code can rely on a
//! [`Fact`] always carrying an id and a statement.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Token marking bare analogy statements such as `1kWh = Running 10km`
pub const ANALOGY_TOKEN: &str = "1kWh";

/// Prefix written in front of analogy statements
pub const ANALOGY_PREFIX: &str = "1 kWh is equivalent to ";

/// Normalized knowledge-graph statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// Identifier assigned by the fact store
    pub id: String,

    /// Natural-language statement
    pub statement: String,

    /// When the fact became valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,

    /// When the fact stopped being valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,

    /// Graph node the fact came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_entity_id: Option<String>,
}

/// Raw search hit as returned by the fact store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFact {
    pub uuid: Option<String>,
    pub fact: Option<String>,
    pub valid_at: Option<String>,
    pub invalid_at: Option<String>,
    pub source_node_uuid: Option<String>,
}

impl RawFact {
    /// Extract a raw record from a JSON object without failing
    ///
    /// Identifiers and statements must be strings. Timestamps of any scalar
    /// type are kept as their text form; `null` counts as absent.
    pub fn from_json(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        let scalar = |key: &str| match value.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(_)) | Some(Value::Object(_)) => None,
            Some(other) => Some(other.to_string()),
        };

        Self {
            uuid: text("uuid"),
            fact: text("fact"),
            valid_at: scalar("valid_at"),
            invalid_at: scalar("invalid_at"),
            source_node_uuid: text("source_node_uuid"),
        }
    }
}

/// Why a raw record could not become a [`Fact`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    #[error("record has no identifier")]
    MissingId,

    #[error("record {0} has no statement")]
    MissingStatement(String),

    #[error("record {id} is valid from {from} until {until}, which is backwards")]
    InvertedValidity {
        id: String,
        from: String,
        until: String,
    },
}

/// Turn one raw record into a canonical fact
pub fn normalize(raw: &RawFact) -> Result<Fact, NormalizationError> {
    let id = present(&raw.uuid).ok_or(NormalizationError::MissingId)?;
    let statement = present(&raw.fact)
        .ok_or_else(|| NormalizationError::MissingStatement(id.to_string()))?;

    let statement = if statement.contains(ANALOGY_TOKEN) {
        format!("{}{}", ANALOGY_PREFIX, statement)
    } else {
        statement.to_string()
    };

    let valid_from = raw.valid_at.clone().filter(|s| !s.is_empty());
    let valid_until = raw.invalid_at.clone().filter(|s| !s.is_empty());

    if let (Some(from), Some(until)) = (&valid_from, &valid_until) {
        if let (Ok(f), Ok(u)) = (
            DateTime::parse_from_rfc3339(from),
            DateTime::parse_from_rfc3339(until),
        ) {
            if f > u {
                return Err(NormalizationError::InvertedValidity {
                    id: id.to_string(),
                    from: from.clone(),
                    until: until.clone(),
                });
            }
        }
    }

    Ok(Fact {
        id: id.to_string(),
        statement,
        valid_from,
        valid_until,
        source_entity_id: raw.source_node_uuid.clone().filter(|s| !s.is_empty()),
    })
}

/// Normalize a batch in order, dropping records that fail
pub fn normalize_batch(raws: &[RawFact]) -> Vec<Fact> {
    raws.iter()
        .filter_map(|raw| match normalize(raw) {
            Ok(fact) => Some(fact),
            Err(e) => {
                debug!(error = %e, "Dropping malformed fact record");
                None
            }
        })
        .collect()
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}
