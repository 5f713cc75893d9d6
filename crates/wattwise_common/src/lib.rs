//! Wattwise Common - energy Q&A agent over a temporal knowledge graph
//!
//! Shared by `wattwisectl` (chat loop) and `wattwised` (form server).

pub mod agent;
pub mod config;
pub mod fact;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod query;
pub mod runtime;
pub mod session;
pub mod store;
pub mod tool;

pub use agent::{Agent, AgentDeps, TurnError, TurnStream};
pub use config::{ConfigError, WattwiseConfig};
pub use fact::{normalize, normalize_batch, Fact, NormalizationError, RawFact};
pub use prompt::{OutputFormat, SystemInstructions};
pub use query::{build_query, Appliance, City, DurationUnit, QueryError, RateMode, UsageForm};
pub use session::{ConversationSession, Message, Role, SessionError, ToolInvocation, TurnState};
pub use store::{FactStore, GraphitiClient, StoreError};
