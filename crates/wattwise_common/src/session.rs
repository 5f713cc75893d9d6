//! Conversation session
//!
//! Append-only message history for one conversation. A turn reserves the
//! session with [`ConversationSession::begin_turn`] and either commits a
//! user/agent pair or abandons, leaving history untouched.

use crate::fact::Fact;
use serde::{Deserialize, Serialize};

/// Session errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a turn is already in progress on this session")]
    TurnInProgress,

    #[error("expected a {expected} message next, got {got}")]
    OutOfOrder { expected: Role, got: Role },

    #[error("turn ticket {0} does not match the turn in progress")]
    StaleTicket(u64),
}

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Agent => write!(f, "agent"),
        }
    }
}

/// What a tool call produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Facts(Vec<Fact>),
    Failed(String),
}

/// One search made while producing an agent message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Provider-assigned call id
    pub call_id: String,
    /// Exact text sent to the fact store
    pub query_text: String,
    pub outcome: ToolOutcome,
}

impl ToolInvocation {
    /// Facts returned, empty on failure
    pub fn facts(&self) -> &[Fact] {
        match &self.outcome {
            ToolOutcome::Facts(facts) => facts,
            ToolOutcome::Failed(_) => &[],
        }
    }
}

/// One conversational turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_invocations: Vec::new(),
        }
    }

    pub fn agent(content: impl Into<String>, tool_invocations: Vec<ToolInvocation>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            tool_invocations,
        }
    }
}

/// Per-turn lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    Idle,
    AwaitingCompletion,
    ToolRequested,
    ToolResolved,
    Completed,
    Failed,
}

impl TurnState {
    /// Whether `self → next` is a legal step
    pub fn can_transition(self, next: TurnState) -> bool {
        use TurnState::*;
        matches!(
            (self, next),
            (Idle, AwaitingCompletion)
                | (AwaitingCompletion, ToolRequested)
                | (AwaitingCompletion, Completed)
                | (ToolRequested, ToolResolved)
                | (ToolResolved, ToolRequested)
                | (ToolResolved, AwaitingCompletion)
                | (Idle | AwaitingCompletion | ToolRequested | ToolResolved, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TurnState::Completed | TurnState::Failed)
    }
}

/// Proof that the holder owns the turn in progress
#[derive(Debug, PartialEq, Eq)]
pub struct TurnTicket {
    id: u64,
}

impl TurnTicket {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Ordered, append-only conversation history
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    messages: Vec<Message>,
    active_turn: Option<u64>,
    turns_started: u64,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages appended so far, in order
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn turn_in_progress(&self) -> bool {
        self.active_turn.is_some()
    }

    /// Role the next appended message must have
    pub fn expected_role(&self) -> Role {
        match self.messages.last() {
            Some(m) if m.role == Role::User => Role::Agent,
            _ => Role::User,
        }
    }

    /// Append a message outside of a turn
    pub fn append(&mut self, message: Message) -> Result<(), SessionError> {
        if self.active_turn.is_some() {
            return Err(SessionError::TurnInProgress);
        }
        self.push_checked(message)
    }

    /// Reserve the session for a new turn
    pub fn begin_turn(&mut self) -> Result<TurnTicket, SessionError> {
        if self.active_turn.is_some() {
            return Err(SessionError::TurnInProgress);
        }
        if self.expected_role() != Role::User {
            return Err(SessionError::OutOfOrder {
                expected: Role::Agent,
                got: Role::User,
            });
        }

        self.turns_started += 1;
        self.active_turn = Some(self.turns_started);
        Ok(TurnTicket {
            id: self.turns_started,
        })
    }

    /// Append the turn's user and agent messages together and release the session
    pub fn commit_turn(
        &mut self,
        ticket: TurnTicket,
        user: Message,
        agent: Message,
    ) -> Result<(), SessionError> {
        self.check_ticket(&ticket)?;

        // The ticket is spent either way; a rejected pair ends the turn unrecorded
        let mismatch = if user.role != Role::User {
            Some((Role::User, user.role))
        } else if agent.role != Role::Agent {
            Some((Role::Agent, agent.role))
        } else {
            None
        };
        if let Some((expected, got)) = mismatch {
            self.active_turn = None;
            return Err(SessionError::OutOfOrder { expected, got });
        }

        self.messages.push(user);
        self.messages.push(agent);
        self.active_turn = None;
        Ok(())
    }

    /// Release the session without touching history
    pub fn abandon_turn(&mut self, ticket: TurnTicket) -> Result<(), SessionError> {
        self.check_ticket(&ticket)?;
        self.active_turn = None;
        Ok(())
    }

    fn check_ticket(&self, ticket: &TurnTicket) -> Result<(), SessionError> {
        match self.active_turn {
            Some(id) if id == ticket.id => Ok(()),
            _ => Err(SessionError::StaleTicket(ticket.id)),
        }
    }

    fn push_checked(&mut self, message: Message) -> Result<(), SessionError> {
        let expected = self.expected_role();
        if message.role != expected {
            return Err(SessionError::OutOfOrder {
                expected,
                got: message.role,
            });
        }
        self.messages.push(message);
        Ok(())
    }
}
