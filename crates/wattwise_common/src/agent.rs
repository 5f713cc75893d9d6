//! Agent turn controller
//!
//! Drives one user message to one agent message:
//!
//! ```text
//! Idle → AwaitingCompletion → {ToolRequested → ToolResolved → AwaitingCompletion}* → Completed
//!                                                                                   ↘ Failed
//! ```
//!
//! The provider decides whether to search; requested searches run one at a
//! time in the order asked, and their facts go back to the provider until
//! it answers without tool calls. Only a completed turn touches the
//! session. A failed, dropped or cancelled turn leaves history as it was.

use crate::llm::{
    ChatMessage, CompletionProvider, CompletionRequest, CompletionStream, ProviderError,
    StreamEvent, ToolCall, ToolSpec,
};
use crate::session::{
    ConversationSession, Message, Role, SessionError, ToolInvocation, ToolOutcome, TurnState,
    TurnTicket,
};
use crate::store::{FactStore, StoreError};
use crate::tool::{self, SEARCH_TOOL_NAME};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default bound on completion rounds that request tools
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Handles a turn needs, passed in per call
#[derive(Clone)]
pub struct AgentDeps {
    pub store: Arc<dyn FactStore>,
}

impl AgentDeps {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store }
    }
}

/// Why a turn failed
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("knowledge graph search for {query:?} failed: {source}")]
    Store {
        query: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("provider requested unknown tool {0:?}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidToolArguments { tool: String, reason: String },

    #[error("no final answer after {0} tool rounds")]
    ToolRoundLimit(usize),

    #[error("illegal turn transition {from:?} -> {to:?}")]
    IllegalTransition { from: TurnState, to: TurnState },
}

/// Tool-augmented conversational agent
pub struct Agent {
    provider: Arc<dyn CompletionProvider>,
    instructions: String,
    tools: Vec<ToolSpec>,
    max_tool_rounds: usize,
}

impl Agent {
    pub fn new(provider: Arc<dyn CompletionProvider>, instructions: impl Into<String>) -> Self {
        Self {
            provider,
            instructions: instructions.into(),
            tools: vec![tool::search_tool_spec()],
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Run a turn to completion and return the agent message
    ///
    /// The returned message carries every search made on the way.
    pub async fn run(
        &self,
        session: &mut ConversationSession,
        user_message: &str,
        deps: &AgentDeps,
    ) -> Result<Message, TurnError> {
        let mut turn = ActiveTurn::begin(session, user_message)?;

        let mut answer = String::new();
        let outcome = loop {
            let completion = match self.provider.complete(&turn.request(self)).await {
                Ok(completion) => completion,
                Err(e) => break Err(TurnError::from(e)),
            };
            answer.push_str(&completion.text);

            if completion.tool_calls.is_empty() {
                if completion.text.is_empty() {
                    break Err(ProviderError::EmptyResponse.into());
                }
                break Ok(());
            }
            if let Err(e) = turn
                .resolve_tools(self, &completion.text, completion.tool_calls, deps)
                .await
            {
                break Err(e);
            }
        };

        match outcome {
            Ok(()) => turn.commit(answer),
            Err(e) => Err(turn.fail(e)),
        }
    }

    /// Start a streamed turn
    ///
    /// Pull fragments with [`TurnStream::next`]. The turn is committed when
    /// it yields `None` after the last fragment.
    pub fn run_stream<'a>(
        &'a self,
        session: &'a mut ConversationSession,
        user_message: &str,
        deps: &'a AgentDeps,
    ) -> Result<TurnStream<'a>, TurnError> {
        let turn = ActiveTurn::begin(session, user_message)?;
        Ok(TurnStream {
            agent: self,
            deps,
            turn,
            current: None,
            answer: String::new(),
            round_text: String::new(),
            finished: false,
        })
    }
}

/// A turn holding the session reservation
///
/// Dropping it before commit abandons the turn.
struct ActiveTurn<'a> {
    session: &'a mut ConversationSession,
    ticket: Option<TurnTicket>,
    state: TurnState,
    user_message: String,
    /// Prior history, the new user message, and this turn's tool exchanges
    transcript: Vec<ChatMessage>,
    invocations: Vec<ToolInvocation>,
    tool_rounds: usize,
}

impl<'a> ActiveTurn<'a> {
    fn begin(session: &'a mut ConversationSession, user_message: &str) -> Result<Self, TurnError> {
        let ticket = session.begin_turn()?;

        let mut transcript: Vec<ChatMessage> = session
            .history()
            .iter()
            .map(|m| match m.role {
                Role::User => ChatMessage::user(m.content.clone()),
                Role::Agent => ChatMessage::assistant(m.content.clone()),
            })
            .collect();
        transcript.push(ChatMessage::user(user_message));

        info!(turn = ticket.id(), prior_messages = session.len(), "Turn started");

        let mut turn = Self {
            session,
            ticket: Some(ticket),
            state: TurnState::Idle,
            user_message: user_message.to_string(),
            transcript,
            invocations: Vec::new(),
            tool_rounds: 0,
        };
        turn.transition(TurnState::AwaitingCompletion)?;
        Ok(turn)
    }

    fn transition(&mut self, next: TurnState) -> Result<(), TurnError> {
        if !self.state.can_transition(next) {
            return Err(TurnError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    fn request(&self, agent: &Agent) -> CompletionRequest {
        CompletionRequest {
            system: agent.instructions.clone(),
            messages: self.transcript.clone(),
            tools: agent.tools.clone(),
        }
    }

    /// Run requested tools in order and queue their results for the provider
    async fn resolve_tools(
        &mut self,
        agent: &Agent,
        text: &str,
        calls: Vec<ToolCall>,
        deps: &AgentDeps,
    ) -> Result<(), TurnError> {
        self.tool_rounds += 1;
        if self.tool_rounds > agent.max_tool_rounds {
            return Err(TurnError::ToolRoundLimit(agent.max_tool_rounds));
        }

        self.transcript.push(ChatMessage::tool_request(text, calls.clone()));

        for call in calls {
            self.transition(TurnState::ToolRequested)?;

            if call.name != SEARCH_TOOL_NAME {
                return Err(TurnError::UnknownTool(call.name));
            }
            let query = tool::parse_search_arguments(&call.arguments).map_err(|reason| {
                TurnError::InvalidToolArguments {
                    tool: call.name.clone(),
                    reason,
                }
            })?;

            let facts = match tool::search(deps.store.as_ref(), &query).await {
                Ok(facts) => facts,
                Err(source) => {
                    self.invocations.push(ToolInvocation {
                        call_id: call.id.clone(),
                        query_text: query.clone(),
                        outcome: ToolOutcome::Failed(source.to_string()),
                    });
                    return Err(TurnError::Store { query, source });
                }
            };
            info!(query = %query, facts = facts.len(), "Knowledge graph searched");

            let payload = serde_json::to_string(&facts).map_err(|e| {
                TurnError::Provider(ProviderError::Malformed(format!(
                    "Failed to encode tool result: {}",
                    e
                )))
            })?;
            self.transcript.push(ChatMessage::tool_result(call.id.clone(), payload));
            self.invocations.push(ToolInvocation {
                call_id: call.id,
                query_text: query,
                outcome: ToolOutcome::Facts(facts),
            });

            self.transition(TurnState::ToolResolved)?;
        }

        self.transition(TurnState::AwaitingCompletion)
    }

    /// Append the user/agent pair and release the session
    fn commit(&mut self, answer: String) -> Result<Message, TurnError> {
        self.transition(TurnState::Completed)?;
        let ticket = self
            .ticket
            .take()
            .ok_or(TurnError::IllegalTransition {
                from: TurnState::Completed,
                to: TurnState::Completed,
            })?;

        let agent = Message::agent(answer, std::mem::take(&mut self.invocations));
        self.session.commit_turn(
            ticket,
            Message::user(std::mem::take(&mut self.user_message)),
            agent.clone(),
        )?;

        info!(
            searches = agent.tool_invocations.len(),
            chars = agent.content.len(),
            "Turn completed"
        );
        Ok(agent)
    }

    /// Release the session without touching history
    fn fail(&mut self, error: TurnError) -> TurnError {
        self.state = TurnState::Failed;
        if let Some(ticket) = self.ticket.take() {
            if let Err(e) = self.session.abandon_turn(ticket) {
                warn!(error = %e, "Failed to release session after turn failure");
            }
        }
        warn!(error = %error, "Turn failed");
        error
    }
}

impl Drop for ActiveTurn<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            debug!(turn = ticket.id(), "Turn abandoned before completion");
            let _ = self.session.abandon_turn(ticket);
        }
    }
}

/// Streamed turn: pull text fragments in arrival order
pub struct TurnStream<'a> {
    agent: &'a Agent,
    deps: &'a AgentDeps,
    turn: ActiveTurn<'a>,
    current: Option<CompletionStream>,
    answer: String,
    round_text: String,
    finished: bool,
}

impl TurnStream<'_> {
    /// Next fragment
    ///
    /// `None` means the turn is over: committed if no error was yielded.
    pub async fn next(&mut self) -> Option<Result<String, TurnError>> {
        if self.finished {
            return None;
        }

        match self.advance().await {
            Ok(Some(fragment)) => Some(Ok(fragment)),
            Ok(None) => {
                self.finished = true;
                let answer = std::mem::take(&mut self.answer);
                match self.turn.commit(answer.clone()) {
                    Ok(_) => {
                        self.answer = answer;
                        None
                    }
                    Err(e) => Some(Err(self.turn.fail(e))),
                }
            }
            Err(e) => {
                self.finished = true;
                self.current = None;
                Some(Err(self.turn.fail(e)))
            }
        }
    }

    /// Text reconstructed so far
    pub fn partial(&self) -> &str {
        &self.answer
    }

    /// Searches made so far in this turn
    pub fn tool_invocations(&self) -> &[ToolInvocation] {
        &self.turn.invocations
    }

    pub fn state(&self) -> TurnState {
        self.turn.state
    }

    async fn advance(&mut self) -> Result<Option<String>, TurnError> {
        loop {
            let mut stream = match self.current.take() {
                Some(stream) => stream,
                None => {
                    let request = self.turn.request(self.agent);
                    self.agent.provider.stream(&request).await?
                }
            };

            match stream.next().await {
                Some(Ok(StreamEvent::Delta(text))) => {
                    self.current = Some(stream);
                    self.answer.push_str(&text);
                    self.round_text.push_str(&text);
                    return Ok(Some(text));
                }
                Some(Ok(StreamEvent::Done { tool_calls })) => {
                    let round_text = std::mem::take(&mut self.round_text);
                    if tool_calls.is_empty() {
                        // An answer round with no text is not an answer
                        if round_text.is_empty() {
                            return Err(ProviderError::EmptyResponse.into());
                        }
                        return Ok(None);
                    }
                    self.turn
                        .resolve_tools(self.agent, &round_text, tool_calls, self.deps)
                        .await?;
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(ProviderError::Malformed(
                        "stream ended before completion".to_string(),
                    )
                    .into())
                }
            }
        }
    }
}
