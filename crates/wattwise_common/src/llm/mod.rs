//! Completion provider abstraction
//!
//! The agent talks to a text-completion provider through
//! [`CompletionProvider`]. Two modes:
//! - `complete`: one request, full answer plus requested tool calls
//! - `stream`: one request, ordered text deltas then a final event carrying
//!   the requested tool calls
//!
//! Implementations:
//! - [`OpenAiBackend`]: OpenAI-compatible chat completions (OpenAI, Ollama, llama.cpp)
//! - [`ScriptedProvider`]: canned replies for tests and offline demos

mod http;
mod scripted;
mod sse;

pub use http::OpenAiBackend;
pub use scripted::{ScriptedProvider, ScriptedReply};
pub use sse::{SseDecoder, ToolCallAssembler};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Provider errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed provider data: {0}")]
    Malformed(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,
}

/// Who wrote a provider-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    Tool,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        }
    }
}

/// A tool call requested by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments, exactly as the provider sent them
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// A single message in the provider conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Assistant turn that only requests tools
    ///
    /// Text the provider produced alongside the calls is kept as content.
    pub fn tool_request(text: &str, calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: if text.is_empty() { None } else { Some(text.to_string()) },
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    /// OpenAI wire representation
    pub fn to_openai_json(&self) -> Value {
        let mut msg = serde_json::json!({
            "role": self.role.as_str(),
            "content": self.content,
        });

        if !self.tool_calls.is_empty() {
            msg["tool_calls"] = self
                .tool_calls
                .iter()
                .map(|call| {
                    serde_json::json!({
                        "id": call.id,
                        "type": "function",
                        "function": {"name": call.name, "arguments": call.arguments},
                    })
                })
                .collect();
        }

        if let Some(id) = &self.tool_call_id {
            msg["tool_call_id"] = Value::String(id.clone());
        }

        msg
    }
}

/// A function the provider may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

impl ToolSpec {
    pub fn to_openai_json(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Everything the provider needs for one completion round
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    /// Prior turns, the new user message, and any tool exchanges of this turn
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// Result of a single-shot completion round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// One item of a streamed completion round
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Next piece of answer text
    Delta(String),
    /// End of the round; non-empty when the provider wants tools run
    Done { tool_calls: Vec<ToolCall> },
}

/// Single-consumer sequence of stream events
///
/// Dropping it tells the producer to stop: its next send fails.
pub struct CompletionStream {
    rx: mpsc::Receiver<Result<StreamEvent, ProviderError>>,
}

impl CompletionStream {
    /// Create a stream and the sender its producer writes into
    pub fn channel(buffer: usize) -> (mpsc::Sender<Result<StreamEvent, ProviderError>>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }

    /// Next event, or `None` once the producer is gone
    pub async fn next(&mut self) -> Option<Result<StreamEvent, ProviderError>> {
        self.rx.recv().await
    }
}

/// Text-completion provider
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Single-shot completion
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;

    /// Streamed completion
    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_message_json() {
        let msg = ChatMessage::user("How much does my fridge cost?");
        assert_eq!(
            msg.to_openai_json(),
            json!({"role": "user", "content": "How much does my fridge cost?"})
        );
    }

    #[test]
    fn test_tool_request_json() {
        let msg = ChatMessage::tool_request(
            "",
            vec![ToolCall::new("call_1", "search_knowledge_graph", r#"{"query":"fridge"}"#)],
        );
        let json = msg.to_openai_json();
        assert_eq!(json["role"], "assistant");
        assert!(json["content"].is_null());
        assert_eq!(json["tool_calls"][0]["id"], "call_1");
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert_eq!(json["tool_calls"][0]["function"]["name"], "search_knowledge_graph");
        assert_eq!(json["tool_calls"][0]["function"]["arguments"], r#"{"query":"fridge"}"#);
    }

    #[test]
    fn test_tool_result_json() {
        let json = ChatMessage::tool_result("call_1", "[]").to_openai_json();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert_eq!(json["content"], "[]");
    }

    #[tokio::test]
    async fn test_stream_channel_delivers_in_order() {
        let (tx, mut stream) = CompletionStream::channel(4);
        tokio::spawn(async move {
            for piece in ["a", "b", "c"] {
                let _ = tx.send(Ok(StreamEvent::Delta(piece.to_string()))).await;
            }
            let _ = tx.send(Ok(StreamEvent::Done { tool_calls: vec![] })).await;
        });

        let mut seen = Vec::new();
        while let Some(event) = stream.next().await {
            seen.push(event.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                StreamEvent::Delta("a".to_string()),
                StreamEvent::Delta("b".to_string()),
                StreamEvent::Delta("c".to_string()),
                StreamEvent::Done { tool_calls: vec![] },
            ]
        );
    }
}
