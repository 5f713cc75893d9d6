//! Scripted provider for tests and offline demos

use super::{
    Completion, CompletionProvider, CompletionRequest, CompletionStream, ProviderError,
    StreamEvent, ToolCall,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One canned provider round
#[derive(Debug, Clone, Default)]
pub struct ScriptedReply {
    /// Text, delivered one fragment per stream event
    pub fragments: Vec<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Emitted after the fragments instead of finishing the round
    pub error: Option<ProviderError>,
}

impl ScriptedReply {
    /// A final answer streamed as the given fragments
    pub fn text<S: AsRef<str>>(fragments: &[S]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.as_ref().to_string()).collect(),
            ..Default::default()
        }
    }

    /// A round that asks for one tool call
    pub fn tool(id: &str, name: &str, arguments: &str) -> Self {
        Self::default().with_tool_call(id, name, arguments)
    }

    pub fn with_tool_call(mut self, id: &str, name: &str, arguments: &str) -> Self {
        self.tool_calls.push(ToolCall::new(id, name, arguments));
        self
    }

    /// Fail the round, after any fragments were delivered
    pub fn failing_with(mut self, error: ProviderError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Provider that replays a fixed script, one reply per round
///
/// Every request is recorded so tests can inspect what the agent sent.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ScriptedReply, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<ScriptedReply, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Replies not yet consumed
    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn next_reply(&self, request: &CompletionRequest) -> Result<ScriptedReply, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Err(ProviderError::EmptyResponse))
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let reply = self.next_reply(request)?;
        if let Some(error) = reply.error {
            return Err(error);
        }

        Ok(Completion {
            text: reply.fragments.concat(),
            tool_calls: reply.tool_calls,
        })
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, ProviderError> {
        let reply = self.next_reply(request)?;
        let (tx, stream) = CompletionStream::channel(reply.fragments.len() + 1);

        tokio::spawn(async move {
            for fragment in reply.fragments {
                if tx.send(Ok(StreamEvent::Delta(fragment))).await.is_err() {
                    return;
                }
            }
            let last = match reply.error {
                Some(error) => Err(error),
                None => Ok(StreamEvent::Done {
                    tool_calls: reply.tool_calls,
                }),
            };
            let _ = tx.send(last).await;
        });

        Ok(stream)
    }
}
