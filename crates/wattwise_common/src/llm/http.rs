//! OpenAI-compatible HTTP backend (supports both local and remote)

use super::{
    ChatMessage, Completion, CompletionProvider, CompletionRequest, CompletionStream,
    ProviderError, SseDecoder, StreamEvent, ToolCall, ToolCallAssembler,
};
use crate::config::ProviderConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Events buffered between the HTTP reader task and the consumer
const STREAM_BUFFER: usize = 64;

pub struct OpenAiBackend {
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a backend; `api_key` comes from [`ProviderConfig::resolve_api_key`]
    pub fn new(config: &ProviderConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        // No overall timeout on the client: streams can legitimately run
        // long. Single-shot requests set one per request, streams per chunk.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(30)))
            .build()
            .map_err(|e| ProviderError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Chat-completions body for a request
    pub fn request_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(serde_json::json!({"role": "system", "content": request.system}));
        messages.extend(request.messages.iter().map(ChatMessage::to_openai_json));

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "stream": stream,
        });

        if !request.tools.is_empty() {
            body["tools"] = request.tools.iter().map(|t| t.to_openai_json()).collect();
        }

        body
    }

    async fn send(&self, body: &Value, timeout: Option<Duration>) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut req = self.client.post(&url).json(body);
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout_secs)
            } else {
                ProviderError::Http(format!("Request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let body = self.request_body(request, false);
        let response = self
            .send(&body, Some(Duration::from_secs(self.timeout_secs)))
            .await?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse response: {}", e)))?;

        parse_completion(&json)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, ProviderError> {
        let body = self.request_body(request, true);
        let response = self.send(&body, None).await?;
        let (tx, stream) = CompletionStream::channel(STREAM_BUFFER);
        let idle = Duration::from_secs(self.timeout_secs);
        let timeout_secs = self.timeout_secs;

        tokio::spawn(async move {
            if let Err(e) = pump_stream(response, &tx, idle, timeout_secs).await {
                // The receiver may already be gone; nothing else to tell
                let _ = tx.send(Err(e)).await;
            }
        });

        Ok(stream)
    }
}

/// Read SSE chunks and forward events until `[DONE]`; a body that ends first is malformed
async fn pump_stream(
    mut response: reqwest::Response,
    tx: &mpsc::Sender<Result<StreamEvent, ProviderError>>,
    idle: Duration,
    timeout_secs: u64,
) -> Result<(), ProviderError> {
    let mut decoder = SseDecoder::new();
    let mut assembler = ToolCallAssembler::new();

    loop {
        let chunk = tokio::time::timeout(idle, response.chunk())
            .await
            .map_err(|_| ProviderError::Timeout(timeout_secs))?
            .map_err(|e| ProviderError::Http(format!("Failed to read stream: {}", e)))?;

        let end_of_body = chunk.is_none();
        let payloads: Vec<String> = match chunk {
            Some(bytes) => decoder.push(&bytes)?,
            None => decoder.finish()?.into_iter().collect(),
        };

        for payload in payloads {
            if payload == "[DONE]" {
                let tool_calls = std::mem::take(&mut assembler).finish()?;
                let _ = tx.send(Ok(StreamEvent::Done { tool_calls })).await;
                return Ok(());
            }

            let chunk: Value = serde_json::from_str(&payload)
                .map_err(|e| ProviderError::Malformed(format!("Failed to parse chunk: {}", e)))?;
            if let Some(error) = chunk.get("error") {
                return Err(ProviderError::Malformed(format!("Provider error in stream: {}", error)));
            }

            let delta = &chunk["choices"][0]["delta"];
            if let Some(content) = delta["content"].as_str() {
                if !content.is_empty() && tx.send(Ok(StreamEvent::Delta(content.to_string()))).await.is_err() {
                    debug!("Stream consumer went away");
                    return Ok(());
                }
            }
            if let Some(calls) = delta.get("tool_calls").filter(|v| !v.is_null()) {
                assembler.apply(calls)?;
            }
        }

        if end_of_body {
            warn!("Completion stream ended before [DONE]");
            return Err(ProviderError::Malformed("stream ended before [DONE]".to_string()));
        }
    }
}

/// Extract text and tool calls from a non-streaming response
pub(crate) fn parse_completion(json: &Value) -> Result<Completion, ProviderError> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| ProviderError::Malformed("No message in response".to_string()))?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let tool_calls = match message.get("tool_calls").and_then(Value::as_array) {
        Some(calls) => calls
            .iter()
            .map(|call| {
                let id = call.get("id").and_then(Value::as_str);
                let function = call.get("function");
                let name = function.and_then(|f| f.get("name")).and_then(Value::as_str);
                let arguments = function
                    .and_then(|f| f.get("arguments"))
                    .map(|a| match a {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| "{}".to_string());

                match (id, name) {
                    (Some(id), Some(name)) => Ok(ToolCall::new(id, name, arguments)),
                    _ => Err(ProviderError::Malformed(format!("Incomplete tool call: {}", call))),
                }
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    if text.is_empty() && tool_calls.is_empty() {
        warn!("Provider returned neither text nor tool calls");
        return Err(ProviderError::EmptyResponse);
    }

    Ok(Completion { text, tool_calls })
}
