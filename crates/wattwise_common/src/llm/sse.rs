//! Server-Sent Events decoding for streamed completions
//!
//! Network chunks split lines (and UTF-8 sequences) anywhere, so bytes are
//! buffered until a full line is available.

use super::{ProviderError, ToolCall};
use serde_json::Value;
use std::collections::BTreeMap;

/// Incremental `data:` line extractor
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, get back the payloads of every completed `data:` line
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, ProviderError> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = Self::decode_line(&line[..line.len() - 1])? {
                payloads.push(payload);
            }
        }
        Ok(payloads)
    }

    /// Flush a trailing line that had no newline
    pub fn finish(&mut self) -> Result<Option<String>, ProviderError> {
        let rest = std::mem::take(&mut self.buffer);
        Self::decode_line(&rest)
    }

    fn decode_line(raw: &[u8]) -> Result<Option<String>, ProviderError> {
        let line = std::str::from_utf8(raw)
            .map_err(|e| ProviderError::Malformed(format!("stream is not UTF-8: {}", e)))?;
        let line = line.strip_suffix('\r').unwrap_or(line);

        // Blank separators, comments and event/id/retry fields carry no text
        match line.strip_prefix("data:") {
            Some(payload) => Ok(Some(payload.strip_prefix(' ').unwrap_or(payload).to_string())),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Merges streamed tool-call fragments by their `index`
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    calls: BTreeMap<u64, PartialToolCall>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `choices[0].delta.tool_calls`
    pub fn apply(&mut self, fragments: &Value) -> Result<(), ProviderError> {
        let items = fragments
            .as_array()
            .ok_or_else(|| ProviderError::Malformed("tool_calls is not an array".to_string()))?;

        for (position, item) in items.iter().enumerate() {
            let index = item
                .get("index")
                .and_then(Value::as_u64)
                .unwrap_or(position as u64);
            let call = self.calls.entry(index).or_default();

            if let Some(id) = item.get("id").and_then(Value::as_str).filter(|s| !s.is_empty()) {
                call.id = id.to_string();
            }
            if let Some(function) = item.get("function") {
                if let Some(name) = function.get("name").and_then(Value::as_str) {
                    call.name.push_str(name);
                }
                if let Some(args) = function.get("arguments").and_then(Value::as_str) {
                    call.arguments.push_str(args);
                }
            }
        }
        Ok(())
    }

    /// Completed calls in index order
    ///
    /// Servers that omit call ids get `call_<index>`.
    pub fn finish(self) -> Result<Vec<ToolCall>, ProviderError> {
        self.calls
            .into_iter()
            .map(|(index, call)| {
                if call.name.is_empty() {
                    return Err(ProviderError::Malformed(format!(
                        "tool call {} has no function name",
                        index
                    )));
                }
                let id = if call.id.is_empty() {
                    format!("call_{}", index)
                } else {
                    call.id
                };
                Ok(ToolCall::new(id, call.name, call.arguments))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\"").unwrap().is_empty());
        assert_eq!(decoder.push(b":1}\n\ndata: [DONE]\n").unwrap(), vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn test_crlf_and_non_data_fields() {
        let mut decoder = SseDecoder::new();
        let out = decoder
            .push(b": keep-alive\r\nevent: message\r\nid: 4\r\ndata:{\"x\":2}\r\n\r\n")
            .unwrap();
        assert_eq!(out, vec!["{\"x\":2}"]);
    }

    #[test]
    fn test_multibyte_character_split() {
        let text = "data: ⚡\n".as_bytes();
        let (head, tail) = text.split_at(7);
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(head).unwrap().is_empty());
        assert_eq!(decoder.push(tail).unwrap(), vec!["⚡"]);
    }

    #[test]
    fn test_finish_flushes_partial_line() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: [DONE]").unwrap();
        assert_eq!(decoder.finish().unwrap().as_deref(), Some("[DONE]"));
        assert_eq!(decoder.finish().unwrap(), None);
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut decoder = SseDecoder::new();
        assert!(matches!(
            decoder.push(&[b'd', 0xff, b'\n']),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_tool_call_fragments_merge_by_index() {
        let mut assembler = ToolCallAssembler::new();
        assembler
            .apply(&json!([{"index": 0, "id": "call_a", "function": {"name": "search_knowledge_graph", "arguments": ""}}]))
            .unwrap();
        assembler
            .apply(&json!([{"index": 1, "id": "call_b", "function": {"name": "search_knowledge_graph", "arguments": "{\"query\":"}}]))
            .unwrap();
        assembler
            .apply(&json!([{"index": 0, "function": {"arguments": "{\"query\":\"fridge\"}"}}]))
            .unwrap();
        assembler
            .apply(&json!([{"index": 1, "function": {"arguments": "\"NYC rate\"}"}}]))
            .unwrap();

        let calls = assembler.finish().unwrap();
        assert_eq!(
            calls,
            vec![
                ToolCall::new("call_a", "search_knowledge_graph", "{\"query\":\"fridge\"}"),
                ToolCall::new("call_b", "search_knowledge_graph", "{\"query\":\"NYC rate\"}"),
            ]
        );
    }

    #[test]
    fn test_tool_call_without_id_gets_one() {
        let mut assembler = ToolCallAssembler::new();
        assembler
            .apply(&json!([{"function": {"name": "search_knowledge_graph", "arguments": "{}"}}]))
            .unwrap();
        assert_eq!(assembler.finish().unwrap()[0].id, "call_0");
    }

    #[test]
    fn test_tool_call_without_name_is_malformed() {
        let mut assembler = ToolCallAssembler::new();
        assembler.apply(&json!([{"index": 0, "id": "x"}])).unwrap();
        assert!(matches!(assembler.finish(), Err(ProviderError::Malformed(_))));
    }
}
