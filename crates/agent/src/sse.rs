//! Line parser for OpenAI-compatible `text/event-stream` completions.
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: {"choices":[{"delta":{"content":"lo"},"finish_reason":"stop"}]}
//! data: [DONE]
//! ```

use serde::Deserialize;

use crate::llm::{LlmError, StreamChunk, Usage};

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: DeltaBody,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeltaBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<DeltaToolCall>,
}

#[derive(Debug, Deserialize)]
struct DeltaToolCall {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<DeltaFunction>,
}

#[derive(Debug, Deserialize)]
struct DeltaFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Parses one SSE line. Blank lines, comments and non-`data` fields yield
/// no chunks.
pub fn parse_sse_line(line: &str) -> Result<Vec<StreamChunk>, LlmError> {
    let line = line.trim_end();
    if line.is_empty() || line.starts_with(':') {
        return Ok(Vec::new());
    }

    let payload = match line.strip_prefix("data:") {
        Some(rest) => rest.trim_start(),
        None => return Ok(Vec::new()),
    };
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    if payload == DONE_SENTINEL {
        return Ok(vec![StreamChunk::Done { finish_reason: None, usage: None }]);
    }

    let delta: StreamDelta = serde_json::from_str(payload)
        .map_err(|error| LlmError::InvalidResponse(format!("malformed stream delta: {error}")))?;

    let mut chunks = Vec::new();
    let Some(choice) = delta.choices.into_iter().next() else {
        // The usage-only chunk sent when `include_usage` is requested.
        if let Some(usage) = delta.usage {
            chunks.push(StreamChunk::Done { finish_reason: None, usage: Some(usage) });
        }
        return Ok(chunks);
    };

    if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
        chunks.push(StreamChunk::TextDelta { text });
    }
    for call in choice.delta.tool_calls {
        let (name, arguments) = match call.function {
            Some(function) => (function.name, function.arguments),
            None => (None, None),
        };
        chunks.push(StreamChunk::ToolCallDelta { index: call.index, id: call.id, name, arguments });
    }
    if choice.finish_reason.is_some() || delta.usage.is_some() {
        chunks.push(StreamChunk::Done { finish_reason: choice.finish_reason, usage: delta.usage });
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::parse_sse_line;
    use crate::llm::{StreamChunk, Usage};

    #[test]
    fn ignores_blank_comment_and_event_lines() {
        for line in ["", "   ", ": keep-alive", "event: message", "id: 7", "data:", "data: "] {
            assert!(parse_sse_line(line).expect("parse").is_empty(), "line {line:?}");
        }
    }

    #[test]
    fn done_sentinel_ends_stream() {
        assert_eq!(
            parse_sse_line("data: [DONE]").expect("parse"),
            vec![StreamChunk::Done { finish_reason: None, usage: None }]
        );
        assert_eq!(parse_sse_line("data:[DONE]").expect("parse").len(), 1);
    }

    #[test]
    fn text_delta_and_finish_reason() {
        let line = r#"data: {"choices":[{"index":0,"delta":{"content":"Dear CEO"},"finish_reason":"stop"}]}"#;
        assert_eq!(
            parse_sse_line(line).expect("parse"),
            vec![
                StreamChunk::TextDelta { text: "Dear CEO".to_string() },
                StreamChunk::Done { finish_reason: Some("stop".to_string()), usage: None },
            ]
        );
    }

    #[test]
    fn usage_only_chunk_carries_token_counts() {
        let line = r#"data: {"choices":[],"usage":{"prompt_tokens":9,"completion_tokens":4,"total_tokens":13}}"#;
        assert_eq!(
            parse_sse_line(line).expect("parse"),
            vec![StreamChunk::Done {
                finish_reason: None,
                usage: Some(Usage { prompt_tokens: 9, completion_tokens: 4, total_tokens: 13 }),
            }]
        );
    }

    #[test]
    fn tool_call_fragments_keep_their_index() {
        let first = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"send_email","arguments":""}}]}}]}"#;
        let second = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"body\":"}}]}}]}"#;

        assert_eq!(
            parse_sse_line(first).expect("parse"),
            vec![StreamChunk::ToolCallDelta {
                index: 0,
                id: Some("call_1".to_string()),
                name: Some("send_email".to_string()),
                arguments: Some(String::new()),
            }]
        );
        assert_eq!(
            parse_sse_line(second).expect("parse"),
            vec![StreamChunk::ToolCallDelta {
                index: 0,
                id: None,
                name: None,
                arguments: Some("{\"body\":".to_string()),
            }]
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_sse_line("data: {not json").is_err());
    }
}
