use std::ops::AddAssign;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm api key is not configured (set OPENAI_API_KEY)")]
    NotConfigured,
    #[error("llm request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("llm api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid llm response: {0}")]
    InvalidResponse(String),
}

/// One message of an OpenAI-style chat transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn with_text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_text("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_text("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_text("assistant", content)
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { role: "assistant".to_string(), content, tool_calls, tool_call_id: None }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall { name: name.into(), arguments: arguments.into() },
        }
    }
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    pub arguments: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            stream: None,
            stream_options: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Wraps a single assistant message, the shape every in-process client
    /// returns.
    pub fn from_message(model: impl Into<String>, message: ChatMessage) -> Self {
        let finish_reason =
            if message.tool_calls.is_empty() { "stop" } else { "tool_calls" }.to_string();
        Self {
            id: String::new(),
            model: model.into(),
            choices: vec![Choice { index: 0, message, finish_reason: Some(finish_reason) }],
            usage: None,
        }
    }

    pub fn into_message(self) -> Result<ChatMessage, LlmError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".to_string()))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StreamChunk {
    TextDelta {
        text: String,
    },
    /// Fragment of a tool call; `id` and `name` arrive on the first fragment
    /// for a given `index`, `arguments` accumulate across fragments.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
    /// End of a choice or of the stream. OpenAI reports token usage on a
    /// trailing chunk of its own, so `usage` may arrive with no finish reason.
    Done {
        finish_reason: Option<String>,
        usage: Option<Usage>,
    },
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Streams the completion as chunks into `tx`.
    ///
    /// The default replays a regular completion, so clients without a native
    /// streaming path still work with streamed runs.
    async fn complete_stream(
        &self,
        request: &ChatRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<(), LlmError> {
        let response = self.complete(request).await?;
        let finish_reason = response.choices.first().and_then(|c| c.finish_reason.clone());
        let usage = response.usage;
        let message = response.into_message()?;

        let mut chunks = Vec::new();
        if let Some(text) = message.content.filter(|text| !text.is_empty()) {
            chunks.push(StreamChunk::TextDelta { text });
        }
        for (index, call) in message.tool_calls.into_iter().enumerate() {
            chunks.push(StreamChunk::ToolCallDelta {
                index,
                id: Some(call.id),
                name: Some(call.function.name),
                arguments: Some(call.function.arguments),
            });
        }
        chunks.push(StreamChunk::Done { finish_reason, usage });

        for chunk in chunks {
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ChatMessage, ChatRequest, ChatResponse, ToolCall, Usage};

    #[test]
    fn request_omits_empty_tools_and_stream_flag() {
        let request = ChatRequest::new("gpt-4o-mini", vec![ChatMessage::user("hello")]);
        let body = serde_json::to_value(&request).expect("serializable");

        assert_eq!(
            body,
            json!({
                "model": "gpt-4o-mini",
                "messages": [{ "role": "user", "content": "hello" }]
            })
        );
    }

    #[test]
    fn assistant_tool_call_message_serializes_openai_shape() {
        let message = ChatMessage::assistant_tool_calls(
            None,
            vec![ToolCall::function("call_1", "send_email", r#"{"body":"hi"}"#)],
        );
        let body = serde_json::to_value(&message).expect("serializable");

        assert_eq!(body["role"], "assistant");
        assert_eq!(body["content"], serde_json::Value::Null);
        assert_eq!(body["tool_calls"][0]["type"], "function");
        assert_eq!(body["tool_calls"][0]["function"]["name"], "send_email");
    }

    #[test]
    fn response_with_null_content_deserializes() {
        let response: ChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "sales_agent1", "arguments": "{\"input\":\"x\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .expect("deserializable");

        let message = response.into_message().expect("one choice");
        assert_eq!(message.text(), "");
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].function.name, "sales_agent1");
    }

    #[test]
    fn empty_choices_is_invalid() {
        let response: ChatResponse =
            serde_json::from_value(json!({ "choices": [] })).expect("deserializable");
        assert!(response.into_message().is_err());
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total += Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 };
        total += Usage { prompt_tokens: 1, completion_tokens: 2, total_tokens: 3 };
        assert_eq!(total, Usage { prompt_tokens: 11, completion_tokens: 7, total_tokens: 18 });
    }
}
