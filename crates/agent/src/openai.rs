//! OpenAI chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use complai_core::config::LlmConfig;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::llm::{ChatRequest, ChatResponse, LlmClient, LlmError, StreamChunk, StreamOptions};
use crate::sse::parse_sse_line;

pub struct OpenAiClient {
    api_key: Option<SecretString>,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        api_key: Option<SecretString>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { api_key, base_url, http })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn is_available(&self) -> bool {
        self.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn bearer(&self) -> Result<String, LlmError> {
        match &self.api_key {
            Some(key) if !key.expose_secret().trim().is_empty() => {
                Ok(format!("Bearer {}", key.expose_secret()))
            }
            _ => Err(LlmError::NotConfigured),
        }
    }

    async fn post(
        &self,
        request: &ChatRequest,
        accept: &str,
    ) -> Result<reqwest::Response, LlmError> {
        let bearer = self.bearer()?;
        let response = self
            .http
            .post(self.completions_url())
            .header("Authorization", bearer)
            .header("Content-Type", "application/json")
            .header("Accept", accept)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), body });
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let started = std::time::Instant::now();
        let response = self.post(request, "application/json").await?;
        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;

        debug!(
            event_name = "llm.openai.completed",
            model = %request.model,
            total_tokens = completion.usage.map(|usage| usage.total_tokens).unwrap_or(0),
            latency_ms = started.elapsed().as_millis() as u64,
            "chat completion finished"
        );
        Ok(completion)
    }

    async fn complete_stream(
        &self,
        request: &ChatRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<(), LlmError> {
        let mut streaming = request.clone();
        streaming.stream = Some(true);
        streaming.stream_options = Some(StreamOptions { include_usage: true });

        let response = self.post(&streaming, "text/event-stream").await?;
        let mut bytes = response.bytes_stream();
        // Network chunks can end inside a multi-byte character, so only
        // complete lines are decoded.
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(next) = bytes.next().await {
            buffer.extend_from_slice(&next?);

            while let Some(newline) = buffer.iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                if !forward_line(&line, &tx).await {
                    return Ok(());
                }
            }
        }

        if !buffer.is_empty() {
            forward_line(&buffer, &tx).await;
        }

        debug!(
            event_name = "llm.openai.stream_finished",
            model = %request.model,
            "stream finished"
        );
        Ok(())
    }
}

/// Returns `false` once the receiver is gone.
async fn forward_line(line: &[u8], tx: &mpsc::Sender<StreamChunk>) -> bool {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line,
        Err(error) => {
            warn!(event_name = "llm.openai.stream_invalid_utf8", error = %error, "skipping line");
            return true;
        }
    };
    let chunks = match parse_sse_line(line) {
        Ok(chunks) => chunks,
        Err(error) => {
            warn!(event_name = "llm.openai.stream_parse_error", error = %error, "skipping line");
            return true;
        }
    };

    for chunk in chunks {
        if tx.send(chunk).await.is_err() {
            return false;
        }
    }
    true
}
