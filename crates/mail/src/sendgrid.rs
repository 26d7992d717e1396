use std::time::Duration;

use async_trait::async_trait;
use complai_core::config::MailConfig;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::message::Mail;
use crate::transport::{MailError, MailTransport, SendResponse};

/// SendGrid v3 client.
pub struct SendGridClient {
    api_key: SecretString,
    base_url: String,
    http: reqwest::Client,
}

impl SendGridClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { api_key, base_url, http })
    }

    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn send_url(&self) -> String {
        format!("{}/v3/mail/send", self.base_url)
    }
}

#[async_trait]
impl MailTransport for SendGridClient {
    async fn send(&self, mail: &Mail) -> Result<SendResponse, MailError> {
        let body = serde_json::to_vec(&mail.to_request_body())?;

        debug!(
            event_name = "mail.sendgrid.request",
            subject = %mail.subject,
            bytes = body.len(),
            "posting mail to sendgrid"
        );

        let response = self
            .http
            .post(self.send_url())
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        Ok(SendResponse { status_code, body })
    }
}
