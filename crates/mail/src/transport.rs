use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::message::Mail;

/// Status code the mail provider returns once a message is queued.
pub const ACCEPTED: u16 = 202;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not encode mail request: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendResponse {
    pub status_code: u16,
    pub body: String,
}

impl SendResponse {
    pub fn is_accepted(&self) -> bool {
        self.status_code == ACCEPTED
    }
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<SendResponse, MailError>;
}

/// Sends `mail` once and reports the provider's verdict in the log.
///
/// A rejected message is not an error here; callers decide what a non-202
/// status means for them.
pub async fn dispatch(
    transport: &dyn MailTransport,
    mail: &Mail,
) -> Result<SendResponse, MailError> {
    let response = transport.send(mail).await?;

    if response.is_accepted() {
        info!(
            event_name = "mail.dispatch.accepted",
            status_code = response.status_code,
            subject = %mail.subject,
            content_type = mail.content.content_type.mime(),
            "mail accepted by provider"
        );
    } else {
        warn!(
            event_name = "mail.dispatch.unexpected_status",
            status_code = response.status_code,
            subject = %mail.subject,
            body = %response.body,
            "mail provider returned an unexpected status"
        );
    }

    Ok(response)
}
