use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use complai_agent::tools::{required_str, string_arguments};
use complai_agent::{success_marker, Tool, ToolContext};
use complai_core::config::MailConfig;
use complai_mail::{dispatch, Content, Mail, MailError, MailTransport, SendResponse};
use serde_json::Value;

pub const SALES_EMAIL_SUBJECT: &str = "Sales email";
pub const TEST_EMAIL_SUBJECT: &str = "Test email";
pub const TEST_EMAIL_BODY: &str = "This is an important test email";

/// A transport bound to the configured sender and recipient.
#[derive(Clone)]
pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    from: String,
    to: String,
}

impl Mailer {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self { transport, from: from.into(), to: to.into() }
    }

    pub fn from_config(transport: Arc<dyn MailTransport>, config: &MailConfig) -> Self {
        Self::new(transport, config.from_email.clone(), config.to_email.clone())
    }

    pub async fn send(
        &self,
        subject: &str,
        content: Content,
    ) -> Result<SendResponse, MailError> {
        let mail = Mail::new(self.from.clone(), self.to.clone(), subject, content);
        dispatch(self.transport.as_ref(), &mail).await
    }
}

/// Sends a plain-text body under the fixed sales subject.
pub struct SendEmailTool {
    mailer: Mailer,
}

impl SendEmailTool {
    pub fn new(mailer: Mailer) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send out an email with the given body to all sales prospects"
    }

    fn parameters(&self) -> Value {
        string_arguments(&[("body", "The plain-text body of the email")])
    }

    async fn execute(&self, _ctx: &ToolContext<'_>, input: Value) -> Result<Value> {
        let body = required_str(&input, "body")?;
        self.mailer.send(SALES_EMAIL_SUBJECT, Content::plain(body)).await?;
        Ok(success_marker())
    }
}

pub struct SendHtmlEmailTool {
    mailer: Mailer,
}

impl SendHtmlEmailTool {
    pub fn new(mailer: Mailer) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl Tool for SendHtmlEmailTool {
    fn name(&self) -> &str {
        "send_html_email"
    }

    fn description(&self) -> &str {
        "Send out an email with the given subject and HTML body to all sales prospects"
    }

    fn parameters(&self) -> Value {
        string_arguments(&[
            ("subject", "The subject line of the email"),
            ("html_body", "The HTML body of the email"),
        ])
    }

    async fn execute(&self, _ctx: &ToolContext<'_>, input: Value) -> Result<Value> {
        let subject = required_str(&input, "subject")?;
        let html_body = required_str(&input, "html_body")?;
        self.mailer.send(subject, Content::html(html_body)).await?;
        Ok(success_marker())
    }
}

/// Delivery check run before any agent: a 202 means the key and sender are
/// good. The status goes to `out`; `dispatch` already warns on anything else.
pub async fn send_test_email<W: Write>(mailer: &Mailer, out: &mut W) -> Result<SendResponse> {
    let response = mailer.send(TEST_EMAIL_SUBJECT, Content::plain(TEST_EMAIL_BODY)).await?;

    writeln!(out, "SendGrid status: {}", response.status_code)?;
    if response.is_accepted() {
        writeln!(out, "Test email sent. Check the recipient inbox.")?;
    } else {
        writeln!(out, "Unexpected status: {}", response.status_code)?;
    }

    Ok(response)
}
