use std::io::{self, Write};
use std::sync::Arc;

use complai_core::config::{AppConfig, LoadOptions};
use complai_core::ApplicationError;
use complai_mail::SendGridClient;
use tracing::error;

use crate::commands::{build_runtime, CommandResult};
use crate::init_logging;
use crate::sales::email_tools::{send_test_email, Mailer};

const COMMAND: &str = "test-email";

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_error(COMMAND, &ApplicationError::from(error)),
    };
    init_logging(&config.logging);

    let outcome = build_runtime().and_then(|runtime| {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        runtime.block_on(execute(&config, &mut out))
    });
    match outcome {
        Ok(message) => CommandResult::success(COMMAND, message),
        Err(error) => {
            error!(event_name = "mail.test_email.failed", error = %error, "test email failed");
            CommandResult::from_error(COMMAND, &error)
        }
    }
}

/// Sends the delivery check mail; a non-202 status is reported, not failed.
pub async fn execute<W: Write>(
    config: &AppConfig,
    out: &mut W,
) -> Result<String, ApplicationError> {
    let transport = SendGridClient::from_config(&config.mail)
        .map_err(|error| ApplicationError::Delivery(error.to_string()))?;
    let mailer = Mailer::from_config(Arc::new(transport), &config.mail);

    let response = send_test_email(&mailer, out)
        .await
        .map_err(|error| ApplicationError::Delivery(format!("{error:#}")))?;

    Ok(if response.is_accepted() {
        format!("test email accepted (status {})", response.status_code)
    } else {
        format!("test email returned unexpected status {}", response.status_code)
    })
}
