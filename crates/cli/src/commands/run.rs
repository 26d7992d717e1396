use std::io::{self, Write};

use complai_core::config::{AppConfig, LoadOptions};
use complai_core::ApplicationError;
use tracing::{error, info, warn};

use crate::commands::{build_runtime, test_email, CommandResult};
use crate::init_logging;
use crate::sales::{run_demo, Demo, Outreach};

const COMMAND: &str = "run";

pub fn run(options: LoadOptions, demos: &[Demo], skip_test_email: bool) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_error(COMMAND, &ApplicationError::from(error)),
    };
    init_logging(&config.logging);

    let demos = if demos.is_empty() { vec![Demo::Basic] } else { demos.to_vec() };
    let outcome = build_runtime().and_then(|runtime| {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        runtime.block_on(execute(&config, &demos, skip_test_email, &mut out))
    });

    match outcome {
        Ok(message) => CommandResult::success(COMMAND, message),
        Err(error) => CommandResult::from_error(COMMAND, &error),
    }
}

/// Delivery check, then each demo in order; the first failing demo ends the
/// run.
pub async fn execute<W: Write>(
    config: &AppConfig,
    demos: &[Demo],
    skip_test_email: bool,
    out: &mut W,
) -> Result<String, ApplicationError> {
    if skip_test_email {
        info!(event_name = "mail.test_email.skipped", "test email skipped");
    } else {
        match test_email::execute(config, out).await {
            Ok(message) => {
                info!(event_name = "mail.test_email.checked", %message, "test email checked")
            }
            Err(error) => {
                error!(event_name = "mail.test_email.failed", error = %error, "test email failed");
                warn!(
                    event_name = "mail.test_email.continuing",
                    "continuing without email delivery"
                );
            }
        }
    }

    let outreach = Outreach::from_config(config)?;
    for demo in demos {
        info!(event_name = "outreach.demo.started", demo = demo.as_str(), "demo started");
        if let Err(failure) = run_demo(*demo, &outreach, out).await {
            error!(
                event_name = "outreach.demo.failed",
                demo = demo.as_str(),
                error = %failure,
                "demo failed"
            );
            return Err(ApplicationError::Agent(format!(
                "demo `{}` failed: {failure}",
                demo.as_str()
            )));
        }
    }

    let names: Vec<&str> = demos.iter().map(Demo::as_str).collect();
    Ok(format!("completed demos: {}", names.join(", ")))
}
