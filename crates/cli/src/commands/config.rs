use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use complai_core::config::{resolve_config_path, AppConfig, LoadOptions};
use complai_core::ApplicationError;
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

const COMMAND: &str = "config";

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_error(COMMAND, &ApplicationError::from(error)),
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let lines = render(&config, config_file_doc.as_ref(), config_file_path.as_deref());
    CommandResult::success(COMMAND, "effective configuration rendered").with_details(&lines)
}

fn render(config: &AppConfig, doc: Option<&Value>, path: Option<&Path>) -> String {
    let source = |key_path: &str, env_keys: &[&str]| field_source(key_path, env_keys, doc, path);

    let llm_api_key = match &config.llm.api_key {
        Some(key) => redact_token(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    let rows = [
        (
            "mail.api_key",
            redact_token(config.mail.api_key.expose_secret()),
            source("mail.api_key", &["COMPLAI_MAIL_API_KEY", "SENDGRID_API_KEY"]),
        ),
        (
            "mail.from_email",
            config.mail.from_email.clone(),
            source("mail.from_email", &["COMPLAI_MAIL_FROM", "FROM_EMAIL"]),
        ),
        (
            "mail.to_email",
            config.mail.to_email.clone(),
            source("mail.to_email", &["COMPLAI_MAIL_TO", "TO_EMAIL"]),
        ),
        (
            "mail.base_url",
            config.mail.base_url.clone(),
            source("mail.base_url", &["COMPLAI_MAIL_BASE_URL"]),
        ),
        (
            "mail.timeout_secs",
            config.mail.timeout_secs.to_string(),
            source("mail.timeout_secs", &["COMPLAI_MAIL_TIMEOUT_SECS"]),
        ),
        (
            "llm.api_key",
            llm_api_key,
            source("llm.api_key", &["COMPLAI_LLM_API_KEY", "OPENAI_API_KEY"]),
        ),
        (
            "llm.base_url",
            config.llm.base_url.clone(),
            source("llm.base_url", &["COMPLAI_LLM_BASE_URL", "OPENAI_BASE_URL"]),
        ),
        ("llm.model", config.llm.model.clone(), source("llm.model", &["COMPLAI_LLM_MODEL"])),
        (
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            source("llm.timeout_secs", &["COMPLAI_LLM_TIMEOUT_SECS"]),
        ),
        (
            "llm.max_turns",
            config.llm.max_turns.to_string(),
            source("llm.max_turns", &["COMPLAI_LLM_MAX_TURNS"]),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", &["COMPLAI_LOGGING_LEVEL", "COMPLAI_LOG_LEVEL"]),
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            source("logging.format", &["COMPLAI_LOGGING_FORMAT", "COMPLAI_LOG_FORMAT"]),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(rows.iter().map(|(key, value, origin)| render_line(key, value, origin)));
    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_key = env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: &str) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps only a key's prefix, e.g. `SG.***` or `sk-***`.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.find(|ch: char| ch == '.' || ch == '-') {
        Some(index) => format!("{}***", &trimmed[..=index]),
        None => "<redacted>".to_string(),
    }
}
