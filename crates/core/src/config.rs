use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ADDRESS: &str = "example@example.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub mail: MailConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub api_key: SecretString,
    pub from_email: String,
    pub to_email: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_turns: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub mail_api_key: Option<String>,
    pub mail_from: Option<String>,
    pub mail_to: Option<String>,
    pub mail_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub llm_max_turns: Option<u32>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mail: MailConfig {
                api_key: String::new().into(),
                from_email: DEFAULT_ADDRESS.to_string(),
                to_email: DEFAULT_ADDRESS.to_string(),
                base_url: "https://api.sendgrid.com".to_string(),
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com".to_string(),
                model: DEFAULT_MODEL.to_string(),
                timeout_secs: 60,
                max_turns: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("complai.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(mail) = patch.mail {
            if let Some(api_key) = mail.api_key {
                self.mail.api_key = secret_value(api_key);
            }
            if let Some(from_email) = mail.from_email {
                self.mail.from_email = from_email;
            }
            if let Some(to_email) = mail.to_email {
                self.mail.to_email = to_email;
            }
            if let Some(base_url) = mail.base_url {
                self.mail.base_url = base_url;
            }
            if let Some(timeout_secs) = mail.timeout_secs {
                self.mail.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_turns) = llm.max_turns {
                self.llm.max_turns = max_turns;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env_any(&["COMPLAI_MAIL_API_KEY", "SENDGRID_API_KEY"]) {
            self.mail.api_key = secret_value(value);
        }
        if let Some(value) = read_env_any(&["COMPLAI_MAIL_FROM", "FROM_EMAIL"]) {
            self.mail.from_email = value;
        }
        if let Some(value) = read_env_any(&["COMPLAI_MAIL_TO", "TO_EMAIL"]) {
            self.mail.to_email = value;
        }
        if let Some(value) = read_env("COMPLAI_MAIL_BASE_URL") {
            self.mail.base_url = value;
        }
        if let Some(value) = read_env("COMPLAI_MAIL_TIMEOUT_SECS") {
            self.mail.timeout_secs = parse_u64("COMPLAI_MAIL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env_any(&["COMPLAI_LLM_API_KEY", "OPENAI_API_KEY"]) {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env_any(&["COMPLAI_LLM_BASE_URL", "OPENAI_BASE_URL"]) {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("COMPLAI_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("COMPLAI_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("COMPLAI_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("COMPLAI_LLM_MAX_TURNS") {
            self.llm.max_turns = parse_u32("COMPLAI_LLM_MAX_TURNS", &value)?;
        }

        if let Some(value) = read_env_any(&["COMPLAI_LOGGING_LEVEL", "COMPLAI_LOG_LEVEL"]) {
            self.logging.level = value;
        }
        if let Some(value) = read_env_any(&["COMPLAI_LOGGING_FORMAT", "COMPLAI_LOG_FORMAT"]) {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_key) = overrides.mail_api_key {
            self.mail.api_key = secret_value(api_key);
        }
        if let Some(from_email) = overrides.mail_from {
            self.mail.from_email = from_email;
        }
        if let Some(to_email) = overrides.mail_to {
            self.mail.to_email = to_email;
        }
        if let Some(base_url) = overrides.mail_base_url {
            self.mail.base_url = base_url;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(max_turns) = overrides.llm_max_turns {
            self.llm.max_turns = max_turns;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_mail(&self.mail)?;
        validate_llm(&self.llm)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Explicit path if it exists, else `complai.toml` or `config/complai.toml`.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("complai.toml"), PathBuf::from("config/complai.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_mail(mail: &MailConfig) -> Result<(), ConfigError> {
    if mail.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "mail.api_key is required. Set SENDGRID_API_KEY=xxxx in the environment or `api_key` under [mail] in complai.toml".to_string(),
        ));
    }

    let addresses = [("mail.from_email", &mail.from_email), ("mail.to_email", &mail.to_email)];
    for (field, address) in addresses {
        let address = address.trim();
        let looks_valid = address
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
            .unwrap_or(false);
        if !looks_valid {
            return Err(ConfigError::Validation(format!(
                "{field} must be an email address, got `{address}`"
            )));
        }
    }

    validate_base_url("mail.base_url", &mail.base_url)?;

    if mail.timeout_secs == 0 || mail.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "mail.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_base_url("llm.base_url", &llm.base_url)?;

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_turns == 0 {
        return Err(ConfigError::Validation(
            "llm.max_turns must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_base_url(field: &str, base_url: &str) -> Result<(), ConfigError> {
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| read_env(key))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    mail: Option<MailPatch>,
    llm: Option<LlmPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct MailPatch {
    api_key: Option<String>,
    from_email: Option<String>,
    to_email: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_turns: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, DEFAULT_ADDRESS};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const ALL_VARS: &[&str] = &[
        "COMPLAI_MAIL_API_KEY",
        "SENDGRID_API_KEY",
        "COMPLAI_MAIL_FROM",
        "FROM_EMAIL",
        "COMPLAI_MAIL_TO",
        "TO_EMAIL",
        "COMPLAI_LLM_API_KEY",
        "OPENAI_API_KEY",
        "COMPLAI_LLM_MODEL",
        "COMPLAI_LOG_LEVEL",
        "COMPLAI_LOG_FORMAT",
        "COMPLAI_LLM_MAX_TURNS",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn missing_mail_api_key_fails_before_anything_else() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let error = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => {
                return Err("expected validation failure but config load succeeded".to_string())
            }
            Err(error) => error,
        };
        let mentions_key = matches!(
            error,
            ConfigError::Validation(ref message)
                if message.contains("mail.api_key") && message.contains("SENDGRID_API_KEY")
        );
        ensure(mentions_key, "validation failure should name the missing mail api key")
    }

    #[test]
    fn sender_and_recipient_fall_back_to_defaults() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("SENDGRID_API_KEY", "SG.test");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.mail.from_email == DEFAULT_ADDRESS, "sender should use the default")?;
            ensure(config.mail.to_email == DEFAULT_ADDRESS, "recipient should use the default")?;
            ensure(config.llm.model == "gpt-4o-mini", "default model should be gpt-4o-mini")?;
            ensure(config.llm.api_key.is_none(), "llm key is optional at load time")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn conventional_env_names_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("SENDGRID_API_KEY", "SG.from-env");
        env::set_var("FROM_EMAIL", "sales@complai.test");
        env::set_var("TO_EMAIL", "ceo@prospect.test");
        env::set_var("OPENAI_API_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.mail.api_key.expose_secret() == "SG.from-env", "mail key from env")?;
            ensure(config.mail.from_email == "sales@complai.test", "sender from env")?;
            ensure(config.mail.to_email == "ceo@prospect.test", "recipient from env")?;
            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "llm key from env",
            )?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn prefixed_env_names_win_over_conventional_ones() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("SENDGRID_API_KEY", "SG.conventional");
        env::set_var("COMPLAI_MAIL_API_KEY", "SG.prefixed");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.mail.api_key.expose_secret() == "SG.prefixed",
                "prefixed key should take precedence",
            )
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("TEST_COMPLAI_SENDGRID", "SG.interpolated");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("complai.toml");
            fs::write(
                &path,
                r#"
[mail]
api_key = "${TEST_COMPLAI_SENDGRID}"
to_email = "buyer@prospect.test"

[llm]
model = "gpt-4o"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.mail.api_key.expose_secret() == "SG.interpolated",
                "mail key should be interpolated from the environment",
            )?;
            ensure(config.mail.to_email == "buyer@prospect.test", "recipient from file")?;
            ensure(config.llm.model == "gpt-4o", "model from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_COMPLAI_SENDGRID"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("COMPLAI_LLM_MODEL", "model-from-env");
        env::set_var("COMPLAI_LOG_LEVEL", "warn");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("complai.toml");
            fs::write(
                &path,
                r#"
[mail]
api_key = "SG.from-file"
from_email = "file@complai.test"

[llm]
model = "model-from-file"

[logging]
level = "error"
format = "json"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    mail_from: Some("override@complai.test".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.mail.from_email == "override@complai.test", "override sender wins")?;
            ensure(config.logging.level == "debug", "override log level wins")?;
            ensure(config.llm.model == "model-from-env", "env model wins over file")?;
            ensure(config.mail.api_key.expose_secret() == "SG.from-file", "file key is kept")?;
            ensure(matches!(config.logging.format, LogFormat::Json), "json format from file")?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn invalid_numeric_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("SENDGRID_API_KEY", "SG.test");
        env::set_var("COMPLAI_LLM_MAX_TURNS", "many");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "COMPLAI_LLM_MAX_TURNS", "error should name the variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected an invalid override error".to_string()),
        };

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn malformed_recipient_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                mail_api_key: Some("SG.test".to_string()),
                mail_to: Some("not-an-address".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let rejected = matches!(
            result,
            Err(ConfigError::Validation(ref message)) if message.contains("mail.to_email")
        );
        ensure(rejected, "recipient without @ should fail validation")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("SENDGRID_API_KEY", "SG.secret-value");
        env::set_var("OPENAI_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("SG.secret-value"), "debug output should not contain mail key")?;
            ensure(!debug.contains("sk-secret-value"), "debug output should not contain llm key")?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }
}
