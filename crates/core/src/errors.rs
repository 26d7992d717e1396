use thiserror::Error;

use crate::config::ConfigError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("mail delivery failure: {0}")]
    Delivery(String),
    #[error("agent run failure: {0}")]
    Agent(String),
    #[error("runtime failure: {0}")]
    Runtime(String),
}

impl ApplicationError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "config_validation",
            Self::Delivery(_) => "mail_delivery",
            Self::Agent(_) => "agent_run",
            Self::Runtime(_) => "runtime",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::Delivery(_) | Self::Agent(_) | Self::Runtime(_) => 1,
        }
    }
}

impl From<ConfigError> for ApplicationError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ConfigError;
    use crate::errors::ApplicationError;

    #[test]
    fn config_error_maps_to_configuration_class() {
        let error = ApplicationError::from(ConfigError::Validation(
            "mail.api_key is required".to_owned(),
        ));

        assert!(matches!(error, ApplicationError::Configuration(ref message)
            if message.contains("mail.api_key")));
        assert_eq!(error.error_class(), "config_validation");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn workflow_failures_exit_with_generic_code() {
        let delivery = ApplicationError::Delivery("connection refused".to_owned());
        let agent = ApplicationError::Agent("max turns exceeded".to_owned());

        assert_eq!(delivery.error_class(), "mail_delivery");
        assert_eq!(agent.error_class(), "agent_run");
        assert_eq!(delivery.exit_code(), 1);
        assert_eq!(agent.exit_code(), 1);
    }
}
