//! Shared foundation for the ComplAI outreach workspace: layered
//! configuration and the application error taxonomy.

pub mod config;
pub mod errors;

pub use config::{AppConfig, ConfigError, LlmConfig, LoadOptions, LogFormat, MailConfig};
pub use errors::ApplicationError;
