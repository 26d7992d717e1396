//! The ComplAI outreach team: drafting personas, mail tools, the managers
//! that coordinate them, and the demo workflows built on top.

pub mod email_tools;
pub mod managers;
pub mod personas;
pub mod workflows;

use std::io::Write;
use std::sync::Arc;

use complai_agent::{OpenAiClient, Runner};
use complai_core::{AppConfig, ApplicationError};
use complai_mail::SendGridClient;
use tracing::warn;

use email_tools::Mailer;

/// What every workflow needs: a runner for the agents, a mailer for the
/// send tools and the model the personas use.
#[derive(Clone)]
pub struct Outreach {
    pub runner: Runner,
    pub mailer: Mailer,
    pub model: String,
}

impl Outreach {
    pub fn new(runner: Runner, mailer: Mailer, model: impl Into<String>) -> Self {
        Self { runner, mailer, model: model.into() }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ApplicationError> {
        let transport = SendGridClient::from_config(&config.mail)
            .map_err(|error| ApplicationError::Runtime(error.to_string()))?;
        let llm = OpenAiClient::from_config(&config.llm)
            .map_err(|error| ApplicationError::Runtime(error.to_string()))?;

        if !llm.is_available() {
            warn!(
                event_name = "outreach.llm.unconfigured",
                "no llm api key configured; agent runs will fail (set OPENAI_API_KEY)"
            );
        }

        let runner = Runner::new(Arc::new(llm)).with_max_turns(config.llm.max_turns);
        let mailer = Mailer::from_config(Arc::new(transport), &config.mail);
        Ok(Self::new(runner, mailer, config.llm.model.clone()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Demo {
    /// Streaming, parallel drafts and picking the best one.
    Basic,
    /// A sales manager that drafts with tools and sends plain text.
    Tools,
    /// A sales manager that hands the winner to an email manager.
    Handoff,
}

impl Demo {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Tools => "tools",
            Self::Handoff => "handoff",
        }
    }
}

pub async fn run_demo<W: Write>(
    demo: Demo,
    outreach: &Outreach,
    out: &mut W,
) -> anyhow::Result<()> {
    match demo {
        Demo::Basic => workflows::demo_basic_workflow(outreach, out).await.map(drop),
        Demo::Tools => workflows::demo_sales_manager_with_tools(outreach, out).await.map(drop),
        Demo::Handoff => workflows::demo_sales_manager_with_handoff(outreach, out).await.map(drop),
    }
}
