pub mod commands;
pub mod sales;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use complai_core::config::{LoadOptions, LogFormat, LoggingConfig};

use sales::Demo;

#[derive(Debug, Parser)]
#[command(
    name = "complai",
    about = "ComplAI automated sales outreach",
    long_about = "Draft cold emails with persona agents, pick the best one and send it through SendGrid.",
    after_help = "Examples:\n  complai run\n  complai run --demo tools --demo handoff\n  complai test-email\n  complai config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a complai.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Send the test email, then run the selected outreach demos")]
    Run {
        #[arg(long = "demo", value_enum, help = "Demo to run; repeatable (default: basic)")]
        demos: Vec<Demo>,
        #[arg(long, help = "Skip the SendGrid delivery check")]
        skip_test_email: bool,
    },
    #[command(about = "Send a single test email to verify SendGrid credentials")]
    TestEmail,
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };

    let result = match cli.command {
        Command::Run { demos, skip_test_email } => {
            commands::run::run(options, &demos, skip_test_email)
        }
        Command::TestEmail => commands::test_email::run(options),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber on stderr so stdout carries only demo
/// text and the JSON summary. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    use tracing::Level;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
