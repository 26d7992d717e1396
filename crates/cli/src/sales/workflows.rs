use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use complai_agent::trace::traced;
use complai_agent::{Agent, RunError, RunResult, Runner, StreamEvent, Tool};
use futures_util::future::try_join_all;

use super::email_tools::{SendEmailTool, SendHtmlEmailTool};
use super::managers::{
    create_email_manager_agent, create_sales_manager_with_handoff, create_sales_manager_with_tools,
};
use super::personas::{
    create_picker_agent, create_sales_agent_tools, create_sales_agents, SalesAgents,
};
use super::Outreach;

pub const DRAFT_REQUEST: &str = "Write a cold sales email";
pub const TOOLS_DEMO_MESSAGE: &str = "Send a cold sales email addressed to 'Dear CEO'";
pub const HANDOFF_DEMO_MESSAGE: &str = "Send out a cold sales email addressed to Dear CEO from Alice";

const CANDIDATES_HEADER: &str = "Cold sales emails:\n\n";
const CANDIDATE_SEPARATOR: &str = "\n\nEmail:\n\n";

/// Writes text deltas to `out` as they arrive and returns the full answer.
pub async fn demonstrate_streaming<W: Write>(
    runner: &Runner,
    agent: &Agent,
    message: &str,
    out: &mut W,
) -> Result<String> {
    let mut streaming = runner.run_streamed(agent, message);
    while let Some(event) = streaming.next_event().await {
        if let StreamEvent::TextDelta(delta) = event {
            write!(out, "{delta}")?;
            out.flush()?;
        }
    }
    writeln!(out)?;

    let result = streaming.finish().await?;
    Ok(result.final_output)
}

/// One draft per persona, run concurrently; the output keeps persona order.
pub async fn generate_parallel_emails(
    runner: &Runner,
    agents: &SalesAgents,
    message: &str,
) -> Result<Vec<String>, RunError> {
    traced("Parallel cold emails", draft_all(runner, agents, message)).await
}

pub async fn select_best_email(
    runner: &Runner,
    agents: &SalesAgents,
    picker: &Agent,
    message: &str,
) -> Result<String, RunError> {
    traced("Selection from sales people", async {
        let drafts = draft_all(runner, agents, message).await?;
        let best = runner.run(picker, &format_candidates(&drafts)).await?;
        Ok(best.final_output)
    })
    .await
}

/// The picker's input: every draft, in order, under one header.
pub fn format_candidates(drafts: &[String]) -> String {
    format!("{CANDIDATES_HEADER}{}", drafts.join(CANDIDATE_SEPARATOR))
}

async fn draft_all(
    runner: &Runner,
    agents: &SalesAgents,
    message: &str,
) -> Result<Vec<String>, RunError> {
    let results = try_join_all(agents.all().map(|agent| runner.run(agent, message))).await?;
    Ok(results.into_iter().map(|result| result.final_output).collect())
}

/// Streaming, parallel drafting and picking; nothing is sent.
pub async fn demo_basic_workflow<W: Write>(outreach: &Outreach, out: &mut W) -> Result<String> {
    banner(out, "DEMO 1: Basic workflow")?;
    let agents = create_sales_agents(&outreach.model);

    writeln!(out, "\n1. Streaming a single draft:")?;
    demonstrate_streaming(&outreach.runner, &agents.professional, DRAFT_REQUEST, out).await?;

    writeln!(out, "\n2. Three drafts in parallel:")?;
    let drafts = generate_parallel_emails(&outreach.runner, &agents, DRAFT_REQUEST).await?;
    for (index, draft) in drafts.iter().enumerate() {
        writeln!(out, "\n--- Email {} ---\n{draft}\n", index + 1)?;
    }

    writeln!(out, "\n3. Picking the best draft:")?;
    let picker = create_picker_agent(&outreach.model);
    let best = select_best_email(&outreach.runner, &agents, &picker, DRAFT_REQUEST).await?;
    writeln!(out, "\nBest email:\n{best}\n")?;

    Ok(best)
}

/// The manager drafts through the persona tools and sends one plain-text email.
pub async fn demo_sales_manager_with_tools<W: Write>(
    outreach: &Outreach,
    out: &mut W,
) -> Result<RunResult> {
    banner(out, "DEMO 2: Sales manager with tools")?;
    let agents = create_sales_agents(&outreach.model);

    let mut tools = create_sales_agent_tools(&agents);
    tools.push(Arc::new(SendEmailTool::new(outreach.mailer.clone())));
    let manager = create_sales_manager_with_tools(&outreach.model, tools);

    writeln!(out, "\nMessage: {TOOLS_DEMO_MESSAGE}\n")?;
    let result = traced("Sales manager", outreach.runner.run(&manager, TOOLS_DEMO_MESSAGE)).await?;
    writeln!(out, "\nResult: {}\n", result.final_output)?;

    Ok(result)
}

/// The manager picks a draft and hands it to the email manager, which
/// titles, converts and sends it as HTML.
pub async fn demo_sales_manager_with_handoff<W: Write>(
    outreach: &Outreach,
    out: &mut W,
) -> Result<RunResult> {
    banner(out, "DEMO 3: Sales manager with handoff")?;
    let agents = create_sales_agents(&outreach.model);

    let tools = create_sales_agent_tools(&agents);
    let send_html_email: Arc<dyn Tool> =
        Arc::new(SendHtmlEmailTool::new(outreach.mailer.clone()));
    let email_manager = Arc::new(create_email_manager_agent(&outreach.model, send_html_email));
    let manager = create_sales_manager_with_handoff(&outreach.model, tools, email_manager);

    writeln!(out, "\nMessage: {HANDOFF_DEMO_MESSAGE}\n")?;
    let result =
        traced("Automated SDR", outreach.runner.run(&manager, HANDOFF_DEMO_MESSAGE)).await?;
    writeln!(out, "\nResult: {}\n", result.final_output)?;
    writeln!(out, "Check the recipient inbox.")?;

    Ok(result)
}

fn banner<W: Write>(out: &mut W, title: &str) -> std::io::Result<()> {
    let rule = "=".repeat(60);
    writeln!(out, "{rule}\n{title}\n{rule}")
}

#[cfg(test)]
mod tests {
    use super::format_candidates;

    #[test]
    fn candidates_are_joined_under_one_header() {
        let drafts = vec!["first".to_string(), "second".to_string(), "third".to_string()];
        assert_eq!(
            format_candidates(&drafts),
            "Cold sales emails:\n\nfirst\n\nEmail:\n\nsecond\n\nEmail:\n\nthird"
        );
    }

    #[test]
    fn single_candidate_has_no_separator() {
        assert_eq!(format_candidates(&["only".to_string()]), "Cold sales emails:\n\nonly");
    }
}
