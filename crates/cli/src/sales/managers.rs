use std::sync::Arc;

use complai_agent::{Agent, Tool};

pub const SALES_MANAGER_TOOLS_INSTRUCTIONS: &str = "You are a Sales Manager at ComplAI. \
Your goal is to find the single best cold sales email using the sales_agent tools.

Follow these steps carefully:
1. Generate Drafts: Use all three sales_agent tools to generate three different email drafts. \
Do not proceed until all three drafts are ready.

2. Evaluate and Select: Review the drafts and choose the single best email using your judgment \
of which one is most effective.

3. Use the send_email tool to send the best email (and only the best email) to the user.

Crucial Rules:
- You must use the sales agent tools to generate the drafts; do not write them yourself.
- You must send ONE email using the send_email tool, never more than one.";

pub const SALES_MANAGER_HANDOFF_INSTRUCTIONS: &str = "You are a Sales Manager at ComplAI. \
Your goal is to find the single best cold sales email using the sales_agent tools.

Follow these steps carefully:
1. Generate Drafts: Use all three sales_agent tools to generate three different email drafts. \
Do not proceed until all three drafts are ready.

2. Evaluate and Select: Review the drafts and choose the single best email using your judgment \
of which one is most effective.
You can use the tools multiple times if you're not satisfied with the results from the first try.

3. Handoff for Sending: Pass ONLY the winning email draft to the 'Email Manager' agent. \
The Email Manager will take care of formatting and sending.

Crucial Rules:
- You must use the sales agent tools to generate the drafts; do not write them yourself.
- You must hand off exactly ONE email to the Email Manager, never more than one.";

pub const SUBJECT_WRITER_INSTRUCTIONS: &str = "You can write a subject for a cold sales email. \
You are given a message and you need to write a subject for an email that is likely to get a response.";

pub const HTML_CONVERTER_INSTRUCTIONS: &str = "You can convert a text email body to an HTML email body. \
You are given a text email body which might have some markdown \
and you need to convert it to an HTML email body with simple, clear, compelling layout and design.";

pub const EMAIL_MANAGER_INSTRUCTIONS: &str = "You are an email formatter and sender. \
You receive the body of an email to be sent. \
You first use the subject_writer tool to write a subject for the email, \
then use the html_converter tool to convert the body to HTML. \
Finally, you use the send_html_email tool to send the email with the subject and HTML body.";

pub const EMAIL_MANAGER_HANDOFF_DESCRIPTION: &str = "Convert an email to HTML and send it";

pub fn create_sales_manager_with_tools(model: &str, tools: Vec<Arc<dyn Tool>>) -> Agent {
    Agent::new("Sales Manager")
        .with_instructions(SALES_MANAGER_TOOLS_INSTRUCTIONS)
        .with_model(model)
        .with_tools(tools)
}

/// Subject writer and HTML converter, in that order.
pub fn create_email_formatting_agents(model: &str) -> (Agent, Agent) {
    let subject_writer = Agent::new("Email subject writer")
        .with_instructions(SUBJECT_WRITER_INSTRUCTIONS)
        .with_model(model);
    let html_converter = Agent::new("HTML email body converter")
        .with_instructions(HTML_CONVERTER_INSTRUCTIONS)
        .with_model(model);
    (subject_writer, html_converter)
}

/// The handoff target that titles, formats and sends the winning draft.
pub fn create_email_manager_agent(model: &str, send_html_email: Arc<dyn Tool>) -> Agent {
    let (subject_writer, html_converter) = create_email_formatting_agents(model);

    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(
            subject_writer.as_tool("subject_writer", "Write a subject for a cold sales email"),
        ),
        Arc::new(
            html_converter
                .as_tool("html_converter", "Convert a text email body to an HTML email body"),
        ),
        send_html_email,
    ];

    Agent::new("Email Manager")
        .with_instructions(EMAIL_MANAGER_INSTRUCTIONS)
        .with_model(model)
        .with_tools(tools)
        .with_handoff_description(EMAIL_MANAGER_HANDOFF_DESCRIPTION)
}

pub fn create_sales_manager_with_handoff(
    model: &str,
    tools: Vec<Arc<dyn Tool>>,
    email_manager: Arc<Agent>,
) -> Agent {
    Agent::new("Sales Manager")
        .with_instructions(SALES_MANAGER_HANDOFF_INSTRUCTIONS)
        .with_model(model)
        .with_tools(tools)
        .with_handoff(email_manager)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use complai_agent::Tool;
    use complai_mail::{Mail, MailError, MailTransport, SendResponse};

    use super::{
        create_email_formatting_agents, create_email_manager_agent,
        create_sales_manager_with_handoff, create_sales_manager_with_tools,
    };
    use crate::sales::email_tools::{Mailer, SendEmailTool, SendHtmlEmailTool};
    use crate::sales::personas::{create_sales_agent_tools, create_sales_agents};

    struct Discard;

    #[async_trait]
    impl MailTransport for Discard {
        async fn send(&self, _mail: &Mail) -> Result<SendResponse, MailError> {
            Ok(SendResponse { status_code: 202, body: String::new() })
        }
    }

    fn mailer() -> Mailer {
        Mailer::new(Arc::new(Discard), "a@complai.test", "b@prospect.test")
    }

    fn tool_names(tools: &[Arc<dyn Tool>]) -> Vec<&str> {
        tools.iter().map(|tool| tool.name()).collect()
    }

    #[test]
    fn tools_manager_has_three_writers_and_send_email() {
        let mut tools = create_sales_agent_tools(&create_sales_agents("gpt-4o-mini"));
        tools.push(Arc::new(SendEmailTool::new(mailer())));

        let manager = create_sales_manager_with_tools("gpt-4o-mini", tools);

        assert_eq!(manager.name(), "Sales Manager");
        assert_eq!(
            tool_names(manager.tools()),
            vec!["sales_agent1", "sales_agent2", "sales_agent3", "send_email"]
        );
        assert!(manager.handoffs().is_empty());
        assert!(manager.instructions().contains("send_email tool"));
    }

    #[test]
    fn formatting_agents_are_named() {
        let (subject_writer, html_converter) = create_email_formatting_agents("gpt-4o-mini");
        assert_eq!(subject_writer.name(), "Email subject writer");
        assert_eq!(html_converter.name(), "HTML email body converter");
        assert_ne!(subject_writer.instructions(), html_converter.instructions());
    }

    #[test]
    fn email_manager_has_format_tools_and_handoff_description() {
        let manager =
            create_email_manager_agent("gpt-4o-mini", Arc::new(SendHtmlEmailTool::new(mailer())));

        assert_eq!(manager.name(), "Email Manager");
        assert_eq!(
            tool_names(manager.tools()),
            vec!["subject_writer", "html_converter", "send_html_email"]
        );
        assert_eq!(manager.handoff_description(), Some("Convert an email to HTML and send it"));
    }

    #[test]
    fn handoff_manager_delegates_to_the_given_email_manager() {
        let email_manager = Arc::new(create_email_manager_agent(
            "gpt-4o-mini",
            Arc::new(SendHtmlEmailTool::new(mailer())),
        ));
        let tools = create_sales_agent_tools(&create_sales_agents("gpt-4o-mini"));

        let manager =
            create_sales_manager_with_handoff("gpt-4o-mini", tools, Arc::clone(&email_manager));

        assert_eq!(manager.tools().len(), 3);
        assert_eq!(manager.handoffs().len(), 1);
        assert!(Arc::ptr_eq(&manager.handoffs()[0], &email_manager));
        assert!(manager.instructions().contains("'Email Manager'"));
    }
}
