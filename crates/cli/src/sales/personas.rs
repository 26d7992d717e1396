use std::sync::Arc;

use complai_agent::{Agent, Tool};

pub const PROFESSIONAL_INSTRUCTIONS: &str = "You are a sales agent working for ComplAI, \
a company that provides a SaaS tool for ensuring SOC2 compliance and preparing for audits, powered by AI. \
You write professional, serious cold emails.";

pub const ENGAGING_INSTRUCTIONS: &str = "You are a humorous, engaging sales agent working for ComplAI, \
a company that provides a SaaS tool for ensuring SOC2 compliance and preparing for audits, powered by AI. \
You write witty, engaging cold emails that are likely to get a response.";

pub const BUSY_INSTRUCTIONS: &str = "You are a busy sales agent working for ComplAI, \
a company that provides a SaaS tool for ensuring SOC2 compliance and preparing for audits, powered by AI. \
You write concise, to the point cold emails.";

pub const PICKER_INSTRUCTIONS: &str = "You pick the best cold sales email from the given options. \
Imagine you are a customer and pick the one you are most likely to respond to. \
Do not give an explanation; reply with the selected email only.";

pub const SALES_TOOL_DESCRIPTION: &str = "Write a cold sales email";

/// The three drafting personas, always handled in this order.
#[derive(Clone, Debug)]
pub struct SalesAgents {
    pub professional: Agent,
    pub engaging: Agent,
    pub busy: Agent,
}

impl SalesAgents {
    pub fn all(&self) -> [&Agent; 3] {
        [&self.professional, &self.engaging, &self.busy]
    }
}

pub fn create_sales_agents(model: &str) -> SalesAgents {
    SalesAgents {
        professional: Agent::new("Professional Sales Agent")
            .with_instructions(PROFESSIONAL_INSTRUCTIONS)
            .with_model(model),
        engaging: Agent::new("Engaging Sales Agent")
            .with_instructions(ENGAGING_INSTRUCTIONS)
            .with_model(model),
        busy: Agent::new("Busy Sales Agent").with_instructions(BUSY_INSTRUCTIONS).with_model(model),
    }
}

/// `sales_agent1..3`, one per persona.
pub fn create_sales_agent_tools(agents: &SalesAgents) -> Vec<Arc<dyn Tool>> {
    agents
        .all()
        .iter()
        .enumerate()
        .map(|(index, agent)| {
            Arc::new(agent.as_tool(format!("sales_agent{}", index + 1), SALES_TOOL_DESCRIPTION))
                as Arc<dyn Tool>
        })
        .collect()
}

pub fn create_picker_agent(model: &str) -> Agent {
    Agent::new("sales_picker").with_instructions(PICKER_INSTRUCTIONS).with_model(model)
}
