use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use complai_core::config::DEFAULT_MODEL;
use serde_json::Value;
use tracing::debug;

use crate::tools::{required_str, string_arguments, Tool, ToolContext};

/// A configured persona: name, system instructions and model, plus the
/// tools it may call and the agents it may hand the conversation to.
#[derive(Clone)]
pub struct Agent {
    name: String,
    instructions: String,
    model: String,
    tools: Vec<Arc<dyn Tool>>,
    handoffs: Vec<Arc<Agent>>,
    handoff_description: Option<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: String::new(),
            model: DEFAULT_MODEL.to_string(),
            tools: Vec::new(),
            handoffs: Vec::new(),
            handoff_description: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn with_handoff(mut self, agent: Arc<Agent>) -> Self {
        self.handoffs.push(agent);
        self
    }

    pub fn with_handoff_description(mut self, description: impl Into<String>) -> Self {
        self.handoff_description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn handoffs(&self) -> &[Arc<Agent>] {
        &self.handoffs
    }

    pub fn handoff_description(&self) -> Option<&str> {
        self.handoff_description.as_deref()
    }

    /// Wraps the agent so another agent can call it like a function and get
    /// its final output back.
    pub fn as_tool(
        &self,
        tool_name: impl Into<String>,
        description: impl Into<String>,
    ) -> AgentTool {
        AgentTool {
            agent: Arc::new(self.clone()),
            name: tool_name.into(),
            description: description.into(),
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tools: Vec<&str> = self.tools.iter().map(|tool| tool.name()).collect();
        let handoffs: Vec<&str> = self.handoffs.iter().map(|agent| agent.name()).collect();
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("tools", &tools)
            .field("handoffs", &handoffs)
            .field("handoff_description", &self.handoff_description)
            .finish()
    }
}

/// Name of the synthetic tool that transfers control to `agent`.
pub fn handoff_tool_name(agent: &Agent) -> String {
    let mut name = String::from("transfer_to_");
    let mut last_was_separator = false;
    for ch in agent.name().trim().chars() {
        if ch.is_ascii_alphanumeric() {
            name.push(ch.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            name.push('_');
            last_was_separator = true;
        }
    }
    name
}

pub fn handoff_tool_description(agent: &Agent) -> String {
    let mut description =
        format!("Handoff to the {} agent to handle the request.", agent.name());
    if let Some(extra) = agent.handoff_description() {
        description.push(' ');
        description.push_str(extra);
    }
    description
}

pub struct AgentTool {
    agent: Arc<Agent>,
    name: String,
    description: String,
}

impl AgentTool {
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        string_arguments(&[("input", "The input for the agent")])
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<Value> {
        let prompt = required_str(&input, "input")?;
        debug!(
            event_name = "agent.tool.nested_run",
            caller = ctx.agent,
            agent = self.agent.name(),
            "running agent as tool"
        );
        let result = ctx.runner.run(&self.agent, prompt).await?;
        Ok(Value::String(result.final_output))
    }
}
