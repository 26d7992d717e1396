use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::{handoff_tool_description, handoff_tool_name, Agent};
use crate::llm::{ChatMessage, ChatRequest, LlmClient, LlmError, StreamChunk, ToolCall, Usage};
use crate::tools::{function_definition, ToolContext, ToolRegistry};

pub const DEFAULT_MAX_TURNS: u32 = 10;

const STREAM_BUFFER: usize = 64;
const EXTRA_HANDOFF_REPLY: &str = "Multiple handoffs detected, ignoring this one.";

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("agent `{agent}` called unknown tool `{tool}`")]
    UnknownTool { agent: String, tool: String },
    #[error("invalid arguments for tool `{tool}`: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("run exceeded the limit of {0} turns")]
    MaxTurnsExceeded(u32),
    #[error("streamed run aborted: {0}")]
    Aborted(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunResult {
    pub final_output: String,
    /// The agent that produced the final output; differs from the starting
    /// agent after a handoff.
    pub last_agent: String,
    pub turns: u32,
    pub usage: Usage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCalled { agent: String, tool: String },
    ToolOutput { tool: String, output: String },
    Handoff { from: String, to: String },
}

pub struct RunResultStreaming {
    events: mpsc::Receiver<StreamEvent>,
    handle: JoinHandle<Result<RunResult, RunError>>,
}

impl RunResultStreaming {
    /// Next event, or `None` once the run has finished emitting.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub async fn finish(self) -> Result<RunResult, RunError> {
        drop(self.events);
        self.handle.await.map_err(|error| RunError::Aborted(error.to_string()))?
    }
}

/// Drives agents through the model/tool turn loop.
#[derive(Clone)]
pub struct Runner {
    client: Arc<dyn LlmClient>,
    max_turns: u32,
}

impl Runner {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client, max_turns: DEFAULT_MAX_TURNS }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub async fn run(&self, agent: &Agent, input: &str) -> Result<RunResult, RunError> {
        self.run_loop(agent, input, None).await
    }

    /// Starts the run on a background task; text deltas and tool activity
    /// arrive as [`StreamEvent`]s while it progresses.
    pub fn run_streamed(&self, agent: &Agent, input: impl Into<String>) -> RunResultStreaming {
        let (tx, events) = mpsc::channel(STREAM_BUFFER);
        let runner = self.clone();
        let agent = agent.clone();
        let input = input.into();

        let handle = tokio::spawn(async move { runner.run_loop(&agent, &input, Some(&tx)).await });

        RunResultStreaming { events, handle }
    }

    async fn run_loop(
        &self,
        agent: &Agent,
        input: &str,
        events: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Result<RunResult, RunError> {
        let mut current = Arc::new(agent.clone());
        let mut history = vec![ChatMessage::user(input)];
        let mut usage = Usage::default();

        info!(event_name = "agent.run.started", agent = current.name(), "agent run started");

        for turn in 1..=self.max_turns {
            let tools: ToolRegistry = current.tools().iter().cloned().collect();
            let request = build_request(&current, &tools, &history);

            debug!(
                event_name = "agent.run.turn",
                agent = current.name(),
                turn,
                messages = request.messages.len(),
                tools = request.tools.len(),
                "requesting completion"
            );

            let (message, turn_usage) = match events {
                Some(events) => self.stream_turn(&request, events).await?,
                None => self.complete_turn(&request).await?,
            };
            usage += turn_usage;

            if message.tool_calls.is_empty() {
                info!(
                    event_name = "agent.run.finished",
                    agent = current.name(),
                    turns = turn,
                    total_tokens = usage.total_tokens,
                    "agent run finished"
                );
                return Ok(RunResult {
                    final_output: message.content.unwrap_or_default(),
                    last_agent: current.name().to_string(),
                    turns: turn,
                    usage,
                });
            }

            let calls = message.tool_calls.clone();
            history.push(message);

            let mut transfer: Option<Arc<Agent>> = None;
            for call in &calls {
                let target = current
                    .handoffs()
                    .iter()
                    .find(|candidate| handoff_tool_name(candidate) == call.function.name);
                if let Some(target) = target {
                    let reply = if transfer.is_some() {
                        EXTRA_HANDOFF_REPLY.to_string()
                    } else {
                        transfer = Some(Arc::clone(target));
                        json!({ "assistant": target.name() }).to_string()
                    };
                    history.push(ChatMessage::tool(call.id.clone(), reply));
                    continue;
                }

                let output = self.call_tool(&current, &tools, call, events).await?;
                history.push(ChatMessage::tool(call.id.clone(), output));
            }

            if let Some(target) = transfer {
                info!(
                    event_name = "agent.run.handoff",
                    from = current.name(),
                    to = target.name(),
                    "control transferred"
                );
                emit(
                    events,
                    StreamEvent::Handoff {
                        from: current.name().to_string(),
                        to: target.name().to_string(),
                    },
                )
                .await;
                current = target;
            }
        }

        warn!(
            event_name = "agent.run.max_turns_exceeded",
            agent = current.name(),
            max_turns = self.max_turns,
            "agent run gave up"
        );
        Err(RunError::MaxTurnsExceeded(self.max_turns))
    }

    async fn call_tool(
        &self,
        agent: &Agent,
        tools: &ToolRegistry,
        call: &ToolCall,
        events: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Result<String, RunError> {
        let name = call.function.name.as_str();
        let tool = tools.get(name).ok_or_else(|| RunError::UnknownTool {
            agent: agent.name().to_string(),
            tool: name.to_string(),
        })?;
        let arguments = parse_arguments(call)?;

        emit(
            events,
            StreamEvent::ToolCalled { agent: agent.name().to_string(), tool: name.to_string() },
        )
        .await;

        let ctx = ToolContext { runner: self, agent: agent.name() };
        let output = match tool.execute(&ctx, arguments).await {
            Ok(value) => render_output(value),
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    agent = agent.name(),
                    tool = name,
                    error = %error,
                    "tool failed; reporting error to the model"
                );
                json!({ "error": error.to_string() }).to_string()
            }
        };

        emit(events, StreamEvent::ToolOutput { tool: name.to_string(), output: output.clone() })
            .await;
        Ok(output)
    }

    async fn complete_turn(&self, request: &ChatRequest) -> Result<(ChatMessage, Usage), RunError> {
        let response = self.client.complete(request).await?;
        let usage = response.usage.unwrap_or_default();
        Ok((response.into_message()?, usage))
    }

    async fn stream_turn(
        &self,
        request: &ChatRequest,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<(ChatMessage, Usage), RunError> {
        let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);
        let producer = self.client.complete_stream(request, tx);
        let consumer = async move {
            let mut text = String::new();
            let mut partials: Vec<PartialCall> = Vec::new();
            let mut usage = Usage::default();

            while let Some(chunk) = rx.recv().await {
                match chunk {
                    StreamChunk::TextDelta { text: delta } => {
                        text.push_str(&delta);
                        let _ = events.send(StreamEvent::TextDelta(delta)).await;
                    }
                    StreamChunk::ToolCallDelta { index, id, name, arguments } => {
                        // Indices open one new call at a time.
                        if index > partials.len() {
                            return Err(LlmError::InvalidResponse(format!(
                                "tool call index {index} skips ahead of {} open calls",
                                partials.len()
                            )));
                        }
                        if index == partials.len() {
                            partials.push(PartialCall::default());
                        }
                        let partial = &mut partials[index];
                        if let Some(id) = id {
                            partial.id = id;
                        }
                        if let Some(name) = name {
                            partial.name.push_str(&name);
                        }
                        if let Some(arguments) = arguments {
                            partial.arguments.push_str(&arguments);
                        }
                    }
                    StreamChunk::Done { usage: Some(reported), .. } => usage += reported,
                    StreamChunk::Done { usage: None, .. } => {}
                }
            }
            Ok((text, partials, usage))
        };

        let (produced, consumed) = tokio::join!(producer, consumer);
        produced?;
        let (text, partials, usage) = consumed?;

        let tool_calls: Vec<ToolCall> = partials
            .into_iter()
            .filter(|partial| !partial.name.is_empty())
            .map(|partial| ToolCall::function(partial.id, partial.name, partial.arguments))
            .collect();
        let content = if text.is_empty() { None } else { Some(text) };

        Ok((ChatMessage::assistant_tool_calls(content, tool_calls), usage))
    }
}

#[derive(Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

fn build_request(agent: &Agent, tools: &ToolRegistry, history: &[ChatMessage]) -> ChatRequest {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(agent.instructions()));
    messages.extend(history.iter().cloned());

    let mut request = ChatRequest::new(agent.model(), messages);
    request.tools = tools.definitions();
    request.tools.extend(agent.handoffs().iter().map(|target| {
        function_definition(
            &handoff_tool_name(target),
            &handoff_tool_description(target),
            json!({ "type": "object", "properties": {}, "additionalProperties": false }),
        )
    }));
    request
}

fn parse_arguments(call: &ToolCall) -> Result<Value, RunError> {
    let raw = call.function.arguments.trim();
    if raw.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw).map_err(|error| RunError::InvalidArguments {
        tool: call.function.name.clone(),
        reason: error.to_string(),
    })
}

fn render_output(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

async fn emit(events: Option<&mpsc::Sender<StreamEvent>>, event: StreamEvent) {
    if let Some(events) = events {
        let _ = events.send(event).await;
    }
}
