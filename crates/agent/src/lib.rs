//! Agent runtime for the outreach workflows.
//!
//! A small take on the usual agent loop:
//! - **Agents** (`agent`) are personas: instructions, a model, tools and
//!   handoff targets.
//! - **Tools** (`tools`) are functions the model may call; any agent can be
//!   wrapped as a tool with [`Agent::as_tool`].
//! - **Handoffs** transfer the rest of a run to another agent; control never
//!   returns to the delegator.
//! - The **runner** (`runner`) drives the model/tool turn loop against an
//!   [`LlmClient`], optionally streaming tokens as they arrive.
//!
//! [`OpenAiClient`] speaks the OpenAI chat-completions protocol, including
//! server-sent-event streaming (`sse`).

pub mod agent;
pub mod llm;
pub mod openai;
pub mod runner;
pub mod sse;
pub mod tools;
pub mod trace;

pub use agent::{Agent, AgentTool};
pub use llm::{ChatMessage, ChatRequest, ChatResponse, LlmClient, LlmError, StreamChunk, Usage};
pub use openai::OpenAiClient;
pub use runner::{RunError, RunResult, RunResultStreaming, Runner, StreamEvent};
pub use tools::{success_marker, Tool, ToolContext, ToolRegistry};
