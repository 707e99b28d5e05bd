//! AI delegate contract.
//!
//! An agent receives a natural-language prompt, an optional set of local
//! tools it may invoke, and a list of remote tool-server identifiers. It
//! returns its final text output. Callers own the interpretation of that
//! output; this crate only moves prompts and tool calls.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub mod implementations {
	pub mod disabled;
	pub mod mock;
	pub mod openai;
}

/// Errors that can occur while running an agent.
#[derive(Debug, Error)]
pub enum AgentError {
	#[error("Agent unavailable: {0}")]
	Unavailable(String),
	#[error("Request failed: {0}")]
	RequestFailed(String),
	#[error("Rate limited by agent backend")]
	RateLimited,
	#[error("Invalid agent response: {0}")]
	InvalidResponse(String),
	#[error("Tool error: {0}")]
	Tool(String),
	#[error("Agent did not finish within {0} turns")]
	TurnLimit(usize),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A local function the agent may call while producing its answer.
#[async_trait]
pub trait AgentTool: Send + Sync {
	fn name(&self) -> &str;

	fn description(&self) -> &str;

	/// JSON schema of the arguments object.
	fn parameters(&self) -> Value;

	async fn call(&self, arguments: Value) -> Result<Value, AgentError>;
}

/// A single agent invocation.
#[derive(Clone)]
pub struct AgentRequest {
	pub prompt: String,
	pub model: String,
	pub tools: Vec<Arc<dyn AgentTool>>,
	/// Remote tool servers the backend should attach.
	pub tool_servers: Vec<String>,
	/// JSON schema the final output must satisfy, when supported.
	pub response_schema: Option<Value>,
}

impl AgentRequest {
	pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
		Self {
			prompt: prompt.into(),
			model: model.into(),
			tools: Vec::new(),
			tool_servers: Vec::new(),
			response_schema: None,
		}
	}

	pub fn with_tool(mut self, tool: Arc<dyn AgentTool>) -> Self {
		self.tools.push(tool);
		self
	}

	pub fn with_tool_servers(mut self, servers: Vec<String>) -> Self {
		self.tool_servers = servers;
		self
	}

	pub fn with_response_schema(mut self, schema: Value) -> Self {
		self.response_schema = Some(schema);
		self
	}

	/// Looks up a tool by name.
	pub fn tool(&self, name: &str) -> Option<&Arc<dyn AgentTool>> {
		self.tools.iter().find(|t| t.name() == name)
	}
}

impl fmt::Debug for AgentRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AgentRequest")
			.field("model", &self.model)
			.field("prompt_len", &self.prompt.len())
			.field(
				"tools",
				&self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
			)
			.field("tool_servers", &self.tool_servers)
			.finish()
	}
}

/// Result of an agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
	pub final_output: String,
}

/// Interface implemented by agent backends.
#[async_trait]
pub trait AgentInterface: Send + Sync {
	async fn run(&self, request: AgentRequest) -> Result<AgentResponse, AgentError>;
}

/// Facade over the configured agent backend.
pub struct AgentService {
	backend: Box<dyn AgentInterface>,
}

impl AgentService {
	pub fn new(backend: Box<dyn AgentInterface>) -> Self {
		Self { backend }
	}

	pub async fn run(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
		debug!(?request, "Running agent");
		let response = self.backend.run(request).await?;
		debug!(output_len = response.final_output.len(), "Agent finished");
		Ok(response)
	}
}

/// Constructor for a backend from its config table.
pub type AgentFactory = fn(&toml::Value) -> Result<Box<dyn AgentInterface>, AgentError>;

/// Registered backends by name.
pub fn get_all_implementations() -> Vec<(&'static str, AgentFactory)> {
	vec![
		("openai", implementations::openai::create_agent),
		("disabled", implementations::disabled::create_agent),
	]
}

/// Builds the named backend.
pub fn create_agent(
	implementation: &str,
	config: &toml::Value,
) -> Result<Box<dyn AgentInterface>, AgentError> {
	let factory = get_all_implementations()
		.into_iter()
		.find(|(name, _)| *name == implementation)
		.map(|(_, factory)| factory)
		.ok_or_else(|| {
			AgentError::Configuration(format!("Unknown agent implementation: {}", implementation))
		})?;
	factory(config)
}
