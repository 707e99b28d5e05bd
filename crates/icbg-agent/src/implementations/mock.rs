//! Scripted agent backend for tests.

use crate::{AgentError, AgentInterface, AgentRequest, AgentResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

/// Agent that returns a fixed output or a fixed failure.
///
/// Scripted tool calls are executed against the request's tools before the
/// output is returned, and their results are recorded.
pub struct MockAgent {
	output: Result<String, String>,
	tool_calls: Vec<(String, Value)>,
	call_count: AtomicU32,
	prompts: Mutex<Vec<String>>,
	tool_servers: Mutex<Vec<Vec<String>>>,
	tool_results: Mutex<Vec<Value>>,
}

impl Default for MockAgent {
	fn default() -> Self {
		Self::new()
	}
}

impl MockAgent {
	pub fn new() -> Self {
		Self {
			output: Ok(String::new()),
			tool_calls: Vec::new(),
			call_count: AtomicU32::new(0),
			prompts: Mutex::new(Vec::new()),
			tool_servers: Mutex::new(Vec::new()),
			tool_results: Mutex::new(Vec::new()),
		}
	}

	pub fn with_response(mut self, output: impl Into<String>) -> Self {
		self.output = Ok(output.into());
		self
	}

	/// Makes every run fail with [`AgentError::Unavailable`].
	pub fn failing(mut self, message: impl Into<String>) -> Self {
		self.output = Err(message.into());
		self
	}

	/// Calls the named tool with `arguments` on every run.
	pub fn with_tool_call(mut self, name: impl Into<String>, arguments: Value) -> Self {
		self.tool_calls.push((name.into(), arguments));
		self
	}

	pub fn call_count(&self) -> u32 {
		self.call_count.load(Ordering::SeqCst)
	}

	pub async fn prompts(&self) -> Vec<String> {
		self.prompts.lock().await.clone()
	}

	pub async fn tool_servers(&self) -> Vec<Vec<String>> {
		self.tool_servers.lock().await.clone()
	}

	pub async fn tool_results(&self) -> Vec<Value> {
		self.tool_results.lock().await.clone()
	}
}

#[async_trait]
impl AgentInterface for MockAgent {
	async fn run(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
		self.call_count.fetch_add(1, Ordering::SeqCst);
		self.prompts.lock().await.push(request.prompt.clone());
		self.tool_servers
			.lock()
			.await
			.push(request.tool_servers.clone());

		for (name, arguments) in &self.tool_calls {
			let tool = request
				.tool(name)
				.ok_or_else(|| AgentError::Tool(format!("unknown tool: {}", name)))?;
			let result = tool.call(arguments.clone()).await?;
			self.tool_results.lock().await.push(result);
		}

		match &self.output {
			Ok(output) => Ok(AgentResponse {
				final_output: output.clone(),
			}),
			Err(message) => Err(AgentError::Unavailable(message.clone())),
		}
	}
}
