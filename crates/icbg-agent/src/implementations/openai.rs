//! OpenAI-compatible chat-completions agent.
//!
//! Runs a tool-calling loop: local tool calls requested by the model are
//! executed and their results fed back until the model answers with content.

use crate::{AgentError, AgentInterface, AgentRequest, AgentResponse, AgentTool};
use async_trait::async_trait;
use icbg_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_MAX_TURNS: usize = 6;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Agent backed by any OpenAI-compatible chat-completions API.
pub struct OpenAiAgent {
	client: Client,
	base_url: String,
	api_key: Option<String>,
	max_turns: usize,
}

impl OpenAiAgent {
	pub fn new(
		base_url: impl Into<String>,
		api_key: Option<String>,
		timeout: Duration,
	) -> Result<Self, AgentError> {
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| AgentError::Configuration(format!("failed to build HTTP client: {}", e)))?;
		Ok(Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
			api_key,
			max_turns: DEFAULT_MAX_TURNS,
		})
	}

	pub fn with_max_turns(mut self, max_turns: usize) -> Self {
		self.max_turns = max_turns.max(1);
		self
	}

	fn chat_completions_url(&self) -> String {
		format!("{}/chat/completions", self.base_url)
	}

	async fn complete(&self, body: &ChatRequest<'_>) -> Result<ChatMessage, AgentError> {
		let mut http_request = self.client.post(self.chat_completions_url());
		if let Some(key) = &self.api_key {
			http_request = http_request.bearer_auth(key);
		}

		let response = http_request
			.json(body)
			.send()
			.await
			.map_err(|e| AgentError::RequestFailed(e.to_string()))?;

		let status = response.status();
		if status.as_u16() == 429 {
			return Err(AgentError::RateLimited);
		}
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(AgentError::RequestFailed(format!("HTTP {}: {}", status, body)));
		}

		let chat_response: ChatResponse = response
			.json()
			.await
			.map_err(|e| AgentError::InvalidResponse(e.to_string()))?;

		chat_response
			.choices
			.into_iter()
			.next()
			.map(|choice| choice.message)
			.ok_or_else(|| AgentError::InvalidResponse("No choices in response".to_string()))
	}

	/// Runs one requested tool call and renders the result for the model.
	///
	/// Unknown tools and tool failures are reported back to the model rather
	/// than aborting the run.
	async fn execute_tool_call(tools: &[Arc<dyn AgentTool>], call: &ToolCall) -> String {
		let Some(tool) = tools.iter().find(|t| t.name() == call.function.name) else {
			warn!(tool = %call.function.name, "Model requested unknown tool");
			return json!({ "error": format!("unknown tool: {}", call.function.name) })
				.to_string();
		};

		let arguments = match serde_json::from_str::<Value>(&call.function.arguments) {
			Ok(arguments) => arguments,
			Err(e) => return json!({ "error": format!("invalid arguments: {}", e) }).to_string(),
		};

		match tool.call(arguments).await {
			Ok(result) => result.to_string(),
			Err(e) => {
				warn!(tool = %call.function.name, error = %e, "Tool call failed");
				json!({ "error": e.to_string() }).to_string()
			}
		}
	}
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
	model: &'a str,
	messages: &'a [ChatMessage],
	#[serde(skip_serializing_if = "Vec::is_empty")]
	tools: Vec<ToolDefinition>,
	#[serde(skip_serializing_if = "Option::is_none")]
	response_format: Option<Value>,
	#[serde(skip_serializing_if = "is_empty_slice")]
	mcp_servers: &'a [String],
}

fn is_empty_slice(servers: &&[String]) -> bool {
	servers.is_empty()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
	role: String,
	#[serde(default)]
	content: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	tool_calls: Vec<ToolCall>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	tool_call_id: Option<String>,
}

impl ChatMessage {
	fn user(content: &str) -> Self {
		Self {
			role: "user".to_string(),
			content: Some(content.to_string()),
			tool_calls: Vec::new(),
			tool_call_id: None,
		}
	}

	fn tool_result(call_id: &str, content: String) -> Self {
		Self {
			role: "tool".to_string(),
			content: Some(content),
			tool_calls: Vec::new(),
			tool_call_id: Some(call_id.to_string()),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCall {
	id: String,
	#[serde(rename = "type", default = "function_type")]
	kind: String,
	function: FunctionCall,
}

fn function_type() -> String {
	"function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
	name: String,
	#[serde(default)]
	arguments: String,
}

#[derive(Debug, Serialize)]
struct ToolDefinition {
	#[serde(rename = "type")]
	kind: &'static str,
	function: FunctionDefinition,
}

#[derive(Debug, Serialize)]
struct FunctionDefinition {
	name: String,
	description: String,
	parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
	choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
	message: ChatMessage,
}

fn response_format(schema: &Value) -> Value {
	json!({
		"type": "json_schema",
		"json_schema": {
			"name": "structured_output",
			"strict": true,
			"schema": schema,
		}
	})
}

#[async_trait]
impl AgentInterface for OpenAiAgent {
	async fn run(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
		let mut messages = vec![ChatMessage::user(&request.prompt)];
		let format = request.response_schema.as_ref().map(response_format);

		for turn in 0..self.max_turns {
			let tools = request
				.tools
				.iter()
				.map(|tool| ToolDefinition {
					kind: "function",
					function: FunctionDefinition {
						name: tool.name().to_string(),
						description: tool.description().to_string(),
						parameters: tool.parameters(),
					},
				})
				.collect();
			let body = ChatRequest {
				model: &request.model,
				messages: &messages,
				tools,
				response_format: format.clone(),
				mcp_servers: &request.tool_servers,
			};

			let message = self.complete(&body).await?;

			if message.tool_calls.is_empty() {
				debug!(turn, "Agent returned final output");
				return Ok(AgentResponse {
					final_output: message.content.unwrap_or_default(),
				});
			}

			debug!(turn, calls = message.tool_calls.len(), "Agent requested tool calls");
			let calls = message.tool_calls.clone();
			messages.push(message);
			for call in &calls {
				let result = Self::execute_tool_call(&request.tools, call).await;
				messages.push(ChatMessage::tool_result(&call.id, result));
			}
		}

		Err(AgentError::TurnLimit(self.max_turns))
	}
}

/// Config schema for the OpenAI-compatible backend.
pub struct OpenAiSchema;

impl ConfigSchema for OpenAiSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					}
					_ => Err("base_url must be an http(s) URL".to_string()),
				}
			})],
			vec![
				Field::new("api_key", FieldType::String),
				Field::new(
					"max_turns",
					FieldType::Integer {
						min: Some(1),
						max: Some(32),
					},
				),
				Field::new(
					"timeout_secs",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory for the OpenAI-compatible backend.
///
/// Configuration parameters:
/// - `base_url`: API root, e.g. `https://api.openai.com/v1`
/// - `api_key`: bearer token (optional for local servers)
/// - `max_turns`: tool-calling round trips before giving up (default: 6)
/// - `timeout_secs`: per-request timeout (default: 60)
pub fn create_agent(config: &toml::Value) -> Result<Box<dyn AgentInterface>, AgentError> {
	OpenAiSchema
		.validate(config)
		.map_err(|e| AgentError::Configuration(e.to_string()))?;

	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.unwrap_or_default();
	let api_key = config
		.get("api_key")
		.and_then(|v| v.as_str())
		.filter(|k| !k.is_empty())
		.map(str::to_string);
	let max_turns = config
		.get("max_turns")
		.and_then(|v| v.as_integer())
		.map(|v| v as usize)
		.unwrap_or(DEFAULT_MAX_TURNS);
	let timeout_secs = config
		.get("timeout_secs")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECS);

	let agent = OpenAiAgent::new(base_url, api_key, Duration::from_secs(timeout_secs))?
		.with_max_turns(max_turns);
	Ok(Box::new(agent))
}

#[cfg(test)]
mod tests {
	use super::*;
	use wiremock::matchers::{body_string_contains, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	struct EchoTool;

	#[async_trait]
	impl AgentTool for EchoTool {
		fn name(&self) -> &str {
			"echo"
		}

		fn description(&self) -> &str {
			"Echoes its arguments"
		}

		fn parameters(&self) -> Value {
			json!({"type": "object", "properties": {"text": {"type": "string"}}})
		}

		async fn call(&self, arguments: Value) -> Result<Value, AgentError> {
			Ok(json!({ "echo": arguments["text"] }))
		}
	}

	fn content_reply(content: &str) -> ResponseTemplate {
		ResponseTemplate::new(200).set_body_json(json!({
			"choices": [{"message": {"role": "assistant", "content": content}}]
		}))
	}

	fn agent(server: &MockServer) -> OpenAiAgent {
		OpenAiAgent::new(
			format!("{}/v1", server.uri()),
			Some("sk-test".into()),
			Duration::from_secs(5),
		)
		.unwrap()
	}

	#[tokio::test]
	async fn test_plain_completion() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/chat/completions"))
			.and(header("authorization", "Bearer sk-test"))
			.and(body_string_contains("\"mcp_servers\":[\"vroom08/agentmail-mcp\"]"))
			.and(body_string_contains("\"json_schema\""))
			.respond_with(content_reply("{\"pairings\":[]}"))
			.expect(1)
			.mount(&server)
			.await;

		let request = AgentRequest::new("pair gifts", "openai/gpt-4o-mini")
			.with_tool_servers(vec!["vroom08/agentmail-mcp".into()])
			.with_response_schema(json!({"type": "object"}));
		let response = agent(&server).run(request).await.unwrap();
		assert_eq!(response.final_output, "{\"pairings\":[]}");
	}

	#[tokio::test]
	async fn test_tool_call_loop() {
		let server = MockServer::start().await;
		// Second turn: the request now carries the tool result.
		Mock::given(method("POST"))
			.and(body_string_contains("tool_call_id"))
			.and(body_string_contains("hello"))
			.respond_with(content_reply("done"))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"choices": [{"message": {
					"role": "assistant",
					"content": null,
					"tool_calls": [{
						"id": "call_1",
						"type": "function",
						"function": {"name": "echo", "arguments": "{\"text\":\"hello\"}"}
					}]
				}}]
			})))
			.up_to_n_times(1)
			.mount(&server)
			.await;

		let request = AgentRequest::new("use the tool", "m").with_tool(Arc::new(EchoTool));
		let response = agent(&server).run(request).await.unwrap();
		assert_eq!(response.final_output, "done");
	}

	#[tokio::test]
	async fn test_turn_limit() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"choices": [{"message": {
					"role": "assistant",
					"tool_calls": [{
						"id": "call_x",
						"type": "function",
						"function": {"name": "missing", "arguments": "{}"}
					}]
				}}]
			})))
			.mount(&server)
			.await;

		let result = agent(&server)
			.with_max_turns(2)
			.run(AgentRequest::new("loop", "m"))
			.await;
		assert!(matches!(result, Err(AgentError::TurnLimit(2))));
	}

	#[tokio::test]
	async fn test_http_errors() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(429))
			.mount(&server)
			.await;
		let result = agent(&server).run(AgentRequest::new("p", "m")).await;
		assert!(matches!(result, Err(AgentError::RateLimited)));

		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(500).set_body_string("boom"))
			.mount(&server)
			.await;
		let result = agent(&server).run(AgentRequest::new("p", "m")).await;
		assert!(matches!(result, Err(AgentError::RequestFailed(msg)) if msg.contains("boom")));
	}

	#[test]
	fn test_factory_requires_base_url() {
		let config: toml::Value = toml::from_str(r#"api_key = "x""#).unwrap();
		assert!(matches!(
			create_agent(&config),
			Err(AgentError::Configuration(_))
		));

		let config: toml::Value =
			toml::from_str("base_url = \"http://localhost:8000/v1\"\nmax_turns = 3").unwrap();
		assert!(create_agent(&config).is_ok());
	}
}
