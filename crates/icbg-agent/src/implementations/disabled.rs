//! Agent backend that always fails.
//!
//! Used when no AI backend is configured so that callers take their
//! rule-based paths.

use crate::{AgentError, AgentInterface, AgentRequest, AgentResponse};
use async_trait::async_trait;

pub struct DisabledAgent;

#[async_trait]
impl AgentInterface for DisabledAgent {
	async fn run(&self, _request: AgentRequest) -> Result<AgentResponse, AgentError> {
		Err(AgentError::Unavailable(
			"no agent backend is configured".to_string(),
		))
	}
}

pub fn create_agent(_config: &toml::Value) -> Result<Box<dyn AgentInterface>, AgentError> {
	Ok(Box::new(DisabledAgent))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_always_unavailable() {
		let result = DisabledAgent.run(AgentRequest::new("p", "m")).await;
		assert!(matches!(result, Err(AgentError::Unavailable(_))));
	}
}
