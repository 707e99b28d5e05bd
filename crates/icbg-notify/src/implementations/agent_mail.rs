//! Sends notifications through the AI delegate and its mail tool server.

use async_trait::async_trait;
use icbg_agent::{AgentRequest, AgentService};
use icbg_types::{NotificationRecipient, NotificationResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{NotificationInterface, NotifyError};

pub const SUBJECT: &str = "🎅 Santa's Delivering Your Present!";

#[derive(Debug, Deserialize)]
struct SendReport {
	results: Vec<NotificationResult>,
}

/// Renders the delegate instructions for one batch of recipients.
pub fn build_notification_prompt(
	recipients: &[NotificationRecipient],
	estimated_delivery: &str,
) -> String {
	let listed = recipients
		.iter()
		.map(|r| {
			format!(
				"- Name: {}\n- Email: {}\n- Address: {}\n",
				r.name, r.email, r.address
			)
		})
		.collect::<Vec<_>>()
		.join("\n");

	format!(
		"Send a festive delivery notification email to each recipient below \
		 using the mail tools.\n\
		 \n\
		 Every email uses:\n\
		 - To: the recipient's email address\n\
		 - Subject: \"{subject}\"\n\
		 - Body: a warm HTML message greeting the recipient by name, announcing \
		 that a gift is on the way to their address, stating the estimated \
		 delivery of {estimated_delivery}, and signed \"With holiday cheer, Santa's Workshop\"\n\
		 \n\
		 Recipients:\n\
		 \n\
		 {listed}\n\
		 When done, respond only with a JSON object reporting each send: \
		 {{\"results\": [{{\"email\": \"user@example.com\", \"status\": \"sent\", \"error\": null}}, \
		 {{\"email\": \"other@example.com\", \"status\": \"failed\", \"error\": \"reason\"}}]}}",
		subject = SUBJECT,
		estimated_delivery = estimated_delivery,
		listed = listed,
	)
}

/// JSON schema of the send report.
///
/// Written for strict structured output: every object is closed and lists
/// all of its properties as required, with `error` nullable.
pub fn report_schema() -> Value {
	json!({
		"type": "object",
		"properties": {
			"results": {
				"type": "array",
				"items": {
					"type": "object",
					"properties": {
						"email": { "type": "string" },
						"status": { "type": "string", "enum": ["sent", "failed"] },
						"error": { "type": ["string", "null"] }
					},
					"required": ["email", "status", "error"],
					"additionalProperties": false
				}
			}
		},
		"required": ["results"],
		"additionalProperties": false
	})
}

/// Parses the delegate's send report, tolerating a Markdown code fence.
pub fn parse_report(output: &str) -> Result<Vec<NotificationResult>, NotifyError> {
	let trimmed = output.trim();
	let body = trimmed
		.strip_prefix("```")
		.and_then(|rest| rest.strip_suffix("```"))
		.map(|fenced| fenced.trim_start_matches("json").trim())
		.unwrap_or(trimmed);
	serde_json::from_str::<SendReport>(body)
		.map(|report| report.results)
		.map_err(|e| NotifyError::MalformedReport(e.to_string()))
}

/// Notification backend driven by the agent.
pub struct AgentMailer {
	agent: Arc<AgentService>,
	model: String,
	tool_servers: Vec<String>,
}

impl AgentMailer {
	pub fn new(agent: Arc<AgentService>, model: impl Into<String>, tool_servers: Vec<String>) -> Self {
		Self {
			agent,
			model: model.into(),
			tool_servers,
		}
	}
}

#[async_trait]
impl NotificationInterface for AgentMailer {
	async fn deliver(
		&self,
		recipients: &[NotificationRecipient],
		estimated_delivery: &str,
	) -> Result<Vec<NotificationResult>, NotifyError> {
		let request = AgentRequest::new(
			build_notification_prompt(recipients, estimated_delivery),
			self.model.clone(),
		)
		.with_tool_servers(self.tool_servers.clone())
		.with_response_schema(report_schema());

		let response = self.agent.run(request).await?;
		match parse_report(&response.final_output) {
			Ok(results) => {
				debug!(reported = results.len(), "Parsed send report");
				Ok(results)
			}
			Err(e) => {
				warn!(error = %e, "Treating send report as empty");
				Ok(Vec::new())
			}
		}
	}
}
