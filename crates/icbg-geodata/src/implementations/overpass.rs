//! Overpass API endpoint over HTTP.

use crate::{types::OverpassResponse, GeodataError, GeodataInterface};
use async_trait::async_trait;
use icbg_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout, slightly above the server-side query timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 35;

/// A single Overpass interpreter endpoint.
pub struct OverpassEndpoint {
	client: Client,
	url: String,
}

impl OverpassEndpoint {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GeodataError> {
		let url = url.into();
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| GeodataError::Endpoint {
				endpoint: url.clone(),
				message: format!("failed to build HTTP client: {}", e),
			})?;
		Ok(Self { client, url })
	}

	fn endpoint_error(&self, message: impl Into<String>) -> GeodataError {
		GeodataError::Endpoint {
			endpoint: self.url.clone(),
			message: message.into(),
		}
	}
}

#[async_trait]
impl GeodataInterface for OverpassEndpoint {
	fn endpoint(&self) -> &str {
		&self.url
	}

	async fn execute(&self, query: &str) -> Result<OverpassResponse, GeodataError> {
		debug!(endpoint = %self.url, "Querying Overpass");

		let response = self
			.client
			.post(&self.url)
			.form(&[("data", query)])
			.send()
			.await
			.map_err(|e| self.endpoint_error(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			return Err(self.endpoint_error(format!("HTTP {}", status)));
		}

		response
			.json::<OverpassResponse>()
			.await
			.map_err(|e| GeodataError::Decode(e.to_string()))
	}
}

/// Config schema for an Overpass endpoint table.
pub struct OverpassSchema;

impl ConfigSchema for OverpassSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					}
					_ => Err("url must be an http(s) URL".to_string()),
				}
			})],
			vec![Field::new(
				"timeout_secs",
				FieldType::Integer {
					min: Some(1),
					max: None,
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory for an Overpass endpoint.
///
/// Configuration parameters:
/// - `url`: interpreter URL
/// - `timeout_secs`: per-request timeout (default: 35)
pub fn create_endpoint(config: &toml::Value) -> Result<Box<dyn GeodataInterface>, GeodataError> {
	OverpassSchema
		.validate(config)
		.map_err(|e| GeodataError::Configuration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.unwrap_or_default();
	let timeout_secs = config
		.get("timeout_secs")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECS);

	Ok(Box::new(OverpassEndpoint::new(
		url,
		Duration::from_secs(timeout_secs),
	)?))
}
