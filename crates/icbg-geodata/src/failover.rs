//! Ordered endpoint failover.

use tracing::{debug, warn};

use crate::{types::OverpassResponse, GeodataError, GeodataInterface};

/// Tries endpoints one at a time in priority order.
///
/// Endpoints are never queried concurrently. Only endpoint-level failures
/// (transport errors and non-success statuses) advance to the next endpoint;
/// a successful response that fails to decode is returned as-is.
pub struct FailoverPolicy {
	endpoints: Vec<Box<dyn GeodataInterface>>,
}

impl FailoverPolicy {
	pub fn new(endpoints: Vec<Box<dyn GeodataInterface>>) -> Self {
		Self { endpoints }
	}

	pub async fn execute(&self, query: &str) -> Result<OverpassResponse, GeodataError> {
		let mut last_error: Option<GeodataError> = None;

		for (attempt, endpoint) in self.endpoints.iter().enumerate() {
			match endpoint.execute(query).await {
				Ok(response) => {
					debug!(
						endpoint = endpoint.endpoint(),
						attempt,
						elements = response.elements.len(),
						"Geodata query succeeded"
					);
					return Ok(response);
				}
				Err(error @ GeodataError::Endpoint { .. }) => {
					warn!(endpoint = endpoint.endpoint(), %error, "Geodata endpoint failed");
					last_error = Some(error);
				}
				Err(other) => return Err(other),
			}
		}

		Err(GeodataError::ServiceUnavailable(
			last_error
				.map(|e| e.to_string())
				.unwrap_or_else(|| "All geodata endpoints failed".to_string()),
		))
	}
}
