//! Geodata resolution for the icbg service.
//!
//! Turns a user-drawn polygon into deliverable addresses:
//!
//! - [`polygon`] validates and measures the selection
//! - [`query`] renders the Overpass QL query
//! - [`FailoverPolicy`] runs it against prioritized endpoints
//! - [`transform`] maps raw elements to addresses with household metadata

use async_trait::async_trait;
use icbg_types::{Address, Polygon};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

pub mod failover;
pub mod polygon;
pub mod query;
pub mod transform;
pub mod types;

pub mod implementations {
	pub mod overpass;
}

pub use failover::FailoverPolicy;
pub use types::{GeometryPoint, OverpassElement, OverpassResponse};

/// Errors that can occur during address resolution.
#[derive(Debug, Error)]
pub enum GeodataError {
	#[error("Invalid polygon: {0}")]
	InvalidPolygon(String),
	#[error("Selection area ({area_km2:.2} km²) exceeds maximum of {max_km2} km²")]
	AreaTooLarge { area_km2: f64, max_km2: f64 },
	#[error("Endpoint {endpoint} failed: {message}")]
	Endpoint { endpoint: String, message: String },
	#[error("Geodata service unavailable: {0}")]
	ServiceUnavailable(String),
	#[error("Failed to decode geodata response: {0}")]
	Decode(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A single geodata query endpoint.
#[async_trait]
pub trait GeodataInterface: Send + Sync {
	/// Endpoint identifier used in logs.
	fn endpoint(&self) -> &str;

	/// Executes a query and returns the raw elements.
	async fn execute(&self, query: &str) -> Result<OverpassResponse, GeodataError>;
}

/// Resolves polygons into addresses.
pub struct GeodataService {
	failover: FailoverPolicy,
	query_timeout_secs: u64,
	rng: Mutex<StdRng>,
}

impl GeodataService {
	/// Creates a service over endpoints in priority order.
	///
	/// With a seed, household inference is reproducible across runs.
	pub fn new(
		endpoints: Vec<Box<dyn GeodataInterface>>,
		query_timeout_secs: u64,
		household_seed: Option<u64>,
	) -> Self {
		let rng = match household_seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_entropy(),
		};
		Self {
			failover: FailoverPolicy::new(endpoints),
			query_timeout_secs,
			rng: Mutex::new(rng),
		}
	}

	/// Builds Overpass endpoints from URLs sharing one request timeout.
	///
	/// Each URL goes through the endpoint factory, so a malformed URL is a
	/// configuration error.
	pub fn from_urls(
		urls: &[String],
		request_timeout: Duration,
		query_timeout_secs: u64,
		household_seed: Option<u64>,
	) -> Result<Self, GeodataError> {
		let endpoints = urls
			.iter()
			.map(|url| {
				let mut table = toml::map::Map::new();
				table.insert("url".to_string(), toml::Value::String(url.clone()));
				table.insert(
					"timeout_secs".to_string(),
					toml::Value::Integer(request_timeout.as_secs().max(1) as i64),
				);
				implementations::overpass::create_endpoint(&toml::Value::Table(table))
			})
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self::new(endpoints, query_timeout_secs, household_seed))
	}

	/// Returns up to `limit` deliverable addresses inside the polygon.
	///
	/// Every call re-queries the remote service.
	pub async fn identify_addresses_in_polygon(
		&self,
		polygon: &Polygon,
		limit: usize,
	) -> Result<Vec<Address>, GeodataError> {
		polygon::validate(polygon)?;
		let query = query::build_query(polygon, self.query_timeout_secs)?;
		let response = self.failover.execute(&query).await?;

		let total = response.elements.len();
		let addresses: Vec<Address> = {
			let mut rng = self.rng.lock().await;
			response
				.elements
				.iter()
				.map(|element| transform::to_address(element, &mut *rng))
				.filter(Address::is_deliverable)
				.take(limit)
				.collect()
		};

		info!(
			elements = total,
			addresses = addresses.len(),
			limit,
			"Resolved polygon to addresses"
		);
		Ok(addresses)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use icbg_types::Position;
	use serde_json::json;
	use wiremock::matchers::method;
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn polygon() -> Polygon {
		Polygon::from_ring(vec![
			Position::new(0.0, 0.0),
			Position::new(0.0, 0.001),
			Position::new(0.001, 0.001),
			Position::new(0.001, 0.0),
			Position::new(0.0, 0.0),
		])
	}

	fn service(urls: Vec<String>) -> GeodataService {
		GeodataService::from_urls(&urls, Duration::from_secs(5), 30, Some(7)).unwrap()
	}

	fn elements() -> serde_json::Value {
		json!({
			"elements": [
				{"type": "node", "id": 1, "lat": 0.0005, "lon": 0.0005,
					"tags": {"addr:housenumber": "1", "addr:street": "Holly Ln"}},
				{"type": "way", "id": 2, "tags": {"building": "house"},
					"geometry": [
						{"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 0.0002},
						{"lat": 0.0002, "lon": 0.0002}, {"lat": 0.0002, "lon": 0.0}
					]},
				{"type": "relation", "id": 3, "tags": {"addr:full": "3 Nowhere"}},
				{"type": "node", "id": 4, "lat": 0.0006, "lon": 0.0006,
					"tags": {"addr:housenumber": "4", "addr:street": "Holly Ln"}}
			]
		})
	}

	async fn failing_server(status: u16) -> MockServer {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(status))
			.expect(1)
			.mount(&server)
			.await;
		server
	}

	async fn ok_server() -> MockServer {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(elements()))
			.mount(&server)
			.await;
		server
	}

	#[tokio::test]
	async fn test_falls_back_in_order() {
		let primary = failing_server(500).await;
		let secondary = failing_server(429).await;
		let tertiary = ok_server().await;

		let service = service(vec![primary.uri(), secondary.uri(), tertiary.uri()]);
		let addresses = service
			.identify_addresses_in_polygon(&polygon(), 50)
			.await
			.unwrap();

		// The relation has no coordinates and is dropped.
		assert_eq!(addresses.len(), 3);
		assert!(addresses.iter().all(Address::is_deliverable));
		assert_eq!(addresses[0].street_address, "1 Holly Ln");
		assert_eq!(addresses[1].id, "osm_way_2");
	}

	#[tokio::test]
	async fn test_stops_at_first_success() {
		let primary = ok_server().await;
		let fallback = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(elements()))
			.expect(0)
			.mount(&fallback)
			.await;

		let service = service(vec![primary.uri(), fallback.uri()]);
		assert!(service
			.identify_addresses_in_polygon(&polygon(), 50)
			.await
			.is_ok());
	}

	#[tokio::test]
	async fn test_all_endpoints_failing() {
		let primary = failing_server(500).await;
		let fallback = failing_server(503).await;

		let service = service(vec![primary.uri(), fallback.uri()]);
		let result = service.identify_addresses_in_polygon(&polygon(), 50).await;
		match result {
			Err(GeodataError::ServiceUnavailable(message)) => assert!(message.contains("503")),
			other => panic!("expected ServiceUnavailable, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_no_endpoints() {
		let service = service(vec![]);
		assert!(matches!(
			service.identify_addresses_in_polygon(&polygon(), 50).await,
			Err(GeodataError::ServiceUnavailable(_))
		));
	}

	#[tokio::test]
	async fn test_limit_truncates() {
		let server = ok_server().await;
		let service = service(vec![server.uri()]);
		let addresses = service
			.identify_addresses_in_polygon(&polygon(), 2)
			.await
			.unwrap();
		assert_eq!(addresses.len(), 2);
	}

	#[tokio::test]
	async fn test_invalid_polygon_skips_network() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200))
			.expect(0)
			.mount(&server)
			.await;

		let service = service(vec![server.uri()]);
		let mut bad = polygon();
		bad.coordinates[0].truncate(3);
		assert!(matches!(
			service.identify_addresses_in_polygon(&bad, 50).await,
			Err(GeodataError::InvalidPolygon(_))
		));
	}

	#[test]
	fn test_endpoint_urls_are_validated() {
		let result = GeodataService::from_urls(
			&["https://overpass-api.de/api/interpreter".to_string(), "ftp://mirror".to_string()],
			Duration::from_secs(5),
			30,
			None,
		);
		assert!(matches!(result, Err(GeodataError::Configuration(_))));
	}

	#[test]
	fn test_area_error_message() {
		let error = GeodataError::AreaTooLarge {
			area_km2: 12.346,
			max_km2: 10.0,
		};
		assert_eq!(
			error.to_string(),
			"Selection area (12.35 km²) exceeds maximum of 10 km²"
		);
	}
}
