//! Configuration types for the service.

use icbg_types::PairingStrategy;
use serde::{Deserialize, Serialize};

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::Table::new())
}

/// Complete service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub service: ServiceSettings,
	#[serde(default)]
	pub geodata: GeodataConfig,
	#[serde(default)]
	pub admission: AdmissionConfig,
	#[serde(default)]
	pub pairing: PairingConfig,
	#[serde(default)]
	pub notify: NotifyConfig,
	#[serde(default)]
	pub agent: AgentConfig,
	#[serde(default)]
	pub storage: StorageConfig,
	#[serde(default)]
	pub orders: OrdersConfig,
}

/// Service identity and HTTP listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceSettings {
	pub name: String,
	#[serde(default = "default_http_host")]
	pub http_host: String,
	#[serde(default = "default_http_port")]
	pub http_port: u16,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

fn default_http_host() -> String {
	"127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
	3000
}

fn default_log_level() -> String {
	"info".to_string()
}

/// Map-data service endpoints and request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeodataConfig {
	/// Endpoint tried first.
	pub primary_endpoint: String,
	/// Endpoints tried in order after the primary fails.
	#[serde(default)]
	pub fallback_endpoints: Vec<String>,
	/// Per-endpoint HTTP timeout.
	pub request_timeout_secs: u64,
	/// Server-side timeout embedded in the query.
	pub query_timeout_secs: u64,
	/// Fixed seed for household inference; entropy when unset.
	#[serde(default)]
	pub household_seed: Option<u64>,
}

impl Default for GeodataConfig {
	fn default() -> Self {
		Self {
			primary_endpoint: "https://overpass-api.de/api/interpreter".to_string(),
			fallback_endpoints: vec![
				"https://overpass.kumi.systems/api/interpreter".to_string(),
				"https://overpass.openstreetmap.ru/api/interpreter".to_string(),
			],
			request_timeout_secs: 35,
			query_timeout_secs: 30,
			household_seed: None,
		}
	}
}

impl GeodataConfig {
	/// Every endpoint in priority order.
	pub fn endpoints(&self) -> Vec<String> {
		std::iter::once(self.primary_endpoint.clone())
			.chain(self.fallback_endpoints.iter().cloned())
			.collect()
	}
}

/// Request admission limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdmissionConfig {
	pub max_area_km2: f64,
	pub max_addresses: usize,
	pub max_recipients: usize,
}

impl Default for AdmissionConfig {
	fn default() -> Self {
		Self {
			max_area_km2: 10.0,
			max_addresses: 50,
			max_recipients: 50,
		}
	}
}

/// Gift pairing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PairingConfig {
	#[serde(default)]
	pub default_strategy: PairingStrategy,
	/// JSON catalog replacing the built-in one.
	#[serde(default)]
	pub catalog_path: Option<String>,
	pub model: String,
	/// Remote tool servers forwarded to the agent on every request.
	#[serde(default)]
	pub tool_servers: Vec<String>,
}

impl Default for PairingConfig {
	fn default() -> Self {
		Self {
			default_strategy: PairingStrategy::default(),
			catalog_path: None,
			model: "openai/gpt-4o-mini".to_string(),
			tool_servers: vec!["vroom08/agentmail-mcp".to_string()],
		}
	}
}

/// Delivery notification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
	pub model: String,
	/// Mail tool servers the agent sends through.
	#[serde(default)]
	pub tool_servers: Vec<String>,
}

impl Default for NotifyConfig {
	fn default() -> Self {
		Self {
			model: "openai/gpt-4o-mini".to_string(),
			tool_servers: vec!["vroom08/agentmail-mcp".to_string()],
		}
	}
}

/// AI agent backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
	/// Backend name: `openai` or `disabled`.
	pub implementation: String,
	/// Backend-specific settings, validated by the backend's schema.
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

impl Default for AgentConfig {
	fn default() -> Self {
		Self {
			implementation: "disabled".to_string(),
			config: empty_table(),
		}
	}
}

/// Persistence backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Backend name: `memory` or `file`.
	pub backend: String,
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			backend: "memory".to_string(),
			config: empty_table(),
		}
	}
}

/// Order creation defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrdersConfig {
	pub shipping_cost: f64,
	/// Days from confirmation to the start of the delivery window.
	pub delivery_start_days: i64,
	/// Days from confirmation to the end of the delivery window.
	pub delivery_end_days: i64,
	/// Delivery text used in notifications when the caller gives none.
	pub default_estimated_delivery: String,
}

impl Default for OrdersConfig {
	fn default() -> Self {
		Self {
			shipping_cost: 0.0,
			delivery_start_days: 7,
			delivery_end_days: 10,
			default_estimated_delivery: "December 23-24, 2025".to_string(),
		}
	}
}
