//! Configuration loading for the icbg service.
//!
//! Configuration is read from a TOML, JSON or YAML file, `${VAR}` references
//! are substituted from the environment, selected settings can be overridden
//! by `ICBG_*` variables, and the result is validated before use.

use regex::Regex;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

mod types;

pub use types::*;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/icbg.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "ICBG_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let file_path = self.file_path.as_deref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;

		let mut config = self.load_from_file(file_path).await?;
		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		info!(path = %file_path, name = %config.service.name, "Configuration loaded");
		Ok(config)
	}

	async fn load_from_file(&self, file_path: &str) -> Result<Config, ConfigError> {
		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.to_string()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		let substituted = substitute_env_vars(&content)?;

		let extension = Path::new(file_path)
			.extension()
			.and_then(|s| s.to_str())
			.unwrap_or("toml");
		parse_config(&substituted, extension)
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			debug!("Overriding log level from environment");
			config.service.log_level = log_level;
		}

		if let Ok(http_port) = env::var(format!("{}HTTP_PORT", self.env_prefix)) {
			config.service.http_port = http_port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		if let Ok(api_key) = env::var(format!("{}AGENT_API_KEY", self.env_prefix)) {
			debug!("Overriding agent API key from environment");
			if let Some(table) = config.agent.config.as_table_mut() {
				table.insert("api_key".to_string(), toml::Value::String(api_key));
			}
		}

		Ok(())
	}
}

/// Parses configuration text in the format named by `extension`.
pub fn parse_config(content: &str, extension: &str) -> Result<Config, ConfigError> {
	match extension {
		"toml" => toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string())),
		"json" => {
			serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
		}
		"yaml" | "yml" => {
			serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
		}
		other => Err(ConfigError::ParseError(format!(
			"Unsupported config format: {}",
			other
		))),
	}
}

/// Replaces every `${VAR_NAME}` with the value of the environment variable.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;
	let mut result = content.to_string();

	for cap in re.captures_iter(content) {
		let full_match = &cap[0];
		let var_name = &cap[1];

		let env_value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

		result = result.replace(full_match, &env_value);
	}

	Ok(result)
}

/// Checks cross-field constraints that serde cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
	if config.service.name.trim().is_empty() {
		return Err(ConfigError::ValidationError(
			"Service name must not be empty".to_string(),
		));
	}

	if config.geodata.primary_endpoint.is_empty() {
		return Err(ConfigError::ValidationError(
			"A primary geodata endpoint is required".to_string(),
		));
	}

	if config.geodata.request_timeout_secs == 0 {
		return Err(ConfigError::ValidationError(
			"Geodata request timeout must be positive".to_string(),
		));
	}

	let admission = &config.admission;
	if !(admission.max_area_km2 > 0.0) {
		return Err(ConfigError::ValidationError(
			"max_area_km2 must be positive".to_string(),
		));
	}
	if admission.max_addresses == 0 || admission.max_recipients == 0 {
		return Err(ConfigError::ValidationError(
			"Address and recipient limits must be positive".to_string(),
		));
	}

	let orders = &config.orders;
	if orders.shipping_cost < 0.0 {
		return Err(ConfigError::ValidationError(
			"Shipping cost must not be negative".to_string(),
		));
	}
	if orders.delivery_start_days > orders.delivery_end_days {
		return Err(ConfigError::ValidationError(
			"Delivery window must start before it ends".to_string(),
		));
	}

	if !config.agent.config.is_table() || !config.storage.config.is_table() {
		return Err(ConfigError::ValidationError(
			"Backend settings must be tables".to_string(),
		));
	}

	Ok(())
}

/// Loads configuration from `CONFIG_FILE` or the default location.
pub async fn load_config() -> Result<Config, ConfigError> {
	let path = env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
	ConfigLoader::new().with_file(path).load().await
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const MINIMAL: &str = r#"
[service]
name = "icbg-test"
http_port = 8081
"#;

	fn write_config(content: &str, suffix: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
		file.write_all(content.as_bytes()).unwrap();
		file
	}

	#[tokio::test]
	async fn test_load_toml_file() {
		let file = write_config(MINIMAL, ".toml");
		let config = ConfigLoader::new()
			.with_env_prefix("ICBG_TEST_LOAD_")
			.with_file(file.path())
			.load()
			.await
			.unwrap();

		assert_eq!(config.service.name, "icbg-test");
		assert_eq!(config.service.http_port, 8081);
	}

	#[tokio::test]
	async fn test_env_substitution() {
		env::set_var("ICBG_TEST_SUBST_KEY", "sk-test");
		let file = write_config(
			r#"
[service]
name = "icbg-test"

[agent]
implementation = "openai"

[agent.config]
api_key = "${ICBG_TEST_SUBST_KEY}"
"#,
			".toml",
		);
		let config = ConfigLoader::new()
			.with_env_prefix("ICBG_TEST_SUBST_")
			.with_file(file.path())
			.load()
			.await
			.unwrap();

		assert_eq!(
			config.agent.config.get("api_key").and_then(|v| v.as_str()),
			Some("sk-test")
		);
	}

	#[tokio::test]
	async fn test_missing_env_var() {
		let file = write_config(
			r#"
[service]
name = "${ICBG_TEST_DEFINITELY_UNSET}"
"#,
			".toml",
		);
		let result = ConfigLoader::new().with_file(file.path()).load().await;
		assert!(matches!(result, Err(ConfigError::EnvVarNotFound(_))));
	}

	#[tokio::test]
	async fn test_env_overrides() {
		env::set_var("ICBG_TEST_OVR_HTTP_PORT", "9999");
		env::set_var("ICBG_TEST_OVR_LOG_LEVEL", "debug");
		let file = write_config(MINIMAL, ".toml");
		let config = ConfigLoader::new()
			.with_env_prefix("ICBG_TEST_OVR_")
			.with_file(file.path())
			.load()
			.await
			.unwrap();

		assert_eq!(config.service.http_port, 9999);
		assert_eq!(config.service.log_level, "debug");
	}

	#[tokio::test]
	async fn test_missing_file() {
		let result = ConfigLoader::new()
			.with_file("/nonexistent/icbg.toml")
			.load()
			.await;
		assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
	}

	#[test]
	fn test_json_and_yaml() {
		let json = r#"{"service": {"name": "icbg-json"}}"#;
		assert_eq!(parse_config(json, "json").unwrap().service.name, "icbg-json");

		let yaml = "service:\n  name: icbg-yaml\n";
		assert_eq!(parse_config(yaml, "yml").unwrap().service.name, "icbg-yaml");

		assert!(parse_config("", "ini").is_err());
	}

	#[test]
	fn test_validation_rejects_inverted_delivery_window() {
		let mut config = parse_config(MINIMAL, "toml").unwrap();
		assert!(validate_config(&config).is_ok());

		config.orders.delivery_start_days = 12;
		assert!(matches!(
			validate_config(&config),
			Err(ConfigError::ValidationError(_))
		));
	}

	#[test]
	fn test_validation_rejects_zero_area() {
		let mut config = parse_config(MINIMAL, "toml").unwrap();
		config.admission.max_area_km2 = 0.0;
		assert!(validate_config(&config).is_err());
	}
}
