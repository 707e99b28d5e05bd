//! Catalog search exposed to the AI delegate.

use async_trait::async_trait;
use icbg_agent::{AgentError, AgentTool};
use icbg_types::{AgeRange, ProductCategory};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::Catalog;

pub const SEARCH_PRODUCTS: &str = "search_products";

#[derive(Debug, Deserialize)]
struct SearchArgs {
	category: String,
	#[serde(default, alias = "ageRange")]
	age_range: Option<String>,
}

/// Finds catalog products by category and optional age range.
pub struct SearchProductsTool {
	catalog: Arc<Catalog>,
}

impl SearchProductsTool {
	pub fn new(catalog: Arc<Catalog>) -> Self {
		Self { catalog }
	}
}

#[async_trait]
impl AgentTool for SearchProductsTool {
	fn name(&self) -> &str {
		SEARCH_PRODUCTS
	}

	fn description(&self) -> &str {
		"Search the gift catalog. Returns products in the given category that \
		 suit the given age range, including products suitable for all ages."
	}

	fn parameters(&self) -> Value {
		let categories: Vec<&str> = ProductCategory::ALL.iter().map(|c| c.as_str()).collect();
		let age_ranges: Vec<&str> = AgeRange::ALL.iter().map(|a| a.as_str()).collect();
		json!({
			"type": "object",
			"properties": {
				"category": { "type": "string", "enum": categories },
				"age_range": { "type": "string", "enum": age_ranges }
			},
			"required": ["category"]
		})
	}

	async fn call(&self, arguments: Value) -> Result<Value, AgentError> {
		let args: SearchArgs =
			serde_json::from_value(arguments).map_err(|e| AgentError::Tool(e.to_string()))?;
		let category: ProductCategory = args.category.parse().map_err(AgentError::Tool)?;
		let age_range = args
			.age_range
			.filter(|s| !s.is_empty())
			.map(|s| s.parse::<AgeRange>())
			.transpose()
			.map_err(AgentError::Tool)?;

		let products = self.catalog.search(category, age_range);
		serde_json::to_value(products).map_err(|e| AgentError::Tool(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tool() -> SearchProductsTool {
		SearchProductsTool::new(Arc::new(Catalog::embedded().unwrap()))
	}

	#[tokio::test]
	async fn test_search_by_category_and_age() {
		let result = tool()
			.call(json!({"category": "toys", "age_range": "children"}))
			.await
			.unwrap();
		let products = result.as_array().unwrap();
		assert!(!products.is_empty());
		assert!(products.iter().all(|p| p["category"] == "toys"
			&& (p["ageRange"] == "children" || p["ageRange"] == "all")));
	}

	#[tokio::test]
	async fn test_rejects_unknown_category() {
		assert!(matches!(
			tool().call(json!({"category": "weapons"})).await,
			Err(AgentError::Tool(_))
		));
		assert!(matches!(
			tool().call(json!({"age_range": "teen"})).await,
			Err(AgentError::Tool(_))
		));
	}
}
