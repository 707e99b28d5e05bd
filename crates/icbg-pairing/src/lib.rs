//! Gift pairing engine.
//!
//! Assigns exactly one catalog product to each address. Three strategies are
//! available per call; the AI strategy is always backed by the rule-based
//! fallback so that every address ends up with a gift.

use async_trait::async_trait;
use icbg_agent::AgentService;
use icbg_types::{Address, PairingResult, PairingStrategy};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod catalog;
pub mod prompt;
pub mod rules;
pub mod tool;

pub mod implementations {
	pub mod ai;
	pub mod round_robin;
	pub mod single_product;
}

pub use catalog::Catalog;
pub use tool::SearchProductsTool;

/// Errors that can occur while pairing gifts.
#[derive(Debug, Error)]
pub enum PairingError {
	/// An AI pairing named an asin that is not in the catalog. Non-fatal.
	#[error("Product not found: {0}")]
	ProductNotFound(String),
	/// AI output did not match the pairing schema. Non-fatal.
	#[error("Failed to parse pairing output: {0}")]
	PairingParseFailure(String),
	#[error("Product catalog is empty")]
	EmptyCatalog,
	#[error("Catalog error: {0}")]
	Catalog(String),
}

/// Inputs shared by every strategy for one pairing run.
pub struct PairingContext<'a> {
	pub catalog: &'a Catalog,
	pub category_hint: Option<&'a str>,
}

/// A single pairing strategy.
#[async_trait]
pub trait PairingStrategyInterface: Send + Sync {
	/// Pairs every address, in input order.
	async fn pair(&self, addresses: &[Address], context: &PairingContext<'_>) -> PairingResult;
}

/// Dispatches pairing runs to the requested strategy.
pub struct PairingService {
	catalog: Arc<Catalog>,
	round_robin: Box<dyn PairingStrategyInterface>,
	single_product: Box<dyn PairingStrategyInterface>,
	ai: Box<dyn PairingStrategyInterface>,
}

impl PairingService {
	/// Creates a service whose AI strategy runs through `agent`.
	pub fn new(
		catalog: Arc<Catalog>,
		agent: Arc<AgentService>,
		model: impl Into<String>,
		tool_servers: Vec<String>,
	) -> Self {
		let ai = implementations::ai::AiStrategy::new(
			agent,
			SearchProductsTool::new(catalog.clone()),
			model,
			tool_servers,
		);
		Self {
			catalog,
			round_robin: Box::new(implementations::round_robin::RoundRobinStrategy),
			single_product: Box::new(implementations::single_product::SingleProductStrategy),
			ai: Box::new(ai),
		}
	}

	pub fn catalog(&self) -> &Catalog {
		&self.catalog
	}

	/// Pairs each address with one product.
	///
	/// Never fails: AI problems are reported through the strategy label of
	/// the result.
	pub async fn pair(
		&self,
		addresses: &[Address],
		strategy: PairingStrategy,
		category_hint: Option<&str>,
	) -> PairingResult {
		let implementation = match strategy {
			PairingStrategy::RoundRobin => &self.round_robin,
			PairingStrategy::SingleProduct => &self.single_product,
			PairingStrategy::AiRecommended => &self.ai,
		};
		let context = PairingContext {
			catalog: &self.catalog,
			category_hint: category_hint.filter(|hint| !hint.is_empty()),
		};

		let result = implementation.pair(addresses, &context).await;
		info!(
			requested = %strategy,
			used = %result.strategy_used,
			pairings = result.pairings.len(),
			total_cost = result.total_cost(),
			"Paired gifts"
		);
		result
	}
}


#[cfg(test)]
mod tests {
	use super::test_support::*;
	use super::*;
	use icbg_agent::implementations::mock::MockAgent;
	use icbg_types::{AgeBand, ProductCategory, StrategyOutcome};

	fn service(agent: MockAgent) -> PairingService {
		PairingService::new(
			Arc::new(Catalog::embedded().unwrap()),
			Arc::new(AgentService::new(Box::new(agent))),
			"test-model",
			vec!["mail-server".into()],
		)
	}

	fn addresses(n: usize) -> Vec<Address> {
		(0..n)
			.map(|i| address(&format!("osm_node_{}", i), household(i % 2 == 0, AgeBand::Middle)))
			.collect()
	}

	#[tokio::test]
	async fn test_round_robin_maps_index_modulo_catalog() {
		let service = service(MockAgent::new());
		let catalog_size = service.catalog().len();
		let input = addresses(catalog_size + 3);

		let result = service
			.pair(&input, PairingStrategy::RoundRobin, None)
			.await;

		assert_eq!(
			result.strategy_used,
			StrategyOutcome::Requested(PairingStrategy::RoundRobin)
		);
		for (i, pairing) in result.pairings.iter().enumerate() {
			assert_eq!(pairing.address_id, input[i].id);
			assert_eq!(pairing.product, *service.catalog().cyclic(i));
		}
	}

	#[tokio::test]
	async fn test_empty_hint_is_ignored() {
		let service = service(MockAgent::new());
		let result = service
			.pair(&addresses(2), PairingStrategy::SingleProduct, Some(""))
			.await;
		assert!(result
			.pairings
			.iter()
			.all(|p| p.product.category == ProductCategory::Books));
		assert_eq!(
			result.pairings[0].pairing_reason.as_deref(),
			Some("Standard gift selection")
		);
	}

	#[tokio::test]
	async fn test_ai_failure_falls_back_for_every_address() {
		let service = service(MockAgent::new().failing("connection refused"));
		let input = addresses(5);

		let result = service
			.pair(&input, PairingStrategy::AiRecommended, None)
			.await;

		assert_eq!(result.strategy_used, StrategyOutcome::RuleBasedFallback);
		assert_eq!(result.pairings.len(), 5);
		let expected: f64 = input
			.iter()
			.map(|a| rules::fallback_product(service.catalog(), a).price)
			.sum();
		assert!((result.total_cost() - expected).abs() < 1e-9);
	}
}
