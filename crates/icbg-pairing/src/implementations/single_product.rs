//! One product for every address.

use async_trait::async_trait;
use icbg_types::{
	Address, GiftPairing, PairingResult, PairingStrategy, Product, ProductCategory,
	StrategyOutcome,
};

use crate::{Catalog, PairingContext, PairingStrategyInterface};

/// Applies a single product to all addresses.
///
/// With a category hint the first product of that category is used, falling
/// back to the first product overall. Without one the first book is used.
pub struct SingleProductStrategy;

fn choose<'a>(catalog: &'a Catalog, category_hint: Option<&str>) -> &'a Product {
	match category_hint {
		Some(hint) => hint
			.parse::<ProductCategory>()
			.ok()
			.and_then(|category| catalog.find(|p| p.category == category))
			.unwrap_or_else(|| catalog.first()),
		None => catalog
			.find(|p| p.category == ProductCategory::Books)
			.unwrap_or_else(|| catalog.first()),
	}
}

#[async_trait]
impl PairingStrategyInterface for SingleProductStrategy {
	async fn pair(&self, addresses: &[Address], context: &PairingContext<'_>) -> PairingResult {
		let product = choose(context.catalog, context.category_hint);
		let reason = match context.category_hint {
			Some(hint) => format!("Standard gift selection ({})", hint),
			None => "Standard gift selection".to_string(),
		};

		let pairings = addresses
			.iter()
			.map(|address| GiftPairing {
				address_id: address.id.clone(),
				product: product.clone(),
				pairing_reason: Some(reason.clone()),
			})
			.collect();

		PairingResult {
			pairings,
			strategy_used: StrategyOutcome::Requested(PairingStrategy::SingleProduct),
		}
	}
}
