//! Rule-based gift selection.
//!
//! Used as the explicit fallback when the AI strategy fails and to backfill
//! addresses the AI left unpaired. Always yields a product for a non-empty
//! catalog.

use icbg_types::{Address, AgeBand, AgeRange, Product, ProductCategory};

use crate::catalog::Catalog;

/// Picks a product for one address from its household metadata.
///
/// Rules in priority order: children present, senior age band, young age
/// band, any book, first product.
pub fn fallback_product<'a>(catalog: &'a Catalog, address: &Address) -> &'a Product {
	let metadata = address.metadata.unwrap_or_default();

	if metadata.has_children == Some(true) {
		if let Some(toy) = catalog
			.find(|p| p.category == ProductCategory::Toys && p.rated_for(AgeRange::Children))
		{
			return toy;
		}
	}

	match metadata.estimated_age {
		Some(AgeBand::Senior) => {
			if let Some(gift) = catalog.find(|p| p.rated_for(AgeRange::Senior)) {
				return gift;
			}
		}
		Some(AgeBand::Young) => {
			if let Some(gadget) = catalog
				.find(|p| p.category == ProductCategory::Electronics && p.rated_for(AgeRange::Teen))
			{
				return gadget;
			}
		}
		_ => {}
	}

	catalog
		.find(|p| p.category == ProductCategory::Books)
		.unwrap_or_else(|| catalog.first())
}
