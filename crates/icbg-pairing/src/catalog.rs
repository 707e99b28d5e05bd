//! Static product catalog.

use icbg_types::{AgeRange, Product, ProductCategory};
use std::path::Path;
use tracing::info;

use crate::PairingError;

const EMBEDDED_CATALOG: &str = include_str!("../data/catalog.json");

/// Immutable, non-empty list of giftable products in catalog order.
#[derive(Debug, Clone)]
pub struct Catalog {
	products: Vec<Product>,
}

impl Catalog {
	/// Builds a catalog, rejecting empty product lists and negative prices.
	pub fn new(products: Vec<Product>) -> Result<Self, PairingError> {
		if products.is_empty() {
			return Err(PairingError::EmptyCatalog);
		}
		if let Some(product) = products
			.iter()
			.find(|p| !p.price.is_finite() || p.price < 0.0)
		{
			return Err(PairingError::Catalog(format!(
				"product {} has invalid price {}",
				product.asin, product.price
			)));
		}
		Ok(Self { products })
	}

	/// The catalog compiled into the binary.
	pub fn embedded() -> Result<Self, PairingError> {
		Self::from_json(EMBEDDED_CATALOG)
	}

	pub fn from_json(json: &str) -> Result<Self, PairingError> {
		let products: Vec<Product> =
			serde_json::from_str(json).map_err(|e| PairingError::Catalog(e.to_string()))?;
		Self::new(products)
	}

	/// Loads a catalog from a JSON file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PairingError> {
		let path = path.as_ref();
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			PairingError::Catalog(format!("failed to read {}: {}", path.display(), e))
		})?;
		let catalog = Self::from_json(&content)?;
		info!(path = %path.display(), products = catalog.len(), "Loaded product catalog");
		Ok(catalog)
	}

	/// Loads from `path` when given, otherwise uses the embedded catalog.
	pub async fn load(path: Option<&str>) -> Result<Self, PairingError> {
		match path {
			Some(path) => Self::from_file(path).await,
			None => Self::embedded(),
		}
	}

	pub fn all(&self) -> &[Product] {
		&self.products
	}

	pub fn len(&self) -> usize {
		self.products.len()
	}

	pub fn is_empty(&self) -> bool {
		self.products.is_empty()
	}

	/// First product in catalog order. Always present.
	pub fn first(&self) -> &Product {
		&self.products[0]
	}

	/// Product at `index` wrapped modulo the catalog size.
	pub fn cyclic(&self, index: usize) -> &Product {
		&self.products[index % self.products.len()]
	}

	pub fn by_category(&self, category: ProductCategory) -> Vec<&Product> {
		self.products
			.iter()
			.filter(|p| p.category == category)
			.collect()
	}

	pub fn by_asin(&self, asin: &str) -> Option<&Product> {
		self.products.iter().find(|p| p.asin == asin)
	}

	/// Products in `category` rated for `age_range` or for everyone.
	///
	/// Without an age range every product in the category matches.
	pub fn search(&self, category: ProductCategory, age_range: Option<AgeRange>) -> Vec<&Product> {
		self.products
			.iter()
			.filter(|p| p.category == category)
			.filter(|p| match age_range {
				None => true,
				Some(range) => p.rated_for(range) || p.rated_for(AgeRange::All),
			})
			.collect()
	}

	/// First product matching the predicate, in catalog order.
	pub fn find(&self, predicate: impl Fn(&Product) -> bool) -> Option<&Product> {
		self.products.iter().find(|p| predicate(p))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn product(asin: &str, price: f64) -> Product {
		Product {
			asin: asin.to_string(),
			name: format!("Product {}", asin),
			description: String::new(),
			price,
			category: ProductCategory::Home,
			age_range: None,
		}
	}

	#[test]
	fn test_embedded_catalog_covers_every_category() {
		let catalog = Catalog::embedded().unwrap();
		for category in ProductCategory::ALL {
			assert!(
				!catalog.by_category(category).is_empty(),
				"no products in {}",
				category
			);
		}
		assert_eq!(catalog.first().asin, "B0X001");
	}

	#[test]
	fn test_rejects_empty_and_negative() {
		assert!(matches!(
			Catalog::new(vec![]),
			Err(PairingError::EmptyCatalog)
		));
		assert!(matches!(
			Catalog::new(vec![product("A", 1.0), product("B", -0.01)]),
			Err(PairingError::Catalog(_))
		));
		assert!(Catalog::new(vec![product("A", 0.0)]).is_ok());
	}

	#[test]
	fn test_search_includes_all_ages() {
		let catalog = Catalog::embedded().unwrap();
		let results = catalog.search(ProductCategory::Books, Some(AgeRange::Senior));
		assert!(!results.is_empty());
		assert!(results
			.iter()
			.all(|p| p.rated_for(AgeRange::Senior) || p.rated_for(AgeRange::All)));
		assert!(results.iter().any(|p| p.rated_for(AgeRange::All)));

		let unfiltered = catalog.search(ProductCategory::Books, None);
		assert_eq!(unfiltered.len(), catalog.by_category(ProductCategory::Books).len());
	}

	#[test]
	fn test_by_asin_and_cyclic() {
		let catalog = Catalog::new(vec![product("A", 1.0), product("B", 2.0)]).unwrap();
		assert_eq!(catalog.by_asin("B").map(|p| p.price), Some(2.0));
		assert!(catalog.by_asin("Z").is_none());
		assert_eq!(catalog.cyclic(3).asin, "B");
		assert_eq!(catalog.cyclic(4).asin, "A");
	}

	#[tokio::test]
	async fn test_load_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"[{{"asin":"C1","name":"Mug","description":"","price":9.5,"category":"home"}}]"#
		)
		.unwrap();

		let catalog = Catalog::load(file.path().to_str()).await.unwrap();
		assert_eq!(catalog.len(), 1);
		assert_eq!(catalog.first().asin, "C1");
	}
}
