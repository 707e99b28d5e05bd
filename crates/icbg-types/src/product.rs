//! Catalog product types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed set of product categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
	Toys,
	Books,
	Electronics,
	Home,
	Clothing,
}

impl ProductCategory {
	pub const ALL: [ProductCategory; 5] = [
		ProductCategory::Toys,
		ProductCategory::Books,
		ProductCategory::Electronics,
		ProductCategory::Home,
		ProductCategory::Clothing,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			ProductCategory::Toys => "toys",
			ProductCategory::Books => "books",
			ProductCategory::Electronics => "electronics",
			ProductCategory::Home => "home",
			ProductCategory::Clothing => "clothing",
		}
	}
}

impl fmt::Display for ProductCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ProductCategory {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|c| c.as_str() == s)
			.ok_or_else(|| format!("unknown product category: {}", s))
	}
}

/// Age appropriateness rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeRange {
	Children,
	Teen,
	Adult,
	Senior,
	All,
}

impl AgeRange {
	pub const ALL: [AgeRange; 5] = [
		AgeRange::Children,
		AgeRange::Teen,
		AgeRange::Adult,
		AgeRange::Senior,
		AgeRange::All,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			AgeRange::Children => "children",
			AgeRange::Teen => "teen",
			AgeRange::Adult => "adult",
			AgeRange::Senior => "senior",
			AgeRange::All => "all",
		}
	}
}

impl fmt::Display for AgeRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AgeRange {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|a| a.as_str() == s)
			.ok_or_else(|| format!("unknown age range: {}", s))
	}
}

/// A giftable catalog entry.
///
/// Products are loaded from a static catalog and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
	/// Catalog identifier.
	pub asin: String,
	pub name: String,
	pub description: String,
	/// Price in USD, never negative.
	pub price: f64,
	pub category: ProductCategory,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub age_range: Option<AgeRange>,
}

impl Product {
	/// Whether this product is explicitly rated for the given age range.
	pub fn rated_for(&self, age_range: AgeRange) -> bool {
		self.age_range == Some(age_range)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_category_round_trips_through_str() {
		for category in ProductCategory::ALL {
			assert_eq!(category.as_str().parse::<ProductCategory>(), Ok(category));
		}
		assert!("gadgets".parse::<ProductCategory>().is_err());
	}

	#[test]
	fn test_product_json_shape() {
		let json = r#"{
			"asin": "B0X001",
			"name": "Wooden Train Set",
			"description": "Classic wooden railway",
			"price": 34.99,
			"category": "toys",
			"ageRange": "children"
		}"#;
		let product: Product = serde_json::from_str(json).unwrap();

		assert_eq!(product.category, ProductCategory::Toys);
		assert!(product.rated_for(AgeRange::Children));
		assert!(!product.rated_for(AgeRange::All));
	}
}
