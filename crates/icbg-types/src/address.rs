//! Deliverable address types.
//!
//! An [`Address`] is produced once per resolved geodata element and is never
//! mutated afterwards; re-querying an area yields a fresh set.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of source element an address was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
	Node,
	Way,
	Relation,
}

impl ElementType {
	pub fn as_str(&self) -> &'static str {
		match self {
			ElementType::Node => "node",
			ElementType::Way => "way",
			ElementType::Relation => "relation",
		}
	}
}

impl fmt::Display for ElementType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Reference back to the source map element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsmRef {
	#[serde(rename = "type")]
	pub element_type: ElementType,
	pub id: i64,
}

impl OsmRef {
	/// Deterministic address identifier for this element.
	pub fn address_id(&self) -> String {
		format!("osm_{}_{}", self.element_type, self.id)
	}
}

/// Inferred household composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HouseholdType {
	Family,
	Single,
	Elderly,
}

/// Inferred primary age band of a household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeBand {
	Young,
	Middle,
	Senior,
}

/// Heuristic demographic labels attached to an address.
///
/// These are derived from structural map tags only and are not ground truth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMetadata {
	#[serde(rename = "householdType", skip_serializing_if = "Option::is_none")]
	pub household_type: Option<HouseholdType>,
	#[serde(rename = "hasChildren", skip_serializing_if = "Option::is_none")]
	pub has_children: Option<bool>,
	#[serde(rename = "estimatedAge", skip_serializing_if = "Option::is_none")]
	pub estimated_age: Option<AgeBand>,
}

/// A resolved delivery destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
	/// Identifier derived from the source element type and id.
	pub id: String,
	/// Street line assembled from address tags, or a placeholder.
	pub street_address: String,
	#[serde(default)]
	pub city: String,
	#[serde(default)]
	pub state: String,
	#[serde(default)]
	pub postal_code: String,
	pub lat: f64,
	pub lng: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub metadata: Option<HouseholdMetadata>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub osm_ref: Option<OsmRef>,
}

impl Address {
	/// True when the address has a street line and finite coordinates.
	pub fn is_deliverable(&self) -> bool {
		!self.street_address.is_empty() && self.lat.is_finite() && self.lng.is_finite()
	}

	/// Single-line rendering used in prompts and notifications.
	pub fn one_line(&self) -> String {
		format!(
			"{}, {}, {} {}",
			self.street_address, self.city, self.state, self.postal_code
		)
	}
}
