//! Address selection records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A polygon drawn by a user together with what it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSelection {
	/// Public identifier (`SEL-` prefix).
	pub selection_id: String,
	/// Serialized GeoJSON polygon.
	pub polygon: String,
	/// Serialized `[minLng, minLat, maxLng, maxLat]`.
	pub bounding_box: String,
	pub address_count: usize,
	/// Batch created from this selection, once orders are confirmed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub batch_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub location_description: Option<String>,
	pub created_at: DateTime<Utc>,
}
