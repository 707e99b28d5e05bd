//! API types for the icbg HTTP surface.
//!
//! This module defines the request and response bodies of the HTTP endpoints.
//! Field names follow the camelCase wire format expected by the web client.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
	Address, AddressSelection, BatchStatus, BoundingBox, GiftPairing, Order, OrderBatch,
	OrderStatus, PairingStrategy, Polygon,
};

/// Attribution that must accompany any data resolved from the map service.
pub const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
	/// Machine-readable error code, e.g. `INVALID_POLYGON`.
	pub code: String,
	/// Human-readable description.
	pub message: String,
	/// Additional error context.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

impl ApiError {
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			code: code.into(),
			message: message.into(),
			details: None,
		}
	}
}

/// Request for resolving a drawn area into addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressIdentifyRequest {
	/// GeoJSON polygon of the selected area.
	pub polygon: Polygon,
	/// Maximum number of addresses to return, capped by admission limits.
	pub limit: Option<usize>,
	/// Optional human-readable description stored with the selection.
	#[serde(rename = "locationDescription")]
	pub location_description: Option<String>,
}

/// Response for address identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressIdentifyResponse {
	pub addresses: Vec<Address>,
	pub count: usize,
	#[serde(rename = "boundingBox")]
	pub bounding_box: BoundingBox,
	/// Data source attribution.
	pub attribution: String,
	/// Selection record created for this resolution.
	#[serde(rename = "selectionId")]
	pub selection_id: String,
}

/// Request for pairing addresses with gifts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftPairRequest {
	#[serde(default)]
	pub addresses: Vec<Address>,
	/// Unrecognized names fall back to the configured default strategy.
	#[serde(default, deserialize_with = "lenient_strategy")]
	pub strategy: Option<PairingStrategy>,
	/// Category hint for the single-product strategy.
	pub category: Option<String>,
}

fn lenient_strategy<'de, D>(deserializer: D) -> Result<Option<PairingStrategy>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<String>::deserialize(deserializer)?;
	Ok(raw.and_then(|name| name.parse().ok()))
}

/// Response for gift pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftPairResponse {
	pub pairings: Vec<GiftPairing>,
	#[serde(rename = "totalCost")]
	pub total_cost: f64,
	#[serde(rename = "strategyUsed")]
	pub strategy_used: String,
}

/// A recipient of a delivery notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecipient {
	#[serde(default)]
	pub email: String,
	#[serde(default)]
	pub name: String,
	/// Delivery address used for personalization.
	#[serde(default)]
	pub address: String,
}

/// Request for sending delivery notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotificationsRequest {
	#[serde(default)]
	pub recipients: Vec<NotificationRecipient>,
	/// Batch whose orders should be flagged once emails are sent.
	#[serde(rename = "batchId")]
	pub batch_id: Option<String>,
	#[serde(rename = "estimatedDelivery")]
	pub estimated_delivery: Option<String>,
}

/// Per-recipient send status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
	Sent,
	Failed,
}

/// Result for a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationResult {
	pub email: String,
	pub status: NotificationStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl NotificationResult {
	pub fn failed(email: impl Into<String>, error: impl Into<String>) -> Self {
		Self {
			email: email.into(),
			status: NotificationStatus::Failed,
			error: Some(error.into()),
		}
	}
}

/// Response for notification sending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendNotificationsResponse {
	pub sent: usize,
	pub failed: usize,
	pub results: Vec<NotificationResult>,
}

impl SendNotificationsResponse {
	/// Builds a response, deriving the counters from the results.
	pub fn from_results(results: Vec<NotificationResult>) -> Self {
		let sent = results
			.iter()
			.filter(|r| r.status == NotificationStatus::Sent)
			.count();
		let failed = results
			.iter()
			.filter(|r| r.status == NotificationStatus::Failed)
			.count();
		Self {
			sent,
			failed,
			results,
		}
	}
}

/// Request for confirming a pairing run into a batch of orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOrdersRequest {
	pub pairings: Vec<GiftPairing>,
	pub addresses: Vec<Address>,
	#[serde(default)]
	pub polygon: Option<Polygon>,
	#[serde(default)]
	pub notes: Option<String>,
	/// Selection to link to the new batch.
	#[serde(default)]
	pub selection_id: Option<String>,
	/// Optional recipient email per address id.
	#[serde(default)]
	pub recipient_emails: std::collections::HashMap<String, String>,
}

/// Response for a confirmed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmOrdersResponse {
	pub batch: OrderBatch,
	pub orders: Vec<Order>,
}

/// Body for batch status updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBatchStatusRequest {
	pub status: BatchStatus,
}

/// Body for order status updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
	pub status: OrderStatus,
}

/// Response wrapper for selection listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionsResponse {
	pub selections: Vec<AddressSelection>,
	pub count: usize,
}
