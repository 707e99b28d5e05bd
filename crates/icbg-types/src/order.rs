//! Order and batch types for the fulfillment pipeline.
//!
//! Both entities carry a forward-only status. A batch moves
//! `PENDING -> CONFIRMED -> EXPORTED -> FULFILLED`; an order moves
//! `ORDER_CREATED -> PENDING_FULFILLMENT -> SHIPPED -> DELIVERED`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Forward-only state machine over a fixed sequence of stages.
pub trait Lifecycle: Copy + Eq + Sized + 'static {
	/// Every stage in pipeline order.
	const STAGES: &'static [Self];

	fn position(&self) -> usize {
		Self::STAGES
			.iter()
			.position(|s| s == self)
			.unwrap_or_default()
	}

	/// The stage immediately after this one, `None` when terminal.
	fn next(&self) -> Option<Self> {
		Self::STAGES.get(self.position() + 1).copied()
	}

	fn is_terminal(&self) -> bool {
		self.next().is_none()
	}

	/// Only strictly forward moves are allowed.
	fn can_advance_to(&self, target: Self) -> bool {
		target.position() > self.position()
	}
}

/// Batch status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
	Pending,
	Confirmed,
	Exported,
	Fulfilled,
}

impl Lifecycle for BatchStatus {
	const STAGES: &'static [Self] = &[
		BatchStatus::Pending,
		BatchStatus::Confirmed,
		BatchStatus::Exported,
		BatchStatus::Fulfilled,
	];
}

impl BatchStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			BatchStatus::Pending => "PENDING",
			BatchStatus::Confirmed => "CONFIRMED",
			BatchStatus::Exported => "EXPORTED",
			BatchStatus::Fulfilled => "FULFILLED",
		}
	}
}

impl fmt::Display for BatchStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for BatchStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::STAGES
			.iter()
			.copied()
			.find(|status| status.as_str() == s)
			.ok_or_else(|| format!("unknown batch status: {}", s))
	}
}

/// Order status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
	OrderCreated,
	PendingFulfillment,
	Shipped,
	Delivered,
}

impl Lifecycle for OrderStatus {
	const STAGES: &'static [Self] = &[
		OrderStatus::OrderCreated,
		OrderStatus::PendingFulfillment,
		OrderStatus::Shipped,
		OrderStatus::Delivered,
	];
}

impl OrderStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::OrderCreated => "ORDER_CREATED",
			OrderStatus::PendingFulfillment => "PENDING_FULFILLMENT",
			OrderStatus::Shipped => "SHIPPED",
			OrderStatus::Delivered => "DELIVERED",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::STAGES
			.iter()
			.copied()
			.find(|status| status.as_str() == s)
			.ok_or_else(|| format!("unknown order status: {}", s))
	}
}

/// Estimated delivery window shared by a batch and its orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
	#[serde(rename = "estimatedDeliveryStart")]
	pub start: DateTime<Utc>,
	#[serde(rename = "estimatedDeliveryEnd")]
	pub end: DateTime<Utc>,
}

/// A group of orders created together from one confirmed pairing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBatch {
	/// Public identifier (`BATCH-` prefix).
	pub batch_id: String,
	pub status: BatchStatus,
	/// Sum of order totals, frozen at creation.
	pub total_cost: f64,
	/// Number of orders created for this batch.
	pub order_count: usize,
	/// Serialized selection polygon, when the batch came from a map selection.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub selection_polygon: Option<String>,
	#[serde(flatten)]
	pub delivery_window: DeliveryWindow,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// A single gift delivery to one address.
///
/// Immutable apart from `status` and `email_sent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Public identifier (`HOHOHO-` prefix).
	pub order_id: String,
	pub batch_id: String,
	pub status: OrderStatus,
	/// Address snapshot serialized as JSON.
	pub shipping_address: String,
	pub product_asin: String,
	pub product_name: String,
	pub product_price: f64,
	pub shipping_cost: f64,
	/// `product_price + shipping_cost`.
	pub total_cost: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pairing_reason: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub recipient_email: Option<String>,
	#[serde(default)]
	pub email_sent: bool,
	#[serde(flatten)]
	pub delivery_window: DeliveryWindow,
	pub created_at: DateTime<Utc>,
}
