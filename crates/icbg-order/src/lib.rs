//! Order lifecycle.
//!
//! Batches and orders are persisted through [`StorageService`] under their
//! public identifiers. A batch is written before its orders; if any order
//! write fails, everything written for that batch is removed again.
//!
//! Every read-modify-write of a stored record runs under a per-record lock,
//! so concurrent updates to the same batch, order, or selection apply one
//! after another against fresh state.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use icbg_storage::{StorageError, StorageService};
use icbg_types::{
	generate_batch_id, generate_order_id, Address, BatchStatus, ConfirmOrdersRequest,
	ConfirmOrdersResponse, DeliveryWindow, GiftPairing, Lifecycle, Order, OrderBatch,
	OrderStatus,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

pub mod export;
pub mod selections;

pub use export::ExportFormat;

pub const BATCHES: &str = "batches";
pub const ORDERS: &str = "orders";
pub const SELECTIONS: &str = "selections";

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
	#[error("Batch not found: {0}")]
	BatchNotFound(String),
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Selection not found: {0}")]
	SelectionNotFound(String),
	#[error("Cannot move {entity} from {from} to {to}")]
	InvalidTransition {
		entity: &'static str,
		from: String,
		to: String,
	},
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	#[error("No orders found{}", .0.as_ref().map(|id| format!(" for batch: {}", id)).unwrap_or_default())]
	NoOrders(Option<String>),
	#[error("Export failed: {0}")]
	Export(String),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Pricing and scheduling applied to new orders.
#[derive(Debug, Clone)]
pub struct OrderSettings {
	pub shipping_cost: f64,
	pub delivery_start_days: i64,
	pub delivery_end_days: i64,
}

impl Default for OrderSettings {
	fn default() -> Self {
		Self {
			shipping_cost: 0.0,
			delivery_start_days: 7,
			delivery_end_days: 10,
		}
	}
}

impl OrderSettings {
	pub fn delivery_window(&self, now: DateTime<Utc>) -> DeliveryWindow {
		DeliveryWindow {
			start: now + Duration::days(self.delivery_start_days),
			end: now + Duration::days(self.delivery_end_days),
		}
	}
}

/// Manages batches, orders, and address selections.
pub struct OrderService {
	storage: Arc<StorageService>,
	settings: OrderSettings,
	locks: DashMap<String, Arc<Mutex<()>>>,
}

impl OrderService {
	pub fn new(storage: Arc<StorageService>, settings: OrderSettings) -> Self {
		Self {
			storage,
			settings,
			locks: DashMap::new(),
		}
	}

	/// Waits for exclusive access to one stored record.
	pub(crate) async fn lock_record(&self, namespace: &str, id: &str) -> OwnedMutexGuard<()> {
		let lock = self
			.locks
			.entry(format!("{}:{}", namespace, id))
			.or_default()
			.clone();
		lock.lock_owned().await
	}

	/// Drops the lock entry of a record that no longer exists.
	pub(crate) fn forget_record(&self, namespace: &str, id: &str) {
		self.locks.remove(&format!("{}:{}", namespace, id));
	}

	pub fn settings(&self) -> &OrderSettings {
		&self.settings
	}

	/// Builds the orders for a pairing run without persisting them.
	///
	/// Each order snapshots its matching address as JSON, or `{}` when the
	/// address is not in `addresses`.
	pub fn build_orders(
		&self,
		batch_id: &str,
		pairings: &[GiftPairing],
		addresses: &[Address],
		recipient_emails: &HashMap<String, String>,
		window: DeliveryWindow,
		now: DateTime<Utc>,
	) -> Result<Vec<Order>, OrderError> {
		let by_id: HashMap<&str, &Address> = addresses.iter().map(|a| (a.id.as_str(), a)).collect();

		pairings
			.iter()
			.map(|pairing| -> Result<Order, OrderError> {
				let shipping_address = match by_id.get(pairing.address_id.as_str()) {
					Some(address) => serde_json::to_string(address)
						.map_err(|e| StorageError::Serialization(e.to_string()))?,
					None => "{}".to_string(),
				};
				let product_price = pairing.product.price;
				Ok(Order {
					order_id: generate_order_id(),
					batch_id: batch_id.to_string(),
					status: OrderStatus::OrderCreated,
					shipping_address,
					product_asin: pairing.product.asin.clone(),
					product_name: pairing.product.name.clone(),
					product_price,
					shipping_cost: self.settings.shipping_cost,
					total_cost: product_price + self.settings.shipping_cost,
					pairing_reason: pairing.pairing_reason.clone(),
					recipient_email: recipient_emails.get(&pairing.address_id).cloned(),
					email_sent: false,
					delivery_window: window,
					created_at: now,
				})
			})
			.collect()
	}

	/// Creates a batch and its orders from a confirmed pairing run.
	pub async fn confirm(
		&self,
		request: &ConfirmOrdersRequest,
	) -> Result<ConfirmOrdersResponse, OrderError> {
		if request.pairings.is_empty() {
			return Err(OrderError::InvalidRequest(
				"at least one pairing is required".to_string(),
			));
		}
		if let Some(selection_id) = &request.selection_id {
			if !self.storage.exists(SELECTIONS, selection_id).await? {
				return Err(OrderError::SelectionNotFound(selection_id.clone()));
			}
		}

		let now = Utc::now();
		let window = self.settings.delivery_window(now);
		let batch_id = generate_batch_id();
		let orders = self.build_orders(
			&batch_id,
			&request.pairings,
			&request.addresses,
			&request.recipient_emails,
			window,
			now,
		)?;
		let selection_polygon = request
			.polygon
			.as_ref()
			.map(serde_json::to_string)
			.transpose()
			.map_err(|e| StorageError::Serialization(e.to_string()))?;

		let batch = OrderBatch {
			batch_id: batch_id.clone(),
			status: BatchStatus::Pending,
			total_cost: orders.iter().map(|o| o.total_cost).sum(),
			order_count: orders.len(),
			selection_polygon,
			delivery_window: window,
			notes: request.notes.clone(),
			created_at: now,
		};

		self.storage.store(BATCHES, &batch_id, &batch).await?;
		self.insert_orders(&batch_id, &orders).await?;

		if let Some(selection_id) = &request.selection_id {
			if let Err(e) = self.link_selection_to_batch(selection_id, &batch_id).await {
				warn!(
					selection_id = %selection_id,
					batch_id = %batch_id,
					error = %e,
					"Failed to link selection to batch"
				);
			}
		}

		info!(
			batch_id = %batch_id,
			orders = batch.order_count,
			total_cost = batch.total_cost,
			"Created order batch"
		);
		Ok(ConfirmOrdersResponse { batch, orders })
	}

	/// Writes all orders of a freshly stored batch, undoing the batch on failure.
	async fn insert_orders(&self, batch_id: &str, orders: &[Order]) -> Result<(), OrderError> {
		let mut written: Vec<&str> = Vec::with_capacity(orders.len());
		for order in orders {
			match self.storage.store(ORDERS, &order.order_id, order).await {
				Ok(()) => written.push(&order.order_id),
				Err(e) => {
					error!(
						batch_id,
						written = written.len(),
						error = %e,
						"Order insert failed, removing partial batch"
					);
					for order_id in written {
						if let Err(cleanup) = self.storage.remove(ORDERS, order_id).await {
							error!(order_id, error = %cleanup, "Failed to remove order during cleanup");
						}
					}
					if let Err(cleanup) = self.storage.remove(BATCHES, batch_id).await {
						error!(batch_id, error = %cleanup, "Failed to remove batch during cleanup");
					}
					return Err(e.into());
				}
			}
		}
		Ok(())
	}

	pub async fn get_batch(&self, batch_id: &str) -> Result<Option<OrderBatch>, OrderError> {
		Ok(self.storage.find(BATCHES, batch_id).await?)
	}

	async fn require_batch(&self, batch_id: &str) -> Result<OrderBatch, OrderError> {
		self.get_batch(batch_id)
			.await?
			.ok_or_else(|| OrderError::BatchNotFound(batch_id.to_string()))
	}

	/// All batches, newest first.
	pub async fn list_batches(&self) -> Result<Vec<OrderBatch>, OrderError> {
		let mut batches: Vec<OrderBatch> = self.storage.list(BATCHES).await?;
		batches.sort_by(|a, b| {
			b.created_at
				.cmp(&a.created_at)
				.then_with(|| a.batch_id.cmp(&b.batch_id))
		});
		Ok(batches)
	}

	pub async fn batches_by_status(&self, status: BatchStatus) -> Result<Vec<OrderBatch>, OrderError> {
		let mut batches = self.list_batches().await?;
		batches.retain(|b| b.status == status);
		Ok(batches)
	}

	/// Moves a batch forward. Backward and same-state moves are rejected.
	pub async fn update_batch_status(
		&self,
		batch_id: &str,
		status: BatchStatus,
	) -> Result<OrderBatch, OrderError> {
		let _guard = self.lock_record(BATCHES, batch_id).await;
		let mut batch = self.require_batch(batch_id).await?;
		if !batch.status.can_advance_to(status) {
			return Err(OrderError::InvalidTransition {
				entity: "batch",
				from: batch.status.to_string(),
				to: status.to_string(),
			});
		}
		batch.status = status;
		self.storage.store(BATCHES, batch_id, &batch).await?;
		info!(batch_id, status = %status, "Updated batch status");
		Ok(batch)
	}

	/// Deletes a batch and every order that belongs to it.
	pub async fn delete_batch(&self, batch_id: &str) -> Result<usize, OrderError> {
		let _guard = self.lock_record(BATCHES, batch_id).await;
		self.require_batch(batch_id).await?;
		let orders = self.orders_by_batch(batch_id).await?;
		for order in &orders {
			let _order_guard = self.lock_record(ORDERS, &order.order_id).await;
			self.storage.remove(ORDERS, &order.order_id).await?;
			self.forget_record(ORDERS, &order.order_id);
		}
		self.storage.remove(BATCHES, batch_id).await?;
		self.forget_record(BATCHES, batch_id);
		info!(batch_id, orders = orders.len(), "Deleted batch");
		Ok(orders.len())
	}

	pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>, OrderError> {
		Ok(self.storage.find(ORDERS, order_id).await?)
	}

	async fn require_order(&self, order_id: &str) -> Result<Order, OrderError> {
		self.get_order(order_id)
			.await?
			.ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))
	}

	/// All orders, newest first.
	pub async fn list_orders(&self) -> Result<Vec<Order>, OrderError> {
		let mut orders: Vec<Order> = self.storage.list(ORDERS).await?;
		orders.sort_by(|a, b| {
			b.created_at
				.cmp(&a.created_at)
				.then_with(|| a.order_id.cmp(&b.order_id))
		});
		Ok(orders)
	}

	pub async fn orders_by_batch(&self, batch_id: &str) -> Result<Vec<Order>, OrderError> {
		let mut orders = self.list_orders().await?;
		orders.retain(|o| o.batch_id == batch_id);
		Ok(orders)
	}

	pub async fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, OrderError> {
		let mut orders = self.list_orders().await?;
		orders.retain(|o| o.status == status);
		Ok(orders)
	}

	/// Moves an order forward. Backward and same-state moves are rejected.
	pub async fn update_order_status(
		&self,
		order_id: &str,
		status: OrderStatus,
	) -> Result<Order, OrderError> {
		let _guard = self.lock_record(ORDERS, order_id).await;
		let mut order = self.require_order(order_id).await?;
		if !order.status.can_advance_to(status) {
			return Err(OrderError::InvalidTransition {
				entity: "order",
				from: order.status.to_string(),
				to: status.to_string(),
			});
		}
		order.status = status;
		self.storage.store(ORDERS, order_id, &order).await?;
		info!(order_id, status = %status, "Updated order status");
		Ok(order)
	}

	pub async fn update_order_email_sent(
		&self,
		order_id: &str,
		email_sent: bool,
	) -> Result<Order, OrderError> {
		let _guard = self.lock_record(ORDERS, order_id).await;
		let mut order = self.require_order(order_id).await?;
		order.email_sent = email_sent;
		self.storage.store(ORDERS, order_id, &order).await?;
		Ok(order)
	}

	/// Flags orders in a batch whose recipient email is in `emails`.
	///
	/// Returns the number of orders newly flagged.
	pub async fn mark_emails_sent(
		&self,
		batch_id: &str,
		emails: &[String],
	) -> Result<usize, OrderError> {
		self.require_batch(batch_id).await?;
		let emails: HashSet<&str> = emails.iter().map(String::as_str).collect();

		let mut flagged = 0;
		for listed in self.orders_by_batch(batch_id).await? {
			let _guard = self.lock_record(ORDERS, &listed.order_id).await;
			// Re-read so a status change made since the listing is kept.
			let Some(mut order) = self.get_order(&listed.order_id).await? else {
				continue;
			};
			let matches = order
				.recipient_email
				.as_deref()
				.is_some_and(|email| emails.contains(email));
			if matches && !order.email_sent {
				order.email_sent = true;
				self.storage.store(ORDERS, &order.order_id, &order).await?;
				flagged += 1;
			}
		}
		info!(batch_id, flagged, "Marked notification emails sent");
		Ok(flagged)
	}

	/// Orders to export: one batch, or every order when `batch_id` is `None`.
	pub async fn orders_for_export(&self, batch_id: Option<&str>) -> Result<Vec<Order>, OrderError> {
		let orders = match batch_id {
			Some(id) => self.orders_by_batch(id).await?,
			None => self.list_orders().await?,
		};
		if orders.is_empty() {
			return Err(OrderError::NoOrders(batch_id.map(str::to_string)));
		}
		Ok(orders)
	}
}
