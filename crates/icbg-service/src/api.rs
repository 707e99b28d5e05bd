//! HTTP API server.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use icbg_core::DispatchEngine;
use icbg_order::{export, ExportFormat, OrderError};
use icbg_types::{
	AddressIdentifyRequest, AddressIdentifyResponse, AddressSelection, ConfirmOrdersRequest,
	ConfirmOrdersResponse, GiftPairRequest, GiftPairResponse, Order, OrderBatch, ProductCategory,
	SelectionsResponse, SendNotificationsRequest, SendNotificationsResponse,
	UpdateBatchStatusRequest, UpdateOrderStatusRequest,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

use crate::error::HttpError;

type ApiResult<T> = Result<Json<T>, HttpError>;

#[derive(Clone)]
struct AppState {
	engine: Arc<DispatchEngine>,
}

/// Builds the router with every endpoint.
pub fn router(engine: Arc<DispatchEngine>) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/api/addresses/identify", post(identify_addresses))
		.route("/api/catalog", get(catalog))
		.route("/api/gifts/pair", post(pair_gifts))
		.route("/api/notifications/send", post(send_notifications))
		.route("/api/orders", post(confirm_orders).get(list_orders))
		.route("/api/orders/export", get(export_orders))
		.route("/api/orders/batches", get(list_batches))
		.route(
			"/api/orders/batches/{batch_id}",
			get(get_batch).delete(delete_batch),
		)
		.route(
			"/api/orders/batches/{batch_id}/status",
			patch(update_batch_status),
		)
		.route("/api/orders/{order_id}", get(get_order))
		.route("/api/orders/{order_id}/status", patch(update_order_status))
		.route("/api/orders/{order_id}/email-sent", patch(update_email_sent))
		.route("/api/selections", get(list_selections))
		.route(
			"/api/selections/{selection_id}",
			get(get_selection).delete(delete_selection),
		)
		.with_state(AppState { engine })
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

/// Serves the API until the listener fails.
#[instrument(skip(engine))]
pub async fn start_http_server(
	engine: Arc<DispatchEngine>,
	host: String,
	port: u16,
) -> anyhow::Result<()> {
	let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
	info!("API server listening on {}:{}", host, port);
	axum::serve(listener, router(engine)).await?;
	Ok(())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
	Json(json!({
		"status": "ok",
		"service": state.engine.config().service.name,
	}))
}

#[instrument(skip_all)]
async fn identify_addresses(
	State(state): State<AppState>,
	payload: Result<Json<AddressIdentifyRequest>, JsonRejection>,
) -> ApiResult<AddressIdentifyResponse> {
	let Json(request) = payload?;
	Ok(Json(state.engine.identify_addresses(&request).await?))
}

#[derive(Debug, Deserialize)]
struct CatalogQuery {
	category: Option<String>,
	asin: Option<String>,
}

async fn catalog(
	State(state): State<AppState>,
	query: Result<Query<CatalogQuery>, QueryRejection>,
) -> ApiResult<Value> {
	let Query(query) = query?;
	let catalog = state.engine.catalog();

	if let Some(asin) = query.asin.filter(|a| !a.is_empty()) {
		let product = catalog.by_asin(&asin).ok_or_else(|| {
			HttpError::not_found("PRODUCT_NOT_FOUND", format!("Product not found: {}", asin))
		})?;
		return Ok(Json(json!({ "product": product })));
	}

	if let Some(category) = query.category.filter(|c| !c.is_empty()) {
		let category: ProductCategory = category.parse().map_err(|_| {
			let valid: Vec<&str> = ProductCategory::ALL.iter().map(|c| c.as_str()).collect();
			HttpError::bad_request(
				"INVALID_CATEGORY",
				format!("Invalid category. Valid options: {}", valid.join(", ")),
			)
		})?;
		let products = catalog.by_category(category);
		return Ok(Json(json!({
			"products": products,
			"count": products.len(),
			"category": category,
		})));
	}

	Ok(Json(json!({
		"products": catalog.all(),
		"count": catalog.len(),
	})))
}

#[instrument(skip_all)]
async fn pair_gifts(
	State(state): State<AppState>,
	payload: Result<Json<GiftPairRequest>, JsonRejection>,
) -> ApiResult<GiftPairResponse> {
	let Json(request) = payload?;
	Ok(Json(state.engine.pair_gifts(&request).await?))
}

#[instrument(skip_all)]
async fn send_notifications(
	State(state): State<AppState>,
	payload: Result<Json<SendNotificationsRequest>, JsonRejection>,
) -> ApiResult<SendNotificationsResponse> {
	let Json(request) = payload?;
	Ok(Json(state.engine.send_notifications(request).await?))
}

#[instrument(skip_all)]
async fn confirm_orders(
	State(state): State<AppState>,
	payload: Result<Json<ConfirmOrdersRequest>, JsonRejection>,
) -> ApiResult<ConfirmOrdersResponse> {
	let Json(request) = payload?;
	Ok(Json(state.engine.confirm_orders(&request).await?))
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
	status: Option<String>,
}

fn parse_status<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T, HttpError> {
	raw.parse()
		.map_err(|e: String| HttpError::bad_request("INVALID_STATUS", e))
}

async fn list_batches(
	State(state): State<AppState>,
	query: Result<Query<StatusQuery>, QueryRejection>,
) -> ApiResult<Value> {
	let Query(query) = query?;
	let orders = state.engine.orders();
	let batches: Vec<OrderBatch> = match query.status.as_deref() {
		Some(raw) => orders.batches_by_status(parse_status(raw)?).await?,
		None => orders.list_batches().await?,
	};
	Ok(Json(json!({ "count": batches.len(), "batches": batches })))
}

async fn get_batch(
	State(state): State<AppState>,
	Path(batch_id): Path<String>,
) -> ApiResult<Value> {
	let orders = state.engine.orders();
	let batch = orders
		.get_batch(&batch_id)
		.await?
		.ok_or_else(|| OrderError::BatchNotFound(batch_id.clone()))?;
	let batch_orders = orders.orders_by_batch(&batch_id).await?;
	let selection = orders.selection_by_batch(&batch_id).await?;
	Ok(Json(json!({
		"batch": batch,
		"orders": batch_orders,
		"selection": selection,
	})))
}

#[instrument(skip(state, payload))]
async fn update_batch_status(
	State(state): State<AppState>,
	Path(batch_id): Path<String>,
	payload: Result<Json<UpdateBatchStatusRequest>, JsonRejection>,
) -> ApiResult<OrderBatch> {
	let Json(request) = payload?;
	let batch: OrderBatch = state
		.engine
		.orders()
		.update_batch_status(&batch_id, request.status)
		.await?;
	Ok(Json(batch))
}

#[instrument(skip(state))]
async fn delete_batch(
	State(state): State<AppState>,
	Path(batch_id): Path<String>,
) -> ApiResult<Value> {
	let deleted = state.engine.orders().delete_batch(&batch_id).await?;
	Ok(Json(json!({
		"deleted": true,
		"batchId": batch_id,
		"ordersDeleted": deleted,
	})))
}

async fn list_orders(
	State(state): State<AppState>,
	query: Result<Query<StatusQuery>, QueryRejection>,
) -> ApiResult<Value> {
	let Query(query) = query?;
	let orders = state.engine.orders();
	let list: Vec<Order> = match query.status.as_deref() {
		Some(raw) => orders.orders_by_status(parse_status(raw)?).await?,
		None => orders.list_orders().await?,
	};
	Ok(Json(json!({ "count": list.len(), "orders": list })))
}

async fn get_order(State(state): State<AppState>, Path(order_id): Path<String>) -> ApiResult<Order> {
	let order = state
		.engine
		.orders()
		.get_order(&order_id)
		.await?
		.ok_or(OrderError::OrderNotFound(order_id))?;
	Ok(Json(order))
}

#[instrument(skip(state, payload))]
async fn update_order_status(
	State(state): State<AppState>,
	Path(order_id): Path<String>,
	payload: Result<Json<UpdateOrderStatusRequest>, JsonRejection>,
) -> ApiResult<Order> {
	let Json(request) = payload?;
	Ok(Json(
		state
			.engine
			.orders()
			.update_order_status(&order_id, request.status)
			.await?,
	))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailSentRequest {
	email_sent: bool,
}

async fn update_email_sent(
	State(state): State<AppState>,
	Path(order_id): Path<String>,
	payload: Result<Json<EmailSentRequest>, JsonRejection>,
) -> ApiResult<Order> {
	let Json(request) = payload?;
	Ok(Json(
		state
			.engine
			.orders()
			.update_order_email_sent(&order_id, request.email_sent)
			.await?,
	))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportQuery {
	batch_id: Option<String>,
	format: Option<String>,
}

#[instrument(skip(state, query))]
async fn export_orders(
	State(state): State<AppState>,
	query: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Response, HttpError> {
	let Query(query) = query?;
	let format = match query.format.as_deref() {
		Some(raw) => raw
			.parse::<ExportFormat>()
			.map_err(|e| HttpError::bad_request("INVALID_FORMAT", e))?,
		None => ExportFormat::default(),
	};
	let batch_id = query.batch_id.filter(|id| !id.is_empty());

	let orders = state
		.engine
		.orders()
		.orders_for_export(batch_id.as_deref())
		.await?;
	let now = Utc::now();
	let body = match format {
		ExportFormat::Csv => export::to_csv(&orders)?,
		ExportFormat::Json => export::to_json(&orders, now).to_string(),
	};
	let disposition = format!(
		"attachment; filename=\"{}\"",
		export::filename(batch_id.as_deref(), format, now)
	);
	info!(orders = orders.len(), format = %format, "Exported orders");

	Ok((
		[
			(header::CONTENT_TYPE, format.content_type().to_string()),
			(header::CONTENT_DISPOSITION, disposition),
		],
		body,
	)
		.into_response())
}

async fn list_selections(State(state): State<AppState>) -> ApiResult<SelectionsResponse> {
	let selections = state.engine.orders().list_selections().await?;
	Ok(Json(SelectionsResponse {
		count: selections.len(),
		selections,
	}))
}

async fn get_selection(
	State(state): State<AppState>,
	Path(selection_id): Path<String>,
) -> ApiResult<AddressSelection> {
	let selection = state
		.engine
		.orders()
		.get_selection(&selection_id)
		.await?
		.ok_or(OrderError::SelectionNotFound(selection_id))?;
	Ok(Json(selection))
}

async fn delete_selection(
	State(state): State<AppState>,
	Path(selection_id): Path<String>,
) -> ApiResult<Value> {
	state.engine.orders().delete_selection(&selection_id).await?;
	Ok(Json(json!({ "deleted": true, "selectionId": selection_id })))
}
