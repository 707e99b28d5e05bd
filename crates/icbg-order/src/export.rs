//! Order export as CSV or JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use icbg_types::Order;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::OrderError;

pub const CSV_HEADERS: [&str; 18] = [
	"Order ID",
	"Batch ID",
	"Status",
	"Street Address",
	"City",
	"State",
	"Postal Code",
	"Product ASIN",
	"Product Name",
	"Product Price",
	"Shipping Cost",
	"Total Cost",
	"Pairing Reason",
	"Recipient Email",
	"Email Sent",
	"Est. Delivery Start",
	"Est. Delivery End",
	"Created At",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
	#[default]
	Csv,
	Json,
}

impl ExportFormat {
	pub fn content_type(&self) -> &'static str {
		match self {
			ExportFormat::Csv => "text/csv",
			ExportFormat::Json => "application/json",
		}
	}
}

impl fmt::Display for ExportFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ExportFormat::Csv => f.write_str("csv"),
			ExportFormat::Json => f.write_str("json"),
		}
	}
}

impl FromStr for ExportFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"csv" => Ok(ExportFormat::Csv),
			"json" => Ok(ExportFormat::Json),
			other => Err(format!("unknown export format: {}", other)),
		}
	}
}

/// Street fields read back from an order's address snapshot.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ShippingFields {
	street_address: String,
	city: String,
	state: String,
	postal_code: String,
}

impl ShippingFields {
	/// Falls back to the raw snapshot as the street line when it is not JSON.
	fn parse(snapshot: &str) -> Self {
		serde_json::from_str(snapshot).unwrap_or_else(|_| Self {
			street_address: snapshot.to_string(),
			..Self::default()
		})
	}
}

fn timestamp(at: DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Renders orders as CSV with a header row.
///
/// Fields containing a delimiter, quote, or line break are quoted.
pub fn to_csv(orders: &[Order]) -> Result<String, OrderError> {
	let mut writer = csv::Writer::from_writer(Vec::new());
	writer
		.write_record(CSV_HEADERS)
		.map_err(|e| OrderError::Export(e.to_string()))?;

	for order in orders {
		let address = ShippingFields::parse(&order.shipping_address);
		writer
			.write_record([
				order.order_id.clone(),
				order.batch_id.clone(),
				order.status.to_string(),
				address.street_address,
				address.city,
				address.state,
				address.postal_code,
				order.product_asin.clone(),
				order.product_name.clone(),
				order.product_price.to_string(),
				order.shipping_cost.to_string(),
				order.total_cost.to_string(),
				order.pairing_reason.clone().unwrap_or_default(),
				order.recipient_email.clone().unwrap_or_default(),
				order.email_sent.to_string(),
				timestamp(order.delivery_window.start),
				timestamp(order.delivery_window.end),
				timestamp(order.created_at),
			])
			.map_err(|e| OrderError::Export(e.to_string()))?;
	}

	let bytes = writer
		.into_inner()
		.map_err(|e| OrderError::Export(e.to_string()))?;
	String::from_utf8(bytes).map_err(|e| OrderError::Export(e.to_string()))
}

/// Renders orders as `{orders, count, exportedAt}`.
pub fn to_json(orders: &[Order], exported_at: DateTime<Utc>) -> Value {
	json!({
		"orders": orders,
		"count": orders.len(),
		"exportedAt": timestamp(exported_at),
	})
}

/// Download file name for an export.
pub fn filename(batch_id: Option<&str>, format: ExportFormat, at: DateTime<Utc>) -> String {
	let millis = at.timestamp_millis();
	match batch_id {
		Some(id) => format!("orders-{}-{}.{}", id, millis, format),
		None => format!("all-orders-{}.{}", millis, format),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::*;
	use chrono::TimeZone;

	async fn orders() -> Vec<Order> {
		let service = service();
		let mut request = request(
			vec![pairing("a1", "B1", 12.5), pairing("a2", "B2", 3.0)],
			vec![address("a1")],
		);
		request
			.recipient_emails
			.insert("a1".into(), "kid@example.com".into());
		let mut orders = service.confirm(&request).await.unwrap().orders;
		orders.sort_by(|a, b| a.product_asin.cmp(&b.product_asin));
		orders
	}

	#[tokio::test]
	async fn test_csv_layout_and_quoting() {
		let orders = orders().await;
		let csv = to_csv(&orders).unwrap();
		let lines: Vec<&str> = csv.lines().collect();

		assert_eq!(lines.len(), 3);
		assert_eq!(lines[0], CSV_HEADERS.join(","));
		assert!(lines[1].contains(",ORDER_CREATED,12 Holly Ln,Springfield,IL,62701,B1,Gift B1,12.5,0,12.5,"));
		assert!(lines[1].contains(r#","Because, ""holidays""",kid@example.com,false,"#));
		// The unmatched address exports with empty street fields.
		assert!(lines[2].contains(",ORDER_CREATED,,,,,B2,"));
	}

	#[tokio::test]
	async fn test_csv_round_trips_through_reader() {
		let orders = orders().await;
		let csv = to_csv(&orders).unwrap();
		let mut reader = csv::Reader::from_reader(csv.as_bytes());

		let headers = reader.headers().unwrap().clone();
		assert_eq!(headers.len(), CSV_HEADERS.len());
		let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
		assert_eq!(rows.len(), 2);
		assert_eq!(&rows[0][12], "Because, \"holidays\"");
		assert_eq!(&rows[0][0], orders[0].order_id);
	}

	#[test]
	fn test_raw_snapshot_becomes_street() {
		let fields = ShippingFields::parse("1 Elm St, Springfield");
		assert_eq!(fields.street_address, "1 Elm St, Springfield");
		assert!(fields.city.is_empty());
	}

	#[tokio::test]
	async fn test_json_export() {
		let orders = orders().await;
		let at = Utc.with_ymd_and_hms(2025, 12, 1, 8, 30, 0).unwrap();
		let value = to_json(&orders, at);

		assert_eq!(value["count"], 2);
		assert_eq!(value["exportedAt"], "2025-12-01T08:30:00.000Z");
		assert_eq!(value["orders"][0]["productAsin"], "B1");
		assert_eq!(value["orders"][0]["status"], "ORDER_CREATED");
	}

	#[test]
	fn test_format_and_filename() {
		assert_eq!("json".parse::<ExportFormat>(), Ok(ExportFormat::Json));
		assert!("xml".parse::<ExportFormat>().is_err());
		assert_eq!(ExportFormat::default().content_type(), "text/csv");

		let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
		assert_eq!(
			filename(Some("BATCH-1"), ExportFormat::Csv, at),
			"orders-BATCH-1-1700000000000.csv"
		);
		assert_eq!(
			filename(None, ExportFormat::Json, at),
			"all-orders-1700000000000.json"
		);
	}
}
