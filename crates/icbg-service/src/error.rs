//! Error responses for the HTTP surface.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use icbg_core::{AdmissionError, CoreError};
use icbg_geodata::GeodataError;
use icbg_order::OrderError;
use icbg_pairing::PairingError;
use icbg_types::ApiError;
use tracing::error;

/// An error rendered as `{code, message}` with a status.
#[derive(Debug)]
pub struct HttpError {
	pub status: StatusCode,
	pub body: ApiError,
}

impl HttpError {
	pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
		Self {
			status,
			body: ApiError::new(code, message),
		}
	}

	pub fn bad_request(code: &str, message: impl Into<String>) -> Self {
		Self::new(StatusCode::BAD_REQUEST, code, message)
	}

	pub fn not_found(code: &str, message: impl Into<String>) -> Self {
		Self::new(StatusCode::NOT_FOUND, code, message)
	}

	/// Logs the cause and hides it from the caller.
	fn internal(cause: &dyn std::fmt::Display) -> Self {
		error!(error = %cause, "Request failed");
		Self::new(
			StatusCode::INTERNAL_SERVER_ERROR,
			"INTERNAL_ERROR",
			"Internal server error",
		)
	}
}

impl IntoResponse for HttpError {
	fn into_response(self) -> Response {
		(self.status, Json(self.body)).into_response()
	}
}

impl From<JsonRejection> for HttpError {
	fn from(rejection: JsonRejection) -> Self {
		Self::bad_request("INVALID_REQUEST", rejection.body_text())
	}
}

impl From<QueryRejection> for HttpError {
	fn from(rejection: QueryRejection) -> Self {
		Self::bad_request("INVALID_REQUEST", rejection.body_text())
	}
}

impl From<AdmissionError> for HttpError {
	fn from(e: AdmissionError) -> Self {
		let code = match e {
			AdmissionError::NoAddresses => "INVALID_ADDRESSES",
			AdmissionError::TooManyAddresses { .. } => "TOO_MANY_ADDRESSES",
			AdmissionError::NoRecipients => "INVALID_RECIPIENTS",
			AdmissionError::TooManyRecipients { .. } => "TOO_MANY_RECIPIENTS",
			AdmissionError::InvalidRecipientData(_) => "INVALID_RECIPIENT_DATA",
		};
		Self::bad_request(code, e.to_string())
	}
}

impl From<GeodataError> for HttpError {
	fn from(e: GeodataError) -> Self {
		match e {
			GeodataError::InvalidPolygon(_) => Self::bad_request("INVALID_POLYGON", e.to_string()),
			GeodataError::AreaTooLarge { .. } => Self::bad_request("AREA_TOO_LARGE", e.to_string()),
			GeodataError::Endpoint { .. }
			| GeodataError::ServiceUnavailable(_)
			| GeodataError::Decode(_) => {
				Self::new(StatusCode::BAD_GATEWAY, "SERVICE_UNAVAILABLE", e.to_string())
			}
			GeodataError::Configuration(_) => Self::internal(&e),
		}
	}
}

impl From<PairingError> for HttpError {
	fn from(e: PairingError) -> Self {
		match e {
			PairingError::ProductNotFound(_) => Self::not_found("PRODUCT_NOT_FOUND", e.to_string()),
			_ => Self::internal(&e),
		}
	}
}

impl From<OrderError> for HttpError {
	fn from(e: OrderError) -> Self {
		match e {
			OrderError::BatchNotFound(_) => Self::not_found("BATCH_NOT_FOUND", e.to_string()),
			OrderError::OrderNotFound(_) => Self::not_found("ORDER_NOT_FOUND", e.to_string()),
			OrderError::SelectionNotFound(_) => {
				Self::not_found("SELECTION_NOT_FOUND", e.to_string())
			}
			OrderError::NoOrders(_) => Self::not_found("NO_ORDERS", e.to_string()),
			OrderError::InvalidTransition { .. } => {
				Self::new(StatusCode::CONFLICT, "INVALID_TRANSITION", e.to_string())
			}
			OrderError::InvalidRequest(_) => Self::bad_request("INVALID_REQUEST", e.to_string()),
			OrderError::Export(_) | OrderError::Storage(_) => Self::internal(&e),
		}
	}
}

impl From<CoreError> for HttpError {
	fn from(e: CoreError) -> Self {
		match e {
			CoreError::Admission(e) => e.into(),
			CoreError::Geodata(e) => e.into(),
			CoreError::Pairing(e) => e.into(),
			CoreError::Order(e) => e.into(),
			CoreError::Notify(_) | CoreError::Config(_) => Self::internal(&e),
		}
	}
}
