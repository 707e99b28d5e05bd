//! Delivery notifications.
//!
//! Recipients with a malformed email address are rejected locally. The rest
//! are handed to a [`NotificationInterface`] backend in one call; if that
//! backend fails, every handed-over recipient is reported failed.

use async_trait::async_trait;
use icbg_types::{NotificationRecipient, NotificationResult, SendNotificationsResponse};
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

pub mod implementations {
	pub mod agent_mail;
}

pub const INVALID_EMAIL: &str = "Invalid email format";
pub const BACKEND_UNAVAILABLE: &str = "MCP server unavailable";

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Errors that can occur while sending notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
	#[error("Delegate failed: {0}")]
	Delegate(#[from] icbg_agent::AgentError),
	#[error("Malformed send report: {0}")]
	MalformedReport(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Backend that actually sends the emails.
#[async_trait]
pub trait NotificationInterface: Send + Sync {
	/// Sends one email per recipient and reports per-recipient status.
	async fn deliver(
		&self,
		recipients: &[NotificationRecipient],
		estimated_delivery: &str,
	) -> Result<Vec<NotificationResult>, NotifyError>;
}

/// Validates recipients and dispatches notifications.
pub struct NotificationService {
	backend: Box<dyn NotificationInterface>,
	email: Regex,
}

impl NotificationService {
	pub fn new(backend: Box<dyn NotificationInterface>) -> Result<Self, NotifyError> {
		let email =
			Regex::new(EMAIL_PATTERN).map_err(|e| NotifyError::Configuration(e.to_string()))?;
		Ok(Self { backend, email })
	}

	pub fn is_valid_email(&self, email: &str) -> bool {
		self.email.is_match(email)
	}

	/// Splits recipients into those with a well-formed email and the
	/// addresses of those without.
	pub fn validate_recipients(
		&self,
		recipients: Vec<NotificationRecipient>,
	) -> (Vec<NotificationRecipient>, Vec<String>) {
		let (valid, invalid): (Vec<_>, Vec<_>) = recipients
			.into_iter()
			.partition(|r| self.is_valid_email(&r.email));
		(valid, invalid.into_iter().map(|r| r.email).collect())
	}

	/// Sends notifications. Never fails; problems show up as failed results.
	///
	/// Results for valid recipients come first, followed by one failure per
	/// invalid email.
	pub async fn send(
		&self,
		recipients: Vec<NotificationRecipient>,
		estimated_delivery: &str,
	) -> SendNotificationsResponse {
		let (valid, invalid) = self.validate_recipients(recipients);

		let mut results = if valid.is_empty() {
			Vec::new()
		} else {
			match self.backend.deliver(&valid, estimated_delivery).await {
				Ok(results) => results,
				Err(e) => {
					warn!(error = %e, recipients = valid.len(), "Notification backend failed");
					valid
						.iter()
						.map(|r| NotificationResult::failed(r.email.clone(), BACKEND_UNAVAILABLE))
						.collect()
				}
			}
		};
		results.extend(
			invalid
				.into_iter()
				.map(|email| NotificationResult::failed(email, INVALID_EMAIL)),
		);

		let response = SendNotificationsResponse::from_results(results);
		info!(
			sent = response.sent,
			failed = response.failed,
			"Processed delivery notifications"
		);
		response
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use icbg_types::NotificationStatus;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	struct RecordingBackend {
		fail: bool,
		calls: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl NotificationInterface for RecordingBackend {
		async fn deliver(
			&self,
			recipients: &[NotificationRecipient],
			_estimated_delivery: &str,
		) -> Result<Vec<NotificationResult>, NotifyError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			if self.fail {
				return Err(NotifyError::MalformedReport("boom".into()));
			}
			Ok(recipients
				.iter()
				.map(|r| NotificationResult {
					email: r.email.clone(),
					status: NotificationStatus::Sent,
					error: None,
				})
				.collect())
		}
	}

	fn service(fail: bool) -> (NotificationService, Arc<AtomicUsize>) {
		let calls = Arc::new(AtomicUsize::new(0));
		let backend = RecordingBackend {
			fail,
			calls: calls.clone(),
		};
		(NotificationService::new(Box::new(backend)).unwrap(), calls)
	}

	fn recipient(email: &str) -> NotificationRecipient {
		NotificationRecipient {
			email: email.into(),
			name: "Pat".into(),
			address: "1 Elm St".into(),
		}
	}

	#[test]
	fn test_email_format() {
		let (service, _) = service(false);
		assert!(service.is_valid_email("pat@example.com"));
		assert!(service.is_valid_email("a.b+c@sub.example.org"));
		assert!(!service.is_valid_email("pat@example"));
		assert!(!service.is_valid_email("pat example@x.com"));
		assert!(!service.is_valid_email("@example.com"));
		assert!(!service.is_valid_email(""));
	}

	#[tokio::test]
	async fn test_invalid_emails_never_reach_backend() {
		let (service, calls) = service(false);
		let response = service
			.send(vec![recipient("nope"), recipient("also@nope")], "soon")
			.await;

		assert_eq!(calls.load(Ordering::SeqCst), 0);
		assert_eq!(response.sent, 0);
		assert_eq!(response.failed, 2);
		assert!(response
			.results
			.iter()
			.all(|r| r.error.as_deref() == Some(INVALID_EMAIL)));
	}

	#[tokio::test]
	async fn test_mixed_recipients() {
		let (service, calls) = service(false);
		let response = service
			.send(vec![recipient("bad"), recipient("good@example.com")], "soon")
			.await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(response.sent, 1);
		assert_eq!(response.failed, 1);
		assert_eq!(response.results[0].email, "good@example.com");
		assert_eq!(response.results[1].email, "bad");
	}

	#[tokio::test]
	async fn test_backend_failure_fails_every_valid_recipient() {
		let (service, _) = service(true);
		let response = service
			.send(
				vec![recipient("a@example.com"), recipient("b@example.com")],
				"soon",
			)
			.await;

		assert_eq!(response.sent, 0);
		assert_eq!(response.failed, 2);
		assert!(response
			.results
			.iter()
			.all(|r| r.error.as_deref() == Some(BACKEND_UNAVAILABLE)));
	}
}
