//! Request-size limits applied before any work is done.

use icbg_config::AdmissionConfig;
use icbg_geodata::{polygon, GeodataError};
use icbg_types::{Address, NotificationRecipient, Polygon};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AdmissionError {
	#[error("At least one address is required")]
	NoAddresses,
	#[error("Too many addresses: {count} exceeds maximum of {max}")]
	TooManyAddresses { count: usize, max: usize },
	#[error("At least one recipient is required")]
	NoRecipients,
	#[error("Too many recipients: {count} exceeds maximum of {max}")]
	TooManyRecipients { count: usize, max: usize },
	#[error("Recipient at position {0} is missing required fields")]
	InvalidRecipientData(usize),
}

/// Admission checks driven by the `[admission]` config section.
#[derive(Debug, Clone)]
pub struct Admission {
	limits: AdmissionConfig,
}

impl Admission {
	pub fn new(limits: AdmissionConfig) -> Self {
		Self { limits }
	}

	pub fn limits(&self) -> &AdmissionConfig {
		&self.limits
	}

	/// Validates the polygon and returns its area in km².
	pub fn check_area(&self, polygon: &Polygon) -> Result<f64, GeodataError> {
		polygon::validate(polygon)?;
		let area_km2 = polygon::area_km2(polygon);
		if area_km2 > self.limits.max_area_km2 {
			return Err(GeodataError::AreaTooLarge {
				area_km2,
				max_km2: self.limits.max_area_km2,
			});
		}
		Ok(area_km2)
	}

	/// Caller-supplied limit capped at the configured maximum.
	pub fn address_limit(&self, requested: Option<usize>) -> usize {
		requested
			.map(|limit| limit.min(self.limits.max_addresses))
			.unwrap_or(self.limits.max_addresses)
	}

	pub fn check_addresses(&self, addresses: &[Address]) -> Result<(), AdmissionError> {
		if addresses.is_empty() {
			return Err(AdmissionError::NoAddresses);
		}
		if addresses.len() > self.limits.max_addresses {
			return Err(AdmissionError::TooManyAddresses {
				count: addresses.len(),
				max: self.limits.max_addresses,
			});
		}
		Ok(())
	}

	/// Rejects empty or oversized lists and recipients missing a field.
	///
	/// Email format is not checked here; malformed emails are reported per
	/// recipient by the notification service.
	pub fn check_recipients(&self, recipients: &[NotificationRecipient]) -> Result<(), AdmissionError> {
		if recipients.is_empty() {
			return Err(AdmissionError::NoRecipients);
		}
		if recipients.len() > self.limits.max_recipients {
			return Err(AdmissionError::TooManyRecipients {
				count: recipients.len(),
				max: self.limits.max_recipients,
			});
		}
		if let Some(index) = recipients.iter().position(|r| {
			r.email.trim().is_empty() || r.name.trim().is_empty() || r.address.trim().is_empty()
		}) {
			return Err(AdmissionError::InvalidRecipientData(index));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use icbg_types::Position;

	fn admission() -> Admission {
		Admission::new(AdmissionConfig {
			max_area_km2: 10.0,
			max_addresses: 3,
			max_recipients: 2,
		})
	}

	fn square(side: f64) -> Polygon {
		Polygon::from_ring(vec![
			Position::new(0.0, 0.0),
			Position::new(0.0, side),
			Position::new(side, side),
			Position::new(side, 0.0),
			Position::new(0.0, 0.0),
		])
	}

	fn recipient(email: &str, name: &str) -> NotificationRecipient {
		NotificationRecipient {
			email: email.into(),
			name: name.into(),
			address: "1 Elm St".into(),
		}
	}

	#[test]
	fn test_area_ceiling() {
		let admission = admission();
		let area = admission.check_area(&square(0.001)).unwrap();
		assert!(area > 0.0 && area < 0.1);

		// Roughly 111 km on a side at the equator.
		match admission.check_area(&square(1.0)) {
			Err(GeodataError::AreaTooLarge { area_km2, max_km2 }) => {
				assert!(area_km2 > 10_000.0);
				assert_eq!(max_km2, 10.0);
			}
			other => panic!("expected AreaTooLarge, got {:?}", other),
		}

		let open = Polygon::from_ring(vec![Position::new(0.0, 0.0), Position::new(0.0, 1.0)]);
		assert!(matches!(
			admission.check_area(&open),
			Err(GeodataError::InvalidPolygon(_))
		));
	}

	#[test]
	fn test_hole_cannot_hide_queried_area() {
		let admission = admission();
		let mut polygon = square(1.0);
		let hole = polygon.coordinates[0].clone();
		polygon.coordinates.push(hole);

		assert!(matches!(
			admission.check_area(&polygon),
			Err(GeodataError::AreaTooLarge { area_km2, .. }) if area_km2 > 10_000.0
		));
	}

	#[test]
	fn test_address_limit_is_capped() {
		let admission = admission();
		assert_eq!(admission.address_limit(None), 3);
		assert_eq!(admission.address_limit(Some(2)), 2);
		assert_eq!(admission.address_limit(Some(500)), 3);
	}

	#[test]
	fn test_recipient_checks() {
		let admission = admission();
		assert_eq!(admission.check_recipients(&[]), Err(AdmissionError::NoRecipients));
		assert_eq!(
			admission.check_recipients(&[
				recipient("a@example.com", "A"),
				recipient("b@example.com", "B"),
				recipient("c@example.com", "C"),
			]),
			Err(AdmissionError::TooManyRecipients { count: 3, max: 2 })
		);
		assert_eq!(
			admission.check_recipients(&[recipient("a@example.com", "A"), recipient("b@example.com", " ")]),
			Err(AdmissionError::InvalidRecipientData(1))
		);
		// Format problems are left to the notification service.
		assert!(admission.check_recipients(&[recipient("not-an-email", "A")]).is_ok());
	}
}
