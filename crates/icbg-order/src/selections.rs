//! Address selection records.

use chrono::Utc;
use icbg_storage::StorageError;
use icbg_types::{generate_selection_id, AddressSelection, BoundingBox, Polygon};
use tracing::info;

use crate::{OrderError, OrderService, SELECTIONS};

impl OrderService {
	/// Records a resolved polygon.
	pub async fn create_selection(
		&self,
		polygon: &Polygon,
		bounding_box: BoundingBox,
		address_count: usize,
		location_description: Option<String>,
	) -> Result<AddressSelection, OrderError> {
		let serialize = |e: serde_json::Error| StorageError::Serialization(e.to_string());
		let selection = AddressSelection {
			selection_id: generate_selection_id(),
			polygon: serde_json::to_string(polygon).map_err(serialize)?,
			bounding_box: serde_json::to_string(&bounding_box).map_err(serialize)?,
			address_count,
			batch_id: None,
			location_description,
			created_at: Utc::now(),
		};
		self.storage
			.store(SELECTIONS, &selection.selection_id, &selection)
			.await?;
		info!(
			selection_id = %selection.selection_id,
			address_count,
			"Recorded address selection"
		);
		Ok(selection)
	}

	pub async fn get_selection(
		&self,
		selection_id: &str,
	) -> Result<Option<AddressSelection>, OrderError> {
		Ok(self.storage.find(SELECTIONS, selection_id).await?)
	}

	async fn require_selection(&self, selection_id: &str) -> Result<AddressSelection, OrderError> {
		self.get_selection(selection_id)
			.await?
			.ok_or_else(|| OrderError::SelectionNotFound(selection_id.to_string()))
	}

	/// The selection a batch was created from, if any.
	pub async fn selection_by_batch(
		&self,
		batch_id: &str,
	) -> Result<Option<AddressSelection>, OrderError> {
		Ok(self
			.list_selections()
			.await?
			.into_iter()
			.find(|s| s.batch_id.as_deref() == Some(batch_id)))
	}

	/// All selections, newest first.
	pub async fn list_selections(&self) -> Result<Vec<AddressSelection>, OrderError> {
		let mut selections: Vec<AddressSelection> = self.storage.list(SELECTIONS).await?;
		selections.sort_by(|a, b| {
			b.created_at
				.cmp(&a.created_at)
				.then_with(|| a.selection_id.cmp(&b.selection_id))
		});
		Ok(selections)
	}

	pub async fn link_selection_to_batch(
		&self,
		selection_id: &str,
		batch_id: &str,
	) -> Result<AddressSelection, OrderError> {
		let _guard = self.lock_record(SELECTIONS, selection_id).await;
		let mut selection = self.require_selection(selection_id).await?;
		selection.batch_id = Some(batch_id.to_string());
		self.storage
			.store(SELECTIONS, selection_id, &selection)
			.await?;
		Ok(selection)
	}

	pub async fn update_selection_address_count(
		&self,
		selection_id: &str,
		address_count: usize,
	) -> Result<AddressSelection, OrderError> {
		let _guard = self.lock_record(SELECTIONS, selection_id).await;
		let mut selection = self.require_selection(selection_id).await?;
		selection.address_count = address_count;
		self.storage
			.store(SELECTIONS, selection_id, &selection)
			.await?;
		Ok(selection)
	}

	pub async fn delete_selection(&self, selection_id: &str) -> Result<(), OrderError> {
		let _guard = self.lock_record(SELECTIONS, selection_id).await;
		self.require_selection(selection_id).await?;
		self.storage.remove(SELECTIONS, selection_id).await?;
		self.forget_record(SELECTIONS, selection_id);
		info!(selection_id, "Deleted address selection");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use crate::test_support::*;
	use crate::OrderError;
	use icbg_types::{BoundingBox, Polygon, Position};

	fn polygon() -> Polygon {
		Polygon::from_ring(vec![
			Position::new(-89.66, 39.78),
			Position::new(-89.65, 39.78),
			Position::new(-89.65, 39.79),
			Position::new(-89.66, 39.78),
		])
	}

	#[tokio::test]
	async fn test_selection_round_trip_and_linking() {
		let service = service();
		let polygon = polygon();
		let bbox = BoundingBox::of_polygon(&polygon).unwrap();

		let selection = service
			.create_selection(&polygon, bbox, 12, Some("Downtown".into()))
			.await
			.unwrap();
		assert!(selection.selection_id.starts_with("SEL-"));
		assert_eq!(selection.bounding_box, "[-89.66,39.78,-89.65,39.79]");

		let mut request = request(vec![pairing("a1", "B1", 5.0)], vec![address("a1")]);
		request.selection_id = Some(selection.selection_id.clone());
		let batch_id = service.confirm(&request).await.unwrap().batch.batch_id;

		let linked = service.selection_by_batch(&batch_id).await.unwrap().unwrap();
		assert_eq!(linked.selection_id, selection.selection_id);
		assert_eq!(linked.location_description.as_deref(), Some("Downtown"));

		let updated = service
			.update_selection_address_count(&selection.selection_id, 7)
			.await
			.unwrap();
		assert_eq!(updated.address_count, 7);
		assert_eq!(updated.batch_id.as_deref(), Some(batch_id.as_str()));
	}

	#[tokio::test]
	async fn test_missing_selection_mutations() {
		let service = service();
		assert!(matches!(
			service.link_selection_to_batch("SEL-NOPE", "BATCH-X").await,
			Err(OrderError::SelectionNotFound(_))
		));
		assert!(matches!(
			service.update_selection_address_count("SEL-NOPE", 1).await,
			Err(OrderError::SelectionNotFound(_))
		));
		assert!(matches!(
			service.delete_selection("SEL-NOPE").await,
			Err(OrderError::SelectionNotFound(_))
		));
		assert!(service.get_selection("SEL-NOPE").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_list_and_delete() {
		let service = service();
		let polygon = polygon();
		let bbox = BoundingBox::of_polygon(&polygon).unwrap();
		let first = service
			.create_selection(&polygon, bbox, 1, None)
			.await
			.unwrap();
		service
			.create_selection(&polygon, bbox, 2, None)
			.await
			.unwrap();

		assert_eq!(service.list_selections().await.unwrap().len(), 2);
		service.delete_selection(&first.selection_id).await.unwrap();
		let remaining = service.list_selections().await.unwrap();
		assert_eq!(remaining.len(), 1);
		assert_eq!(remaining[0].address_count, 2);
	}
}
