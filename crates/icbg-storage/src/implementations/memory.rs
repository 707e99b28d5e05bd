//! In-memory storage backend.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use dashmap::DashMap;

/// Process-local storage; contents are lost on restart.
#[derive(Default)]
pub struct MemoryStorage {
	entries: DashMap<String, Vec<u8>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.entries
			.get(key)
			.map(|entry| entry.value().clone())
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.entries.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.entries.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.entries.contains_key(key))
	}

	async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let prefix = format!("{}:", namespace);
		Ok(self
			.entries
			.iter()
			.filter_map(|entry| entry.key().strip_prefix(&prefix).map(str::to_string))
			.collect())
	}
}

/// Factory for the memory backend. Takes no settings.
pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_delete_missing_key_is_ok() {
		let storage = MemoryStorage::new();
		assert!(storage.delete("orders:missing").await.is_ok());
	}

	#[tokio::test]
	async fn test_list_ids_strips_namespace() {
		let storage = MemoryStorage::new();
		storage.set_bytes("orders:HOHOHO-1", vec![1]).await.unwrap();
		storage.set_bytes("ordersx:HOHOHO-2", vec![2]).await.unwrap();

		assert_eq!(storage.list_ids("orders").await.unwrap(), vec!["HOHOHO-1"]);
	}
}
