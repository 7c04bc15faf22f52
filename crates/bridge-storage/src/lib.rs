//! Storage module for the bridge core.
//!
//! Pool state is persisted through an ordered key-value abstraction. Keys are
//! plain strings of the form `namespace:id`, and backends must be able to scan
//! a key prefix in ascending lexicographic order, which is what the pool's fee
//! index relies on.

use async_trait::async_trait;
use bridge_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level interface for ordered key-value backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key. Deleting an absent key is not an error.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Returns the entries whose key starts with `prefix`, in ascending key order.
	///
	/// With `Some(limit)` the scan stops after the first `limit` matches.
	async fn scan_prefix(
		&self,
		prefix: &str,
		limit: Option<usize>,
	) -> Result<Vec<(String, Vec<u8>)>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Returns (name, factory) pairs for every built-in storage backend.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

fn namespaced(namespace: StorageKey, id: &str) -> String {
	format!("{}:{}", namespace.as_str(), id)
}

/// Typed JSON storage on top of a [`StorageInterface`] backend.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: StorageKey,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&namespaced(namespace, id), bytes).await
	}

	/// Retrieves and deserializes a value, failing with `NotFound` when absent.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&namespaced(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Like [`retrieve`](Self::retrieve) but maps an absent key to `None`.
	pub async fn try_retrieve<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	pub async fn remove(&self, namespace: StorageKey, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&namespaced(namespace, id)).await
	}

	pub async fn exists(&self, namespace: StorageKey, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&namespaced(namespace, id)).await
	}

	/// Returns the raw entries of a namespace whose id starts with `id_prefix`.
	///
	/// Ids are returned without the namespace, in ascending order, and at most
	/// `limit` of them when a limit is given. Values are left encoded so callers
	/// can decode them lazily.
	pub async fn scan_raw(
		&self,
		namespace: StorageKey,
		id_prefix: &str,
		limit: Option<usize>,
	) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let namespace_prefix = namespaced(namespace, "");
		let entries = self
			.backend
			.scan_prefix(&namespaced(namespace, id_prefix), limit)
			.await?;

		Ok(entries
			.into_iter()
			.map(|(key, value)| {
				let id = key
					.strip_prefix(&namespace_prefix)
					.unwrap_or(key.as_str())
					.to_string();
				(id, value)
			})
			.collect())
	}

	/// Returns the decoded entries of a namespace whose id starts with `id_prefix`.
	pub async fn scan<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id_prefix: &str,
	) -> Result<Vec<(String, T)>, StorageError> {
		self.scan_raw(namespace, id_prefix, None)
			.await?
			.into_iter()
			.map(|(id, bytes)| {
				serde_json::from_slice(&bytes)
					.map(|value| (id, value))
					.map_err(|e| StorageError::Serialization(e.to_string()))
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Entry {
		amount: u64,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_store_and_retrieve() {
		let storage = service();
		storage
			.store(StorageKey::SendRequests, "1", &Entry { amount: 5 })
			.await
			.unwrap();

		let entry: Entry = storage.retrieve(StorageKey::SendRequests, "1").await.unwrap();
		assert_eq!(entry, Entry { amount: 5 });

		// Same id in another namespace is a different key.
		let missing: Option<Entry> = storage
			.try_retrieve(StorageKey::Batches, "1")
			.await
			.unwrap();
		assert!(missing.is_none());
	}

	#[tokio::test]
	async fn test_scan_strips_namespace_and_keeps_order() {
		let storage = service();
		for (id, amount) in [("b:2", 2), ("a:1", 1), ("b:1", 3)] {
			storage
				.store(StorageKey::PendingByContract, id, &Entry { amount })
				.await
				.unwrap();
		}
		storage
			.store(StorageKey::Batches, "b:9", &Entry { amount: 9 })
			.await
			.unwrap();

		let entries: Vec<(String, Entry)> = storage
			.scan(StorageKey::PendingByContract, "b:")
			.await
			.unwrap();
		let ids: Vec<_> = entries.iter().map(|(id, _)| id.as_str()).collect();
		assert_eq!(ids, vec!["b:1", "b:2"]);
		assert_eq!(entries[0].1, Entry { amount: 3 });
	}

	#[tokio::test]
	async fn test_scan_raw_limit() {
		let storage = service();
		for id in ["c:1", "c:2", "c:3", "d:1"] {
			storage
				.store(StorageKey::PendingByContract, id, &Entry { amount: 1 })
				.await
				.unwrap();
		}

		let first = storage
			.scan_raw(StorageKey::PendingByContract, "c:", Some(2))
			.await
			.unwrap();
		let ids: Vec<_> = first.iter().map(|(id, _)| id.as_str()).collect();
		assert_eq!(ids, vec!["c:1", "c:2"]);
	}

	#[tokio::test]
	async fn test_scan_reports_corrupt_values() {
		let backend = MemoryStorage::new();
		backend
			.set_bytes("batches:x", b"not json".to_vec())
			.await
			.unwrap();
		let storage = StorageService::new(Box::new(backend));

		let result: Result<Vec<(String, Entry)>, _> = storage.scan(StorageKey::Batches, "").await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["file", "memory"]);
	}
}
