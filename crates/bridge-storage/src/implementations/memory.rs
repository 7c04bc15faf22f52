//! In-memory storage backend.
//!
//! Entries live in a `BTreeMap`, so prefix scans are a range seek followed by
//! an in-order walk. Nothing survives a restart; use it for tests and dry runs.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use bridge_types::{ConfigSchema, Schema, ValidationError};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered in-memory storage.
#[derive(Clone, Default)]
pub struct MemoryStorage {
	store: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store.contains_key(key))
	}

	async fn scan_prefix(
		&self,
		prefix: &str,
		limit: Option<usize>,
	) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let store = self.store.read().await;
		Ok(store
			.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
			.take_while(|(key, _)| key.starts_with(prefix))
			.take(limit.unwrap_or(usize::MAX))
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage. It takes no options.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl bridge_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
