//! File-based storage backend.
//!
//! Every key is one file under the base directory. File names are the
//! percent-encoded key, so the original key can be recovered from a directory
//! listing and prefix scans do not need a separate index. Writes go through a
//! temporary file and a rename so a crash never leaves a torn value behind.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use bridge_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use std::path::{Path, PathBuf};
use tokio::fs;

const DATA_EXTENSION: &str = "bin";
const TEMP_EXTENSION: &str = "tmp";
const DEFAULT_STORAGE_PATH: &str = "./data/storage";

/// Encodes a key into a filesystem-safe name.
///
/// ASCII alphanumerics, `-` and `_` are kept; every other byte becomes `%XX`.
fn encode_key(key: &str) -> String {
	let mut encoded = String::with_capacity(key.len());
	for byte in key.bytes() {
		if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
			encoded.push(byte as char);
		} else {
			encoded.push_str(&format!("%{:02X}", byte));
		}
	}
	encoded
}

/// Inverse of [`encode_key`]. Returns `None` for names this backend did not write.
fn decode_key(name: &str) -> Option<String> {
	let bytes = name.as_bytes();
	let mut decoded = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' {
			let hex = name.get(i + 1..i + 3)?;
			decoded.push(u8::from_str_radix(hex, 16).ok()?);
			i += 3;
		} else {
			decoded.push(bytes[i]);
			i += 1;
		}
	}
	String::from_utf8(decoded).ok()
}

fn backend_error(e: std::io::Error) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	pub fn base_path(&self) -> &Path {
		&self.base_path
	}

	fn file_path(&self, key: &str) -> PathBuf {
		self.base_path
			.join(format!("{}.{}", encode_key(key), DATA_EXTENSION))
	}

	/// Lists the keys currently stored, unordered.
	async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(backend_error(e)),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await.map_err(backend_error)? {
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new(DATA_EXTENSION)) {
				continue;
			}
			let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
				continue;
			};
			match decode_key(stem) {
				Some(key) => keys.push(key),
				None => tracing::debug!("Skipping foreign file {:?}", path),
			}
		}
		Ok(keys)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		match fs::read(self.file_path(key)).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(backend_error(e)),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		fs::create_dir_all(&self.base_path)
			.await
			.map_err(backend_error)?;

		let path = self.file_path(key);
		let temp_path = path.with_extension(TEMP_EXTENSION);
		fs::write(&temp_path, value).await.map_err(backend_error)?;
		fs::rename(&temp_path, &path).await.map_err(backend_error)
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.file_path(key)).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(backend_error(e)),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.file_path(key))
			.await
			.map_err(backend_error)
	}

	async fn scan_prefix(
		&self,
		prefix: &str,
		limit: Option<usize>,
	) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let mut keys: Vec<String> = self
			.list_keys()
			.await?
			.into_iter()
			.filter(|key| key.starts_with(prefix))
			.collect();
		keys.sort();

		let limit = limit.unwrap_or(usize::MAX);
		let mut entries = Vec::new();
		for key in keys {
			if entries.len() >= limit {
				break;
			}
			match self.get_bytes(&key).await {
				Ok(value) => entries.push((key, value)),
				// Removed between listing and reading.
				Err(StorageError::NotFound) => {},
				Err(e) => return Err(e),
			}
		}
		Ok(entries)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![Field::optional("storage_path", FieldType::String)
			.with_validator(|v| match v.as_str() {
				Some("") => Err("must not be empty".to_string()),
				_ => Ok(()),
			})]);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: base directory for stored files (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl bridge_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_key_encoding_is_reversible() {
		for key in [
			"pending_by_contract:0xabc:ff:00000000000000000001",
			"with space/and%percent",
			"plain",
		] {
			let encoded = encode_key(key);
			assert!(!encoded.contains(['/', ':', ' ', '.']));
			assert_eq!(decode_key(&encoded).as_deref(), Some(key));
		}
		assert_eq!(decode_key("bad%zz"), None);
		assert_eq!(decode_key("trunc%4"), None);
	}

	#[tokio::test]
	async fn test_basic_operations() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		let key = "send_requests:00000000000000000001";
		storage.set_bytes(key, b"{}".to_vec()).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), b"{}");
		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());
		assert!(matches!(
			storage.get_bytes(key).await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_scan_prefix_survives_reopen() {
		let dir = TempDir::new().unwrap();
		{
			let storage = FileStorage::new(dir.path().to_path_buf());
			for key in ["batches:b:2", "batches:a:1", "batches:b:1", "counters:x"] {
				storage.set_bytes(key, key.as_bytes().to_vec()).await.unwrap();
			}
		}

		let reopened = FileStorage::new(dir.path().to_path_buf());
		let entries = reopened.scan_prefix("batches:b:", None).await.unwrap();
		let keys: Vec<_> = entries.iter().map(|(key, _)| key.as_str()).collect();
		assert_eq!(keys, vec!["batches:b:1", "batches:b:2"]);
		assert_eq!(entries[1].1, b"batches:b:2");
	}

	#[tokio::test]
	async fn test_scan_limit_reads_lowest_keys_only() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());
		for key in ["k:3", "k:1", "k:2", "j:0"] {
			storage.set_bytes(key, key.as_bytes().to_vec()).await.unwrap();
		}

		let entries = storage.scan_prefix("k:", Some(2)).await.unwrap();
		let keys: Vec<_> = entries.iter().map(|(key, _)| key.as_str()).collect();
		assert_eq!(keys, vec!["k:1", "k:2"]);
	}

	#[tokio::test]
	async fn test_scan_missing_directory_is_empty() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().join("never-created"));
		assert!(storage.scan_prefix("", None).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_scan_ignores_foreign_files() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());
		storage.set_bytes("k:1", vec![1]).await.unwrap();
		std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
		std::fs::write(dir.path().join("k%3A2.tmp"), b"x").unwrap();

		let keys: Vec<_> = storage
			.scan_prefix("k:", None)
			.await
			.unwrap()
			.into_iter()
			.map(|(key, _)| key)
			.collect();
		assert_eq!(keys, vec!["k:1"]);
	}

	#[test]
	fn test_config_validation() {
		let ok: toml::Value = toml::from_str("storage_path = \"/tmp/bridge\"").unwrap();
		assert!(FileStorageSchema.validate(&ok).is_ok());

		let empty: toml::Value = toml::from_str("storage_path = \"\"").unwrap();
		assert!(FileStorageSchema.validate(&empty).is_err());

		let wrong_type: toml::Value = toml::from_str("storage_path = 3").unwrap();
		assert!(matches!(
			create_storage(&wrong_type),
			Err(StorageError::Configuration(_))
		));
	}
}
