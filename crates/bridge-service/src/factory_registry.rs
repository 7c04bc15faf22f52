//! Registry of storage and custody implementations.
//!
//! Implementations are looked up by the names used in the `implementations`
//! tables of the configuration.

use bridge_config::Config;
use bridge_custody::{CustodyLedger, LedgerError, LedgerFactory};
use bridge_storage::{StorageError, StorageFactory, StorageInterface};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while instantiating configured implementations.
#[derive(Debug, Error)]
pub enum FactoryError {
	#[error("Unknown {kind} implementation '{name}'")]
	Unknown { kind: &'static str, name: String },
	#[error("No configuration for {kind} implementation '{name}'")]
	MissingConfig { kind: &'static str, name: String },
	#[error(transparent)]
	Storage(#[from] StorageError),
	#[error(transparent)]
	Ledger(#[from] LedgerError),
}

/// Factories for every built-in implementation, by name.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub custody: HashMap<String, LedgerFactory>,
}

impl FactoryRegistry {
	fn new() -> Self {
		Self {
			storage: HashMap::new(),
			custody: HashMap::new(),
		}
	}

	/// Instantiates the primary storage backend.
	pub fn build_storage(
		&self,
		config: &Config,
	) -> Result<Box<dyn StorageInterface>, FactoryError> {
		let name = &config.storage.primary;
		let factory = self.storage.get(name).ok_or_else(|| FactoryError::Unknown {
			kind: "storage",
			name: name.clone(),
		})?;
		let settings = config.storage.implementations.get(name).ok_or_else(|| {
			FactoryError::MissingConfig {
				kind: "storage",
				name: name.clone(),
			}
		})?;
		tracing::info!(implementation = %name, "Creating storage backend");
		Ok(factory(settings)?)
	}

	/// Instantiates the primary custody ledger.
	pub fn build_ledger(&self, config: &Config) -> Result<Box<dyn CustodyLedger>, FactoryError> {
		let name = &config.custody.primary;
		let factory = self.custody.get(name).ok_or_else(|| FactoryError::Unknown {
			kind: "custody",
			name: name.clone(),
		})?;
		let settings = config.custody.implementations.get(name).ok_or_else(|| {
			FactoryError::MissingConfig {
				kind: "custody",
				name: name.clone(),
			}
		})?;
		tracing::info!(implementation = %name, "Creating custody ledger");
		Ok(factory(settings)?)
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the process-wide registry, populating it on first use.
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in bridge_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.storage.insert(name.to_string(), factory);
		}

		for (name, factory) in bridge_custody::get_all_implementations() {
			tracing::debug!("Registering custody implementation: {}", name);
			registry.custody.insert(name.to_string(), factory);
		}

		registry
	})
}
