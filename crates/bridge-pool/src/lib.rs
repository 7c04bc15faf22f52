//! Outgoing transfer pool for the bridge core.
//!
//! Users submit transfer requests that escrow value plus fee through the
//! custody ledger. Pending requests are indexed by id and by
//! (token contract, descending fee, id) so a relayer can always pick the most
//! profitable entries first. The batch assembler moves pending entries into
//! nonce-ordered batches that the checkpoint codec turns into signable digests.

use bridge_custody::LedgerError;
use bridge_storage::StorageError;
use bridge_types::{Address, AddressError};
use thiserror::Error;

mod batch;
mod events;
mod ids;
mod keys;
mod pool;
mod snapshot;

pub use events::EventBus;
pub use ids::IdAllocator;
pub use pool::OutgoingPool;
pub use snapshot::{PendingIter, PendingSnapshot};

/// Errors returned by pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
	#[error("Transfer request {0} not found")]
	NotFound(u64),
	#[error("Transfer request {id} is already part of batch {nonce}")]
	AlreadyBatched { id: u64, nonce: u64 },
	#[error("Value denomination '{value}' does not match fee denomination '{fee}'")]
	DenominationMismatch { value: String, fee: String },
	#[error("Unknown asset: {0}")]
	UnknownAsset(String),
	#[error("Value plus fee overflows")]
	AmountOverflow,
	#[error("Invalid sender '{sender}': {source}")]
	InvalidSender { sender: String, source: AddressError },
	#[error("{requester} did not submit transfer request {id}")]
	Unauthorized { id: u64, requester: String },
	#[error("Batch {nonce} of {token_contract} not found")]
	BatchNotFound { token_contract: Address, nonce: u64 },
	#[error("Batch size must be at least one entry")]
	InvalidBatchSize,
	#[error("Identifier space exhausted")]
	IdSpaceExhausted,
	#[error("Counter expected {expected}, got {got}")]
	OutOfOrderId { expected: u64, got: u64 },
	#[error("Corrupt entry '{key}': {reason}")]
	Corrupt { key: String, reason: String },
	#[error("Ledger error: {0}")]
	Ledger(#[from] LedgerError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

#[cfg(test)]
pub(crate) mod test_utils {
	use crate::{EventBus, IdAllocator, OutgoingPool};
	use alloy_primitives::address;
	use async_trait::async_trait;
	use bridge_custody::implementations::memory::MemoryLedger;
	use bridge_custody::{AssetMapping, AssetOrigin, CustodyLedger};
	use bridge_storage::implementations::memory::MemoryStorage;
	use bridge_storage::{StorageError, StorageInterface, StorageService};
	use bridge_types::{Address, Coin, ConfigSchema, U256};
	use std::sync::{Arc, Mutex};

	pub const PREFIX: &str = "cosmos";
	pub const ALICE: &str = "cosmos1qyqszqgpqyqszqgpqyqszqgpqyqszqgpjnp7du";
	pub const BOB: &str = "cosmos1qgpqyqszqgpqyqszqgpqyqszqgpqyqszrh8mx2";
	pub const NATIVE: &str = "uatom";
	pub const FOREIGN: &str = "gravity0xdd";

	pub fn native_contract() -> Address {
		address!("cccccccccccccccccccccccccccccccccccccc02")
	}

	pub fn foreign_contract() -> Address {
		Address::repeat_byte(0xdd)
	}

	pub fn recipient() -> Address {
		address!("efefefefefefefefefefefefefefefefefefef01")
	}

	pub fn coin(denom: &str, amount: u64) -> Coin {
		Coin::new(denom, U256::from(amount))
	}

	pub async fn funded_ledger() -> Arc<MemoryLedger> {
		let ledger = MemoryLedger::new(vec![
			AssetMapping {
				denom: NATIVE.to_string(),
				contract: native_contract(),
				origin: AssetOrigin::Native,
			},
			AssetMapping {
				denom: FOREIGN.to_string(),
				contract: foreign_contract(),
				origin: AssetOrigin::Foreign,
			},
		]);
		for account in [ALICE, BOB] {
			ledger.fund(account, &coin(NATIVE, 1000)).await.unwrap();
			ledger.fund(account, &coin(FOREIGN, 1000)).await.unwrap();
		}
		Arc::new(ledger)
	}

	pub fn pool_with(
		backend: Box<dyn StorageInterface>,
		ledger: Arc<dyn CustodyLedger>,
	) -> OutgoingPool {
		let storage = Arc::new(StorageService::new(backend));
		let ids = IdAllocator::new(storage.clone());
		OutgoingPool::new(storage, ledger, ids, EventBus::new(64), PREFIX)
	}

	pub async fn setup() -> (OutgoingPool, Arc<MemoryLedger>) {
		let ledger = funded_ledger().await;
		let pool = pool_with(Box::new(MemoryStorage::new()), ledger.clone());
		(pool, ledger)
	}

	/// Memory storage whose writes or deletes fail for chosen key prefixes.
	///
	/// Clones share both the data and the failure rules.
	#[derive(Clone, Default)]
	pub struct FailingStorage {
		pub inner: MemoryStorage,
		failing_writes: Arc<Mutex<Vec<String>>>,
		failing_deletes: Arc<Mutex<Vec<String>>>,
	}

	impl FailingStorage {
		pub fn fail_writes(&self, prefix: impl Into<String>) {
			self.failing_writes.lock().unwrap().push(prefix.into());
		}

		pub fn fail_deletes(&self, prefix: impl Into<String>) {
			self.failing_deletes.lock().unwrap().push(prefix.into());
		}

		/// Drops every failure rule.
		pub fn heal(&self) {
			self.failing_writes.lock().unwrap().clear();
			self.failing_deletes.lock().unwrap().clear();
		}

		fn refuses(rules: &Mutex<Vec<String>>, key: &str) -> bool {
			rules
				.lock()
				.unwrap()
				.iter()
				.any(|prefix| key.starts_with(prefix.as_str()))
		}
	}

	#[async_trait]
	impl StorageInterface for FailingStorage {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			self.inner.get_bytes(key).await
		}
		async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
			if Self::refuses(&self.failing_writes, key) {
				return Err(StorageError::Backend("disk full".to_string()));
			}
			self.inner.set_bytes(key, value).await
		}
		async fn delete(&self, key: &str) -> Result<(), StorageError> {
			if Self::refuses(&self.failing_deletes, key) {
				return Err(StorageError::Backend("io".to_string()));
			}
			self.inner.delete(key).await
		}
		async fn exists(&self, key: &str) -> Result<bool, StorageError> {
			self.inner.exists(key).await
		}
		async fn scan_prefix(
			&self,
			prefix: &str,
			limit: Option<usize>,
		) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
			self.inner.scan_prefix(prefix, limit).await
		}
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.inner.config_schema()
		}
	}
}
