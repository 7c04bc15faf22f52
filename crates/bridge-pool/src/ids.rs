//! Persistent monotonic identifier allocation.

use crate::keys;
use crate::PoolError;
use bridge_storage::StorageService;
use bridge_types::{Address, StorageKey};
use std::sync::Arc;

/// Hands out strictly increasing identifiers backed by a stored counter.
///
/// Allocation is split in two steps: [`peek_next`](Self::peek_next) reads the
/// candidate and [`commit`](Self::commit) advances the counter once the caller
/// has durably stored whatever the id names. Callers serialize the two steps.
#[derive(Clone)]
pub struct IdAllocator {
	storage: Arc<StorageService>,
	counter: String,
}

impl IdAllocator {
	/// Allocator for transfer request ids.
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self::with_counter(storage, keys::LAST_REQUEST_ID)
	}

	/// Allocator for the batch nonces of one token contract.
	pub fn for_batches(storage: Arc<StorageService>, token_contract: &Address) -> Self {
		Self::with_counter(storage, keys::batch_nonce_counter(token_contract))
	}

	pub fn with_counter(storage: Arc<StorageService>, counter: impl Into<String>) -> Self {
		Self {
			storage,
			counter: counter.into(),
		}
	}

	/// The last committed id, zero if none was ever committed.
	pub async fn last(&self) -> Result<u64, PoolError> {
		Ok(self
			.storage
			.try_retrieve(StorageKey::Counters, &self.counter)
			.await?
			.unwrap_or(0))
	}

	pub async fn peek_next(&self) -> Result<u64, PoolError> {
		self.last()
			.await?
			.checked_add(1)
			.ok_or(PoolError::IdSpaceExhausted)
	}

	/// Advances the counter to `id`, which must be the value `peek_next` returns.
	pub async fn commit(&self, id: u64) -> Result<(), PoolError> {
		let expected = self.peek_next().await?;
		if id != expected {
			return Err(PoolError::OutOfOrderId { expected, got: id });
		}
		self.storage
			.store(StorageKey::Counters, &self.counter, &id)
			.await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bridge_storage::implementations::memory::MemoryStorage;

	fn storage() -> Arc<StorageService> {
		Arc::new(StorageService::new(Box::new(MemoryStorage::new())))
	}

	#[tokio::test]
	async fn test_starts_at_one_and_only_advances_on_commit() {
		let ids = IdAllocator::new(storage());
		assert_eq!(ids.last().await.unwrap(), 0);
		assert_eq!(ids.peek_next().await.unwrap(), 1);
		assert_eq!(ids.peek_next().await.unwrap(), 1);

		ids.commit(1).await.unwrap();
		assert_eq!(ids.peek_next().await.unwrap(), 2);
	}

	#[tokio::test]
	async fn test_commit_rejects_skips_and_reuse() {
		let ids = IdAllocator::new(storage());
		ids.commit(1).await.unwrap();

		assert!(matches!(
			ids.commit(1).await,
			Err(PoolError::OutOfOrderId {
				expected: 2,
				got: 1
			})
		));
		assert!(matches!(
			ids.commit(3).await,
			Err(PoolError::OutOfOrderId { .. })
		));
		assert_eq!(ids.last().await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_counters_are_independent() {
		let storage = storage();
		let requests = IdAllocator::new(storage.clone());
		let batches_a = IdAllocator::for_batches(storage.clone(), &Address::repeat_byte(0xaa));
		let batches_b = IdAllocator::for_batches(storage, &Address::repeat_byte(0xbb));

		requests.commit(1).await.unwrap();
		requests.commit(2).await.unwrap();
		batches_a.commit(1).await.unwrap();

		assert_eq!(requests.peek_next().await.unwrap(), 3);
		assert_eq!(batches_a.peek_next().await.unwrap(), 2);
		assert_eq!(batches_b.peek_next().await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_exhausted_space() {
		let storage = storage();
		storage
			.store(StorageKey::Counters, keys::LAST_REQUEST_ID, &u64::MAX)
			.await
			.unwrap();
		let ids = IdAllocator::new(storage);
		assert!(matches!(
			ids.peek_next().await,
			Err(PoolError::IdSpaceExhausted)
		));
	}
}
