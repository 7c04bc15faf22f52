//! Batch assembly on top of the pending pool.
//!
//! A batch takes the highest-fee pending requests of one token contract and
//! gets the next nonce of that contract. The destination contract only accepts
//! nonces above the last executed one, so executing a batch makes every older
//! batch of the same contract unexecutable; those are returned to the pool.

use crate::ids::IdAllocator;
use crate::keys;
use crate::pool::{BatchRef, OutgoingPool};
use crate::PoolError;
use bridge_types::{Address, BatchArtifact, PoolEvent, SendRequest, StorageKey};
use tracing::instrument;

impl OutgoingPool {
	/// Moves up to `max_entries` of the highest-fee pending requests of
	/// `token_contract` into a new batch.
	///
	/// Returns `None` when the contract has no pending requests.
	#[instrument(skip(self), fields(contract = %token_contract))]
	pub async fn build_batch(
		&self,
		token_contract: Address,
		max_entries: usize,
		timeout: u64,
	) -> Result<Option<BatchArtifact>, PoolError> {
		if max_entries == 0 {
			return Err(PoolError::InvalidBatchSize);
		}

		let _guard = self.lock.lock().await;
		let entries = self
			.snapshot_for_contract(&token_contract, Some(max_entries))
			.await?
			.to_vec()?;
		if entries.is_empty() {
			tracing::debug!("No pending requests to batch");
			return Ok(None);
		}

		let nonces = IdAllocator::for_batches(self.storage.clone(), &token_contract);
		let nonce = self.next_unused_nonce(&nonces, &token_contract).await?;
		let batch = BatchArtifact {
			token_contract,
			nonce,
			timeout,
			entries,
		};

		// Entries leave the pool before the batch is stored and the nonce is
		// committed last.
		let marker = BatchRef {
			token_contract,
			nonce,
		};
		for (moved, entry) in batch.entries.iter().enumerate() {
			if let Err(e) = self.move_into_batch(entry, &marker).await {
				self.restore_entries(&batch.entries[..moved]).await;
				return Err(e);
			}
		}

		let key = keys::batch_key(&token_contract, nonce);
		if let Err(e) = self.storage.store(StorageKey::Batches, &key, &batch).await {
			self.restore_entries(&batch.entries).await;
			return Err(e.into());
		}
		if let Err(e) = nonces.commit(nonce).await {
			if let Err(cleanup) = self.storage.remove(StorageKey::Batches, &key).await {
				tracing::error!(nonce, error = %cleanup, "Failed to remove uncommitted batch");
			}
			self.restore_entries(&batch.entries).await;
			return Err(e);
		}

		tracing::info!(nonce, entries = batch.entries.len(), "Created batch");
		self.events
			.publish(PoolEvent::BatchCreated {
				token_contract,
				nonce,
				entries: batch.entries.len(),
			})
			.ok();

		Ok(Some(batch))
	}

	/// Looks up a batch that has been built but not executed.
	pub async fn batch(
		&self,
		token_contract: Address,
		nonce: u64,
	) -> Result<Option<BatchArtifact>, PoolError> {
		Ok(self
			.storage
			.try_retrieve(StorageKey::Batches, &keys::batch_key(&token_contract, nonce))
			.await?)
	}

	/// Outstanding batches of a contract in ascending nonce order.
	pub async fn batches(&self, token_contract: Address) -> Result<Vec<BatchArtifact>, PoolError> {
		let batches = self
			.storage
			.scan(StorageKey::Batches, &keys::contract_prefix(&token_contract))
			.await?;
		Ok(batches.into_iter().map(|(_, batch)| batch).collect())
	}

	/// Dissolves a batch and returns its entries to the pending pool.
	///
	/// Used when a batch timed out on the destination chain. Returns the
	/// number of requests that became pending again.
	pub async fn release_batch(
		&self,
		token_contract: Address,
		nonce: u64,
	) -> Result<usize, PoolError> {
		let _guard = self.lock.lock().await;
		self.release_locked(token_contract, nonce).await
	}

	/// Records that a batch was executed on the destination chain.
	///
	/// The batch and its markers are dropped for good and every older batch of
	/// the same contract is released. Returns the nonces that were released.
	#[instrument(skip(self), fields(contract = %token_contract))]
	pub async fn mark_batch_executed(
		&self,
		token_contract: Address,
		nonce: u64,
	) -> Result<Vec<u64>, PoolError> {
		let _guard = self.lock.lock().await;
		let key = keys::batch_key(&token_contract, nonce);
		let batch: BatchArtifact = self
			.storage
			.try_retrieve(StorageKey::Batches, &key)
			.await?
			.ok_or(PoolError::BatchNotFound {
				token_contract,
				nonce,
			})?;

		// Older batches are released first; a failure leaves this batch intact.
		let older: Vec<u64> = self
			.batches(token_contract)
			.await?
			.into_iter()
			.map(|batch| batch.nonce)
			.filter(|older| *older < nonce)
			.collect();
		for older_nonce in &older {
			self.release_locked(token_contract, *older_nonce).await?;
		}

		let marker = BatchRef {
			token_contract,
			nonce,
		};
		self.storage.remove(StorageKey::Batches, &key).await?;
		for (cleared, entry) in batch.entries.iter().enumerate() {
			if let Err(e) = self
				.storage
				.remove(StorageKey::BatchedRequests, &keys::request_key(entry.id))
				.await
			{
				self.restore_batch(&batch, &batch.entries[..cleared], &marker)
					.await;
				return Err(e.into());
			}
		}

		tracing::info!(
			nonce,
			entries = batch.entries.len(),
			released = older.len(),
			"Batch executed"
		);
		self.events
			.publish(PoolEvent::BatchExecuted {
				token_contract,
				nonce,
			})
			.ok();

		Ok(older)
	}

	async fn release_locked(&self, token_contract: Address, nonce: u64) -> Result<usize, PoolError> {
		let key = keys::batch_key(&token_contract, nonce);
		let batch: BatchArtifact = self
			.storage
			.try_retrieve(StorageKey::Batches, &key)
			.await?
			.ok_or(PoolError::BatchNotFound {
				token_contract,
				nonce,
			})?;

		// The batch is removed before any entry becomes pending again.
		self.storage.remove(StorageKey::Batches, &key).await?;
		let marker = BatchRef {
			token_contract,
			nonce,
		};
		for (returned, entry) in batch.entries.iter().enumerate() {
			if let Err(e) = self.return_to_pool(entry).await {
				for entry in batch.entries[..returned].iter().rev() {
					if let Err(undo) = self.move_into_batch(entry, &marker).await {
						tracing::error!(id = entry.id, error = %undo, "Failed to re-batch request");
					}
				}
				self.restore_batch(&batch, &[], &marker).await;
				return Err(e);
			}
		}

		let returned = batch.entries.len();
		tracing::info!(contract = %token_contract, nonce, returned, "Released batch");
		self.events
			.publish(PoolEvent::BatchReleased {
				token_contract,
				nonce,
				returned,
			})
			.ok();

		Ok(returned)
	}

	/// Marks a pending request as batched and removes it from the pool.
	async fn move_into_batch(
		&self,
		entry: &SendRequest,
		marker: &BatchRef,
	) -> Result<(), PoolError> {
		let marker_key = keys::request_key(entry.id);
		self.storage
			.store(StorageKey::BatchedRequests, &marker_key, marker)
			.await?;
		if let Err(e) = self.unindex(entry).await {
			if let Err(cleanup) = self
				.storage
				.remove(StorageKey::BatchedRequests, &marker_key)
				.await
			{
				tracing::error!(id = entry.id, error = %cleanup, "Failed to remove batch marker");
			}
			return Err(e);
		}
		Ok(())
	}

	/// Inverse of [`move_into_batch`](Self::move_into_batch).
	async fn return_to_pool(&self, entry: &SendRequest) -> Result<(), PoolError> {
		self.index(entry).await?;
		if let Err(e) = self
			.storage
			.remove(StorageKey::BatchedRequests, &keys::request_key(entry.id))
			.await
		{
			if let Err(cleanup) = self.unindex(entry).await {
				tracing::error!(id = entry.id, error = %cleanup, "Failed to withdraw request");
			}
			return Err(e.into());
		}
		Ok(())
	}

	/// Puts entries that were moved into a batch back into the pool.
	async fn restore_entries(&self, entries: &[SendRequest]) {
		for entry in entries.iter().rev() {
			if let Err(e) = self.return_to_pool(entry).await {
				tracing::error!(id = entry.id, error = %e, "Failed to return request to the pool");
			}
		}
	}

	/// Stores `batch` again along with the markers of `cleared`.
	async fn restore_batch(
		&self,
		batch: &BatchArtifact,
		cleared: &[SendRequest],
		marker: &BatchRef,
	) {
		for entry in cleared {
			if let Err(e) = self
				.storage
				.store(StorageKey::BatchedRequests, &keys::request_key(entry.id), marker)
				.await
			{
				tracing::error!(id = entry.id, error = %e, "Failed to restore batch marker");
			}
		}
		let key = keys::batch_key(&batch.token_contract, batch.nonce);
		if let Err(e) = self.storage.store(StorageKey::Batches, &key, batch).await {
			tracing::error!(nonce = batch.nonce, error = %e, "Failed to restore batch");
		}
	}

	/// Next batch nonce that is not stored yet; see `next_unused_id`.
	async fn next_unused_nonce(
		&self,
		nonces: &IdAllocator,
		token_contract: &Address,
	) -> Result<u64, PoolError> {
		loop {
			let nonce = nonces.peek_next().await?;
			let key = keys::batch_key(token_contract, nonce);
			if !self.storage.exists(StorageKey::Batches, &key).await? {
				return Ok(nonce);
			}
			tracing::warn!(nonce, "Recovering batch stored without counter update");
			nonces.commit(nonce).await?;
		}
	}
}
