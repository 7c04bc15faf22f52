//! Submission, cancellation and iteration of pending transfer requests.

use crate::events::EventBus;
use crate::ids::IdAllocator;
use crate::keys;
use crate::snapshot::PendingSnapshot;
use crate::PoolError;
use bridge_custody::{AssetMapping, CustodyLedger, LedgerError};
use bridge_storage::StorageService;
use bridge_types::{
	parse_account_address, truncate_id, Address, Coin, PoolEvent, SendRequest, StorageKey,
	TokenValue,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::instrument;

/// Marker stored for every request consumed into a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BatchRef {
	pub token_contract: Address,
	pub nonce: u64,
}

/// Stateful manager of pending outgoing transfers.
///
/// Every mutation runs under one async lock, so each submit, cancel or batch
/// operation is a single sequential state transition. A failed operation
/// compensates what it already did before returning, leaving balances and
/// indices as they were.
pub struct OutgoingPool {
	pub(crate) storage: Arc<StorageService>,
	pub(crate) ledger: Arc<dyn CustodyLedger>,
	ids: IdAllocator,
	pub(crate) events: EventBus,
	pub(crate) lock: Mutex<()>,
	/// Human readable part every sender account must carry.
	account_prefix: String,
}

impl OutgoingPool {
	pub fn new(
		storage: Arc<StorageService>,
		ledger: Arc<dyn CustodyLedger>,
		ids: IdAllocator,
		events: EventBus,
		account_prefix: impl Into<String>,
	) -> Self {
		Self {
			storage,
			ledger,
			ids,
			events,
			lock: Mutex::new(()),
			account_prefix: account_prefix.into(),
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
		self.events.subscribe()
	}

	/// The last request id handed out, zero before the first submission.
	pub async fn last_id(&self) -> Result<u64, PoolError> {
		self.ids.last().await
	}

	/// Escrows `value + fee` from `sender` and adds a pending request.
	///
	/// `sender` must be a bech32 account with the pool's account prefix.
	/// Returns the id assigned to the new request.
	#[instrument(skip_all, fields(sender = %truncate_id(sender), denom = %value.denom))]
	pub async fn submit(
		&self,
		sender: &str,
		recipient: Address,
		value: Coin,
		fee: Coin,
	) -> Result<u64, PoolError> {
		parse_account_address(sender, &self.account_prefix).map_err(|source| {
			PoolError::InvalidSender {
				sender: sender.to_string(),
				source,
			}
		})?;
		if value.denom != fee.denom {
			return Err(PoolError::DenominationMismatch {
				value: value.denom,
				fee: fee.denom,
			});
		}
		let asset = self.lookup_asset(&value.denom).await?;
		let total = TokenValue::new(asset.contract, value.amount)
			.checked_add(&TokenValue::new(asset.contract, fee.amount))
			.ok_or(PoolError::AmountOverflow)?;
		let total = value.with_amount(total.amount());

		let _guard = self.lock.lock().await;
		self.escrow(sender, &asset, &total).await?;

		let request = match self
			.insert_request(sender, recipient, &asset, &value, &fee)
			.await
		{
			Ok(request) => request,
			Err(e) => {
				if let Err(refund) = self.refund(sender, &asset, &total).await {
					tracing::error!(error = %refund, "Failed to refund escrow after rejected submission");
				}
				return Err(e);
			},
		};

		tracing::info!(
			id = request.id,
			contract = %asset.contract,
			fee = %fee.amount,
			"Submitted transfer request"
		);
		self.events
			.publish(PoolEvent::Submitted {
				id: request.id,
				sender: request.sender.clone(),
				token_contract: asset.contract,
				fee: fee.amount,
			})
			.ok();

		Ok(request.id)
	}

	/// Cancels a pending request and refunds its sender.
	pub async fn cancel(&self, id: u64) -> Result<SendRequest, PoolError> {
		let _guard = self.lock.lock().await;
		self.cancel_locked(id, None).await
	}

	/// Like [`cancel`](Self::cancel), but only the original sender may cancel.
	pub async fn cancel_as(&self, id: u64, requester: &str) -> Result<SendRequest, PoolError> {
		let _guard = self.lock.lock().await;
		self.cancel_locked(id, Some(requester)).await
	}

	/// Looks up a pending request.
	pub async fn get(&self, id: u64) -> Result<Option<SendRequest>, PoolError> {
		Ok(self
			.storage
			.try_retrieve(StorageKey::SendRequests, &keys::request_key(id))
			.await?)
	}

	/// Nonce of the batch holding `id`, if the request was batched.
	pub async fn batch_of(&self, id: u64) -> Result<Option<(Address, u64)>, PoolError> {
		let marker: Option<BatchRef> = self
			.storage
			.try_retrieve(StorageKey::BatchedRequests, &keys::request_key(id))
			.await?;
		Ok(marker.map(|m| (m.token_contract, m.nonce)))
	}

	/// All pending requests in ascending id order.
	pub async fn pending(&self) -> Result<PendingSnapshot, PoolError> {
		let _guard = self.lock.lock().await;
		let entries = self
			.storage
			.scan_raw(StorageKey::SendRequests, "", None)
			.await?;
		Ok(PendingSnapshot::new(entries))
	}

	/// Pending requests of one token contract, highest fee first.
	///
	/// Requests with equal fees come in ascending id order.
	pub async fn pending_for_contract(
		&self,
		token_contract: Address,
	) -> Result<PendingSnapshot, PoolError> {
		let _guard = self.lock.lock().await;
		self.snapshot_for_contract(&token_contract, None).await
	}

	/// The `limit` highest-fee pending requests of one token contract.
	///
	/// Only those entries are read from storage.
	pub async fn top_pending(
		&self,
		token_contract: Address,
		limit: usize,
	) -> Result<PendingSnapshot, PoolError> {
		let _guard = self.lock.lock().await;
		self.snapshot_for_contract(&token_contract, Some(limit)).await
	}

	pub(crate) async fn snapshot_for_contract(
		&self,
		token_contract: &Address,
		limit: Option<usize>,
	) -> Result<PendingSnapshot, PoolError> {
		let entries = self
			.storage
			.scan_raw(
				StorageKey::PendingByContract,
				&keys::contract_prefix(token_contract),
				limit,
			)
			.await?;
		Ok(PendingSnapshot::new(entries))
	}

	async fn cancel_locked(
		&self,
		id: u64,
		requester: Option<&str>,
	) -> Result<SendRequest, PoolError> {
		let request = self.pending_request(id).await?;
		if let Some(requester) = requester {
			if requester != request.sender {
				return Err(PoolError::Unauthorized {
					id,
					requester: requester.to_string(),
				});
			}
		}

		let asset = self.ledger.lookup_contract(request.token_contract()).await?;
		let total = request.total().ok_or(PoolError::AmountOverflow)?;
		let total = Coin::new(asset.denom.clone(), total);

		self.unindex(&request).await?;
		if let Err(e) = self.refund(&request.sender, &asset, &total).await {
			if let Err(restore) = self.index(&request).await {
				tracing::error!(id, error = %restore, "Failed to restore request after refund failure");
			}
			return Err(e);
		}

		tracing::info!(id, refunded = %total, "Cancelled transfer request");
		self.events
			.publish(PoolEvent::Cancelled {
				id,
				sender: request.sender.clone(),
			})
			.ok();

		Ok(request)
	}

	async fn pending_request(&self, id: u64) -> Result<SendRequest, PoolError> {
		if let Some(request) = self.get(id).await? {
			return Ok(request);
		}
		match self.batch_of(id).await? {
			Some((_, nonce)) => Err(PoolError::AlreadyBatched { id, nonce }),
			None => Err(PoolError::NotFound(id)),
		}
	}

	async fn lookup_asset(&self, denom: &str) -> Result<AssetMapping, PoolError> {
		self.ledger.lookup_asset(denom).await.map_err(|e| match e {
			LedgerError::UnknownAsset(denom) => PoolError::UnknownAsset(denom),
			other => PoolError::Ledger(other),
		})
	}

	/// Moves `total` into the module account, burning it for foreign assets.
	async fn escrow(
		&self,
		account: &str,
		asset: &AssetMapping,
		total: &Coin,
	) -> Result<(), PoolError> {
		self.ledger.transfer_to_module(account, total).await?;
		if asset.is_foreign() {
			if let Err(e) = self.ledger.burn(total).await {
				if let Err(reverse) = self.ledger.transfer_from_module(account, total).await {
					tracing::error!(error = %reverse, "Failed to reverse escrow after burn failure");
				}
				return Err(e.into());
			}
		}
		Ok(())
	}

	/// Inverse of [`escrow`](Self::escrow).
	async fn refund(
		&self,
		account: &str,
		asset: &AssetMapping,
		total: &Coin,
	) -> Result<(), PoolError> {
		if asset.is_foreign() {
			self.ledger.mint(total).await?;
		}
		if let Err(e) = self.ledger.transfer_from_module(account, total).await {
			if asset.is_foreign() {
				if let Err(burn) = self.ledger.burn(total).await {
					tracing::error!(error = %burn, "Failed to burn vouchers minted for a refund");
				}
			}
			return Err(e.into());
		}
		Ok(())
	}

	async fn insert_request(
		&self,
		sender: &str,
		recipient: Address,
		asset: &AssetMapping,
		value: &Coin,
		fee: &Coin,
	) -> Result<SendRequest, PoolError> {
		let id = self.next_unused_id().await?;
		let request = SendRequest {
			id,
			sender: sender.to_string(),
			recipient,
			value: TokenValue::new(asset.contract, value.amount),
			fee: TokenValue::new(asset.contract, fee.amount),
		};

		self.index(&request).await?;
		if let Err(e) = self.ids.commit(id).await {
			if let Err(cleanup) = self.unindex(&request).await {
				tracing::error!(id, error = %cleanup, "Failed to remove uncommitted request");
			}
			return Err(e);
		}
		Ok(request)
	}

	/// Next id whose request is not stored yet.
	///
	/// A request stored right before a crash may lack its counter update; such
	/// ids are committed here instead of being handed out twice.
	async fn next_unused_id(&self) -> Result<u64, PoolError> {
		loop {
			let id = self.ids.peek_next().await?;
			let key = keys::request_key(id);
			let taken = self.storage.exists(StorageKey::SendRequests, &key).await?
				|| self
					.storage
					.exists(StorageKey::BatchedRequests, &key)
					.await?;
			if !taken {
				return Ok(id);
			}
			tracing::warn!(id, "Recovering request id stored without counter update");
			self.ids.commit(id).await?;
		}
	}

	/// Adds a request to both pending indices, or to neither.
	pub(crate) async fn index(&self, request: &SendRequest) -> Result<(), PoolError> {
		let id_key = keys::request_key(request.id);
		self.storage
			.store(StorageKey::SendRequests, &id_key, request)
			.await?;
		if let Err(e) = self
			.storage
			.store(
				StorageKey::PendingByContract,
				&keys::fee_index_key(request),
				request,
			)
			.await
		{
			if let Err(cleanup) = self.storage.remove(StorageKey::SendRequests, &id_key).await {
				tracing::error!(id = request.id, error = %cleanup, "Failed to roll back partial index");
			}
			return Err(e.into());
		}
		Ok(())
	}

	/// Removes a request from both pending indices, or from neither.
	pub(crate) async fn unindex(&self, request: &SendRequest) -> Result<(), PoolError> {
		let fee_key = keys::fee_index_key(request);
		self.storage
			.remove(StorageKey::PendingByContract, &fee_key)
			.await?;
		if let Err(e) = self
			.storage
			.remove(StorageKey::SendRequests, &keys::request_key(request.id))
			.await
		{
			if let Err(restore) = self
				.storage
				.store(StorageKey::PendingByContract, &fee_key, request)
				.await
			{
				tracing::error!(id = request.id, error = %restore, "Failed to restore fee index entry");
			}
			return Err(e.into());
		}
		Ok(())
	}
}
