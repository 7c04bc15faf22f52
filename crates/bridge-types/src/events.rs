//! Event types emitted by the outgoing pool.
//!
//! Subscribers (relayers, indexers, the CLI) learn about pool state changes
//! through these events instead of polling storage.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// State changes of the outgoing transfer pool and its batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolEvent {
	/// A transfer request entered the pending pool.
	Submitted {
		id: u64,
		sender: String,
		token_contract: Address,
		fee: U256,
	},
	/// A pending request was cancelled and refunded.
	Cancelled { id: u64, sender: String },
	/// Pending requests were assembled into a batch.
	BatchCreated {
		token_contract: Address,
		nonce: u64,
		entries: usize,
	},
	/// A batch was dissolved and its entries returned to the pending pool.
	BatchReleased {
		token_contract: Address,
		nonce: u64,
		returned: usize,
	},
	/// A batch was executed on the destination chain.
	BatchExecuted { token_contract: Address, nonce: u64 },
}
