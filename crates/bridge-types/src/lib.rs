//! Common types module for the bridge core.
//!
//! This module defines the data types shared by the checkpoint codec, the
//! confirmation model and the outgoing transfer pool. Keeping them in one
//! crate guarantees every component encodes and stores the same shapes.

/// Address parsing for both sides of the bridge.
pub mod address;
/// Outgoing artifacts that get checkpointed and executed on the destination chain.
pub mod artifact;
/// Events emitted by the outgoing pool.
pub mod events;
/// Base trait for self-registering implementations.
pub mod registry;
/// Storage namespaces for persisted bridge state.
pub mod storage;
/// Token values and source-chain coin amounts.
pub mod token;
/// Pending outgoing transfer requests.
pub mod transfer;
/// Utility functions for hex formatting.
pub mod utils;
/// Configuration validation types for implementation sub-tables.
pub mod validation;

pub use address::{parse_account_address, parse_eth_address, AddressError};
pub use artifact::{
	ArtifactKind, BatchArtifact, CallArtifact, OutgoingArtifact, SignerSetArtifact,
	SignerSetMember,
};
pub use events::PoolEvent;
pub use registry::ImplementationRegistry;
pub use storage::StorageKey;
pub use token::{Coin, TokenValue};
pub use transfer::SendRequest;
pub use utils::{truncate_id, without_0x_prefix};
pub use validation::*;

/// Re-exported so downstream crates agree on one primitive set.
pub use alloy_primitives::{Address, Bytes, B256, U256};
