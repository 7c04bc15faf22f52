//! Custody ledger abstraction for the bridge core.
//!
//! The outgoing pool never touches balances directly. It escrows funds into the
//! bridge module account, burns or mints vouchers of foreign-originated assets,
//! and resolves denominations to destination-chain contracts through the
//! [`CustodyLedger`] trait defined here.

use async_trait::async_trait;
use bridge_types::{Address, Coin, ConfigSchema, ImplementationRegistry, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
	/// The debited account holds less than requested.
	#[error("Insufficient funds in {account}: needed {needed}, available {available}")]
	InsufficientFunds {
		account: String,
		needed: Coin,
		available: U256,
	},
	/// No destination-chain contract is mapped to the denomination.
	#[error("Unknown asset: {0}")]
	UnknownAsset(String),
	/// No denomination is mapped to the destination-chain contract.
	#[error("Unknown token contract: {0}")]
	UnknownContract(Address),
	/// A credit would overflow a balance or the supply.
	#[error("Balance overflow for {0}")]
	Overflow(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// Error that occurs in the ledger implementation.
	#[error("Ledger error: {0}")]
	Backend(String),
}

/// Chain on which an asset was first issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetOrigin {
	/// Issued on the source chain. Escrowed funds stay locked in the module account.
	Native,
	/// Issued on the destination chain and represented here by vouchers that are
	/// burned when they leave and minted when they come back.
	Foreign,
}

impl AssetOrigin {
	pub fn as_str(&self) -> &'static str {
		match self {
			AssetOrigin::Native => "native",
			AssetOrigin::Foreign => "foreign",
		}
	}
}

impl fmt::Display for AssetOrigin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Link between a source-chain denomination and its destination-chain contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMapping {
	pub denom: String,
	pub contract: Address,
	pub origin: AssetOrigin,
}

impl AssetMapping {
	/// Whether funds of this asset are burned on escrow instead of retained.
	pub fn is_foreign(&self) -> bool {
		self.origin == AssetOrigin::Foreign
	}
}

/// Source-chain ledger operations the pool depends on.
///
/// Every operation either applies completely or fails without side effects.
#[async_trait]
pub trait CustodyLedger: Send + Sync {
	/// Returns the configuration schema for this ledger implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Moves `coin` from `account` into the bridge module account.
	async fn transfer_to_module(&self, account: &str, coin: &Coin) -> Result<(), LedgerError>;

	/// Moves `coin` from the bridge module account to `account`.
	async fn transfer_from_module(&self, account: &str, coin: &Coin) -> Result<(), LedgerError>;

	/// Creates `coin` in the bridge module account.
	async fn mint(&self, coin: &Coin) -> Result<(), LedgerError>;

	/// Destroys `coin` held by the bridge module account.
	async fn burn(&self, coin: &Coin) -> Result<(), LedgerError>;

	/// Resolves a denomination to its destination-chain contract.
	async fn lookup_asset(&self, denom: &str) -> Result<AssetMapping, LedgerError>;

	/// Resolves a destination-chain contract back to its denomination.
	async fn lookup_contract(&self, contract: Address) -> Result<AssetMapping, LedgerError>;

	/// Spendable balance of `account` in `denom`.
	async fn balance(&self, account: &str, denom: &str) -> Result<U256, LedgerError>;
}

/// Type alias for ledger factory functions.
pub type LedgerFactory = fn(&toml::Value) -> Result<Box<dyn CustodyLedger>, LedgerError>;

/// Registry trait for ledger implementations.
pub trait LedgerRegistry: ImplementationRegistry<Factory = LedgerFactory> {}

/// Returns (name, factory) pairs for every built-in ledger.
pub fn get_all_implementations() -> Vec<(&'static str, LedgerFactory)> {
	use implementations::memory;

	vec![(memory::Registry::NAME, memory::Registry::factory())]
}
