//! Token values and source-chain coin amounts.
//!
//! A [`TokenValue`] is denominated in a destination-chain ERC20 contract, while
//! a [`Coin`] is the same quantity as the custody ledger on the source chain
//! sees it (a denomination string plus an amount).

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A quantity of a specific destination-chain asset.
///
/// Fields are private so a value cannot be altered after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenValue {
	contract_address: Address,
	amount: U256,
}

impl TokenValue {
	pub fn new(contract_address: Address, amount: U256) -> Self {
		Self {
			contract_address,
			amount,
		}
	}

	/// The destination-chain contract backing this value.
	pub fn contract_address(&self) -> Address {
		self.contract_address
	}

	pub fn amount(&self) -> U256 {
		self.amount
	}

	/// Adds two values of the same contract.
	///
	/// Returns `None` when the contracts differ or the sum overflows.
	pub fn checked_add(&self, other: &TokenValue) -> Option<TokenValue> {
		if self.contract_address != other.contract_address {
			return None;
		}
		self.amount
			.checked_add(other.amount)
			.map(|amount| TokenValue::new(self.contract_address, amount))
	}
}

impl fmt::Display for TokenValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}", self.amount, self.contract_address)
	}
}

/// An amount of a source-chain denomination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
	pub denom: String,
	pub amount: U256,
}

impl Coin {
	pub fn new(denom: impl Into<String>, amount: U256) -> Self {
		Self {
			denom: denom.into(),
			amount,
		}
	}

	/// Returns a coin of the same denomination with a different amount.
	pub fn with_amount(&self, amount: U256) -> Self {
		Self {
			denom: self.denom.clone(),
			amount,
		}
	}
}

impl fmt::Display for Coin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.amount, self.denom)
	}
}
