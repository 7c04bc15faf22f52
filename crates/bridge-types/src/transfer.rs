//! Pending outgoing transfer requests.

use crate::TokenValue;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// A request to move value from the source chain to a destination-chain recipient.
///
/// Created by the pool on submission. The id is assigned once and never reused;
/// the request leaves the pending pool when it is batched or cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
	/// Pool-assigned identifier.
	pub id: u64,
	/// Bech32 account on the source chain that funded the request.
	pub sender: String,
	/// Destination-chain recipient.
	pub recipient: Address,
	/// Amount delivered to the recipient.
	pub value: TokenValue,
	/// Amount paid to whoever relays the batch.
	pub fee: TokenValue,
}

impl SendRequest {
	/// The destination contract both `value` and `fee` are denominated in.
	pub fn token_contract(&self) -> Address {
		self.value.contract_address()
	}

	/// Value plus fee, or `None` on overflow or when the two are
	/// denominated in different contracts.
	pub fn total(&self) -> Option<U256> {
		self.value.checked_add(&self.fee).map(|total| total.amount())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_total_and_contract() {
		let contract = address!("cccccccccccccccccccccccccccccccccccccc02");
		let request = SendRequest {
			id: 1,
			sender: "cosmos1qyqszqgpqyqszqgpqyqszqgpqyqszqgpjnp7du".to_string(),
			recipient: address!("efefefefefefefefefefefefefefefefefefef01"),
			value: TokenValue::new(contract, U256::from(100)),
			fee: TokenValue::new(contract, U256::from(5)),
		};

		assert_eq!(request.total(), Some(U256::from(105)));
		assert_eq!(request.token_contract(), contract);

		let mixed = SendRequest {
			fee: TokenValue::new(Address::repeat_byte(0xdd), U256::from(5)),
			..request
		};
		assert_eq!(mixed.total(), None);
	}

	#[test]
	fn test_serde_roundtrip_keeps_fields() {
		let contract = address!("cccccccccccccccccccccccccccccccccccccc02");
		let request = SendRequest {
			id: 9,
			sender: "cosmos1qgpqyqszqgpqyqszqgpqyqszqgpqyqszrh8mx2".to_string(),
			recipient: address!("efefefefefefefefefefefefefefefefefefef01"),
			value: TokenValue::new(contract, U256::from(3)),
			fee: TokenValue::new(contract, U256::ZERO),
		};

		let json = serde_json::to_vec(&request).unwrap();
		let decoded: SendRequest = serde_json::from_slice(&json).unwrap();
		assert_eq!(decoded, request);
	}
}
