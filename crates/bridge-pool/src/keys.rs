//! Storage key layout of the pool.
//!
//! All numeric components are fixed width so lexicographic key order equals
//! numeric order. The fee index stores `U256::MAX - fee`, which turns an
//! ascending scan into a descending-fee walk with ties broken by ascending id.

use alloy_primitives::hex;
use bridge_types::{Address, SendRequest, U256};

/// Counter holding the last request id handed out.
pub(crate) const LAST_REQUEST_ID: &str = "last_request_id";

pub(crate) fn request_key(id: u64) -> String {
	format!("{:020}", id)
}

pub(crate) fn contract_prefix(contract: &Address) -> String {
	format!("{}:", hex::encode(contract))
}

pub(crate) fn fee_index_key(request: &SendRequest) -> String {
	let inverted = U256::MAX - request.fee.amount();
	format!(
		"{}{}:{}",
		contract_prefix(&request.token_contract()),
		hex::encode(inverted.to_be_bytes::<32>()),
		request_key(request.id)
	)
}

pub(crate) fn batch_key(contract: &Address, nonce: u64) -> String {
	format!("{}{:020}", contract_prefix(contract), nonce)
}

/// Counter holding the last batch nonce of a contract.
pub(crate) fn batch_nonce_counter(contract: &Address) -> String {
	format!("batch_nonce:{}", hex::encode(contract))
}

#[cfg(test)]
mod tests {
	use super::*;
	use bridge_types::TokenValue;

	fn request(id: u64, fee: u64) -> SendRequest {
		let contract = Address::repeat_byte(0xcc);
		SendRequest {
			id,
			sender: "cosmos1qyqszqgpqyqszqgpqyqszqgpqyqszqgpjnp7du".to_string(),
			recipient: Address::repeat_byte(0xef),
			value: TokenValue::new(contract, U256::from(1)),
			fee: TokenValue::new(contract, U256::from(fee)),
		}
	}

	#[test]
	fn test_request_keys_sort_numerically() {
		assert!(request_key(9) < request_key(10));
		assert_eq!(request_key(u64::MAX).len(), request_key(1).len());
	}

	#[test]
	fn test_fee_index_orders_by_fee_then_id() {
		let high = fee_index_key(&request(5, 100));
		let low_first = fee_index_key(&request(2, 1));
		let low_second = fee_index_key(&request(10, 1));
		let zero = fee_index_key(&request(1, 0));

		assert!(high < low_first);
		assert!(low_first < low_second);
		assert!(low_second < zero);
		assert!(high.starts_with(&contract_prefix(&Address::repeat_byte(0xcc))));
	}

	#[test]
	fn test_batch_keys_sort_by_nonce() {
		let contract = Address::repeat_byte(0xcc);
		assert!(batch_key(&contract, 2) < batch_key(&contract, 11));
		assert_ne!(batch_nonce_counter(&contract), LAST_REQUEST_ID);
	}
}
