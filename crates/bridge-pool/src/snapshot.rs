//! Point-in-time views of pending requests.

use crate::PoolError;
use bridge_types::SendRequest;

/// Pending requests captured at one instant.
///
/// Holds a copy of every encoded entry in its scope, so memory grows with
/// the number of entries captured. Entries are decoded while iterating.
/// Callers that only need the first few entries should take a limited view
/// such as [`OutgoingPool::top_pending`](crate::OutgoingPool::top_pending).
/// Iteration can be restarted any number of times and later pool mutations are
/// never visible.
#[derive(Debug, Clone, Default)]
pub struct PendingSnapshot {
	entries: Vec<(String, Vec<u8>)>,
}

impl PendingSnapshot {
	pub(crate) fn new(entries: Vec<(String, Vec<u8>)>) -> Self {
		Self { entries }
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Iterates from the first entry.
	pub fn iter(&self) -> PendingIter<'_> {
		PendingIter {
			inner: self.entries.iter(),
		}
	}

	/// Decodes every entry.
	pub fn to_vec(&self) -> Result<Vec<SendRequest>, PoolError> {
		self.iter().collect()
	}
}

impl<'a> IntoIterator for &'a PendingSnapshot {
	type Item = Result<SendRequest, PoolError>;
	type IntoIter = PendingIter<'a>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

/// Lazily decoding iterator over a [`PendingSnapshot`].
pub struct PendingIter<'a> {
	inner: std::slice::Iter<'a, (String, Vec<u8>)>,
}

impl Iterator for PendingIter<'_> {
	type Item = Result<SendRequest, PoolError>;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|(key, bytes)| {
			serde_json::from_slice(bytes).map_err(|e| PoolError::Corrupt {
				key: key.clone(),
				reason: e.to_string(),
			})
		})
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.inner.size_hint()
	}
}

impl ExactSizeIterator for PendingIter<'_> {}

#[cfg(test)]
mod tests {
	use super::*;
	use bridge_types::{Address, TokenValue, U256};

	fn encoded(id: u64) -> (String, Vec<u8>) {
		let contract = Address::repeat_byte(0xcc);
		let request = SendRequest {
			id,
			sender: "cosmos1qyqszqgpqyqszqgpqyqszqgpqyqszqgpjnp7du".to_string(),
			recipient: Address::repeat_byte(0xef),
			value: TokenValue::new(contract, U256::from(10)),
			fee: TokenValue::new(contract, U256::from(1)),
		};
		(format!("{:020}", id), serde_json::to_vec(&request).unwrap())
	}

	#[test]
	fn test_iteration_restarts() {
		let snapshot = PendingSnapshot::new(vec![encoded(1), encoded(2)]);
		let first: Vec<u64> = snapshot.iter().map(|r| r.unwrap().id).collect();
		let second: Vec<u64> = (&snapshot).into_iter().map(|r| r.unwrap().id).collect();
		assert_eq!(first, vec![1, 2]);
		assert_eq!(first, second);
		assert_eq!(snapshot.iter().len(), 2);
	}

	#[test]
	fn test_corrupt_entry_only_fails_itself() {
		let snapshot = PendingSnapshot::new(vec![
			encoded(1),
			("00000000000000000002".to_string(), b"garbage".to_vec()),
			encoded(3),
		]);

		let results: Vec<_> = snapshot.iter().collect();
		assert!(results[0].is_ok());
		assert!(matches!(&results[1], Err(PoolError::Corrupt { key, .. }) if key.ends_with('2')));
		assert_eq!(results[2].as_ref().unwrap().id, 3);
		assert!(snapshot.to_vec().is_err());
	}

	#[test]
	fn test_empty_snapshot() {
		let snapshot = PendingSnapshot::default();
		assert!(snapshot.is_empty());
		assert!(snapshot.iter().next().is_none());
	}
}
