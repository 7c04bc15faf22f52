//! Storage namespaces for persisted bridge state.

/// Namespaces under which bridge state is persisted.
///
/// Keys inside a namespace are built so that lexicographic order matches the
/// iteration order the pool needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Pending requests keyed by zero-padded id.
	SendRequests,
	/// Pending requests keyed by (contract, inverted fee, id).
	PendingByContract,
	/// Ids consumed into a batch, mapped to the batch nonce.
	BatchedRequests,
	/// Assembled batches keyed by (contract, nonce).
	Batches,
	/// Singleton counters such as the last allocated request id.
	Counters,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::SendRequests => "send_requests",
			StorageKey::PendingByContract => "pending_by_contract",
			StorageKey::BatchedRequests => "batched_requests",
			StorageKey::Batches => "batches",
			StorageKey::Counters => "counters",
		}
	}
}
