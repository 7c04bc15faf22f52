//! Outgoing artifacts.
//!
//! An artifact is the unit that signers attest to and the destination-chain
//! contract executes. All kinds are gathered in [`OutgoingArtifact`] so a
//! single encoder can select the schema and domain tag per variant.

use crate::{SendRequest, TokenValue};
use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A batch of simple transfers for a single token contract.
///
/// The entry order is the assembly order and is significant for the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchArtifact {
	/// Destination contract every entry is denominated in.
	pub token_contract: Address,
	/// Strictly increasing per token contract.
	pub nonce: u64,
	/// Destination-chain height after which the batch can no longer execute.
	pub timeout: u64,
	pub entries: Vec<SendRequest>,
}

/// A generic outgoing call to an arbitrary destination-chain contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallArtifact {
	/// Tokens sent to the target contract before the call.
	pub transfers: Vec<TokenValue>,
	/// Tokens paid to the relayer.
	pub fees: Vec<TokenValue>,
	pub target_contract: Address,
	/// Opaque calldata forwarded to the target.
	pub payload: Bytes,
	pub timeout: u64,
	/// Scope under which a later call supersedes an unexecuted earlier one.
	pub invalidation_id: B256,
	/// Ordering within the invalidation scope.
	pub invalidation_nonce: u64,
}

/// A signer and its voting power inside a signer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSetMember {
	pub ethereum_address: Address,
	pub power: u64,
}

/// A snapshot of the signer set the destination contract should trust.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSetArtifact {
	pub nonce: u64,
	pub members: Vec<SignerSetMember>,
}

/// Every artifact kind that can be checkpointed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutgoingArtifact {
	Batch(BatchArtifact),
	Call(CallArtifact),
	SignerSet(SignerSetArtifact),
}

impl OutgoingArtifact {
	pub fn kind(&self) -> ArtifactKind {
		match self {
			OutgoingArtifact::Batch(_) => ArtifactKind::Batch,
			OutgoingArtifact::Call(_) => ArtifactKind::Call,
			OutgoingArtifact::SignerSet(_) => ArtifactKind::SignerSet,
		}
	}
}

impl From<BatchArtifact> for OutgoingArtifact {
	fn from(batch: BatchArtifact) -> Self {
		OutgoingArtifact::Batch(batch)
	}
}

impl From<CallArtifact> for OutgoingArtifact {
	fn from(call: CallArtifact) -> Self {
		OutgoingArtifact::Call(call)
	}
}

impl From<SignerSetArtifact> for OutgoingArtifact {
	fn from(set: SignerSetArtifact) -> Self {
		OutgoingArtifact::SignerSet(set)
	}
}

/// Discriminant of [`OutgoingArtifact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
	Batch,
	Call,
	SignerSet,
}

impl ArtifactKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ArtifactKind::Batch => "batch",
			ArtifactKind::Call => "call",
			ArtifactKind::SignerSet => "signer_set",
		}
	}
}

impl fmt::Display for ArtifactKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_artifact_json_is_tagged() {
		let artifact = OutgoingArtifact::from(SignerSetArtifact {
			nonce: 3,
			members: vec![SignerSetMember {
				ethereum_address: address!("c783df8a850f42e7f7e57013759c285caa701eb6"),
				power: 6667,
			}],
		});

		let json = serde_json::to_value(&artifact).unwrap();
		assert_eq!(json["kind"], "signer_set");
		assert_eq!(json["nonce"], 3);

		let decoded: OutgoingArtifact = serde_json::from_value(json).unwrap();
		assert_eq!(decoded.kind(), ArtifactKind::SignerSet);
		assert_eq!(decoded, artifact);
	}

	#[test]
	fn test_kind_names() {
		assert_eq!(ArtifactKind::Batch.to_string(), "batch");
		assert_eq!(ArtifactKind::Call.as_str(), "call");
		assert_eq!(ArtifactKind::SignerSet.as_str(), "signer_set");
	}
}
