//! Checkpoint codec for outgoing artifacts.
//!
//! A checkpoint is the Keccak-256 digest signers attest to. The destination
//! contract recomputes it with `abi.encode(...)` over the same tuple, so the
//! layout here must match it byte for byte: one divergent byte invalidates
//! every signature.
//!
//! The tuple is produced by ABI-encoding a synthetic function call and then
//! dropping its 4-byte selector. The function names are arbitrary but fixed;
//! only the argument layout matters.

use alloy_primitives::{keccak256, B256, U256};
use alloy_sol_types::{sol, SolCall};
use bridge_types::{
	ArtifactKind, BatchArtifact, CallArtifact, OutgoingArtifact, SignerSetArtifact,
};
use thiserror::Error;

sol! {
	/// Argument layout of a batch checkpoint.
	function submitBatch(
		bytes32 chainIdentifier,
		bytes32 methodName,
		uint256[] amounts,
		address[] destinations,
		uint256[] fees,
		uint256 batchNonce,
		address tokenContract,
		uint256 batchTimeout
	);

	/// Argument layout of a generic call checkpoint.
	function logicCall(
		bytes32 chainIdentifier,
		bytes32 methodName,
		uint256[] transferAmounts,
		address[] transferTokenContracts,
		uint256[] feeAmounts,
		address[] feeTokenContracts,
		address logicContract,
		bytes payload,
		uint256 callTimeout,
		bytes32 invalidationId,
		uint256 invalidationNonce
	);

	/// Argument layout of a signer set checkpoint.
	function updateSignerSet(
		bytes32 chainIdentifier,
		bytes32 methodName,
		uint256 signerSetNonce,
		address[] signers,
		uint256[] powers
	);
}

/// Length of the function selector prepended by call encoding.
const SELECTOR_LEN: usize = 4;

/// Width of the fixed `bytes32` fields.
const FIXED_FIELD_LEN: usize = 32;

/// Errors that can occur while computing a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
	/// The chain identifier does not fit the fixed 32-byte field.
	#[error("Chain identifier is {length} bytes, at most 32 are allowed")]
	IdentifierTooLong { length: usize },
}

/// Returns the domain tag mixed into every checkpoint of `kind`.
///
/// The tags keep a signature over one artifact kind from verifying as another.
pub fn domain_tag(kind: ArtifactKind) -> B256 {
	let tag: &[u8] = match kind {
		ArtifactKind::Batch => b"transactionBatch",
		ArtifactKind::Call => b"logicCall",
		ArtifactKind::SignerSet => b"checkpoint",
	};
	right_pad(tag)
}

/// Encodes the chain identifier into its fixed 32-byte field.
///
/// The identifier is UTF-8 encoded and right-padded with zeros. Longer
/// identifiers are rejected rather than truncated.
pub fn fixed_identifier(chain_identifier: &str) -> Result<B256, EncodingError> {
	let bytes = chain_identifier.as_bytes();
	if bytes.len() > FIXED_FIELD_LEN {
		return Err(EncodingError::IdentifierTooLong {
			length: bytes.len(),
		});
	}
	Ok(right_pad(bytes))
}

fn right_pad(bytes: &[u8]) -> B256 {
	let mut word = [0u8; FIXED_FIELD_LEN];
	word[..bytes.len()].copy_from_slice(bytes);
	B256::from(word)
}

/// Computes the checkpoint of an outgoing artifact.
///
/// The digest depends on every field and on the order of every array; empty
/// arrays are valid. The only failure is an oversized chain identifier.
pub fn compute_checkpoint(
	artifact: &OutgoingArtifact,
	chain_identifier: &str,
) -> Result<B256, EncodingError> {
	let chain_id = fixed_identifier(chain_identifier)?;
	let tag = domain_tag(artifact.kind());

	let encoded = match artifact {
		OutgoingArtifact::Batch(batch) => encode_batch(batch, chain_id, tag),
		OutgoingArtifact::Call(call) => encode_call(call, chain_id, tag),
		OutgoingArtifact::SignerSet(set) => encode_signer_set(set, chain_id, tag),
	};
	let checkpoint = keccak256(&encoded[SELECTOR_LEN..]);

	tracing::debug!(
		kind = %artifact.kind(),
		%checkpoint,
		"Computed checkpoint"
	);
	Ok(checkpoint)
}

/// Computes the checkpoints of many artifacts under one chain identifier.
///
/// Each result is independent: one failure does not affect the others.
pub fn checkpoint_all<'a, I>(
	artifacts: I,
	chain_identifier: &str,
) -> Vec<Result<B256, EncodingError>>
where
	I: IntoIterator<Item = &'a OutgoingArtifact>,
{
	artifacts
		.into_iter()
		.map(|artifact| compute_checkpoint(artifact, chain_identifier))
		.collect()
}

fn encode_batch(batch: &BatchArtifact, chain_id: B256, tag: B256) -> Vec<u8> {
	let call = submitBatchCall {
		chainIdentifier: chain_id,
		methodName: tag,
		amounts: batch.entries.iter().map(|e| e.value.amount()).collect(),
		destinations: batch.entries.iter().map(|e| e.recipient).collect(),
		fees: batch.entries.iter().map(|e| e.fee.amount()).collect(),
		batchNonce: U256::from(batch.nonce),
		tokenContract: batch.token_contract,
		batchTimeout: U256::from(batch.timeout),
	};
	call.abi_encode()
}

fn encode_call(call: &CallArtifact, chain_id: B256, tag: B256) -> Vec<u8> {
	let encoded = logicCallCall {
		chainIdentifier: chain_id,
		methodName: tag,
		transferAmounts: call.transfers.iter().map(|t| t.amount()).collect(),
		transferTokenContracts: call.transfers.iter().map(|t| t.contract_address()).collect(),
		feeAmounts: call.fees.iter().map(|f| f.amount()).collect(),
		feeTokenContracts: call.fees.iter().map(|f| f.contract_address()).collect(),
		logicContract: call.target_contract,
		payload: call.payload.clone(),
		callTimeout: U256::from(call.timeout),
		invalidationId: call.invalidation_id,
		invalidationNonce: U256::from(call.invalidation_nonce),
	};
	encoded.abi_encode()
}

fn encode_signer_set(set: &SignerSetArtifact, chain_id: B256, tag: B256) -> Vec<u8> {
	let call = updateSignerSetCall {
		chainIdentifier: chain_id,
		methodName: tag,
		signerSetNonce: U256::from(set.nonce),
		signers: set.members.iter().map(|m| m.ethereum_address).collect(),
		powers: set.members.iter().map(|m| U256::from(m.power)).collect(),
	};
	call.abi_encode()
}
