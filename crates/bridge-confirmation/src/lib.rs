//! Confirmation records and their validation.
//!
//! An orchestrator attests to a checkpoint by submitting a confirmation: the
//! destination-chain address it signs with and its signature over the digest.
//! This crate checks that a record is well-formed before anything downstream
//! trusts it. Validation is stateless, so records can be checked concurrently
//! and in any order.

use alloy_primitives::hex;
use bridge_types::{parse_account_address, parse_eth_address, AddressError, ArtifactKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reasons a confirmation record is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmationError {
	/// The orchestrator is not a valid source-chain account.
	#[error("Invalid orchestrator address '{address}': {reason}")]
	InvalidSourceAddress {
		address: String,
		reason: AddressError,
	},
	/// A destination-chain address field is malformed.
	#[error("Invalid {field} '{address}': {reason}")]
	InvalidDestinationAddress {
		field: &'static str,
		address: String,
		reason: AddressError,
	},
	/// The signature is not hex.
	#[error("Could not decode signature: {0}")]
	InvalidSignatureEncoding(String),
	/// The invalidation id of a call confirmation is not hex.
	#[error("Could not decode invalidation id: {0}")]
	InvalidInvalidationId(String),
}

/// Confirmation of a transfer batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfirmation {
	pub nonce: u64,
	pub token_contract: String,
	pub orchestrator_address: String,
	pub eth_signer: String,
	pub signature: String,
}

/// Confirmation of a generic outgoing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallConfirmation {
	pub invalidation_id: String,
	pub invalidation_nonce: u64,
	pub orchestrator_address: String,
	pub eth_signer: String,
	pub signature: String,
}

/// Confirmation of a signer set update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSetConfirmation {
	pub nonce: u64,
	pub orchestrator_address: String,
	pub eth_signer: String,
	pub signature: String,
}

/// A signed attestation over one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfirmationRecord {
	Batch(BatchConfirmation),
	Call(CallConfirmation),
	SignerSet(SignerSetConfirmation),
}

/// Discriminant of [`ConfirmationRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationKind {
	Batch,
	Call,
	SignerSet,
}

impl ConfirmationKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ConfirmationKind::Batch => "batch",
			ConfirmationKind::Call => "call",
			ConfirmationKind::SignerSet => "signer_set",
		}
	}
}

impl fmt::Display for ConfirmationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The artifact kind a confirmation attests to.
impl From<ConfirmationKind> for ArtifactKind {
	fn from(kind: ConfirmationKind) -> Self {
		match kind {
			ConfirmationKind::Batch => ArtifactKind::Batch,
			ConfirmationKind::Call => ArtifactKind::Call,
			ConfirmationKind::SignerSet => ArtifactKind::SignerSet,
		}
	}
}

impl ConfirmationRecord {
	pub fn kind(&self) -> ConfirmationKind {
		match self {
			ConfirmationRecord::Batch(_) => ConfirmationKind::Batch,
			ConfirmationRecord::Call(_) => ConfirmationKind::Call,
			ConfirmationRecord::SignerSet(_) => ConfirmationKind::SignerSet,
		}
	}

	pub fn orchestrator_address(&self) -> &str {
		match self {
			ConfirmationRecord::Batch(c) => &c.orchestrator_address,
			ConfirmationRecord::Call(c) => &c.orchestrator_address,
			ConfirmationRecord::SignerSet(c) => &c.orchestrator_address,
		}
	}

	pub fn eth_signer(&self) -> &str {
		match self {
			ConfirmationRecord::Batch(c) => &c.eth_signer,
			ConfirmationRecord::Call(c) => &c.eth_signer,
			ConfirmationRecord::SignerSet(c) => &c.eth_signer,
		}
	}

	pub fn signature(&self) -> &str {
		match self {
			ConfirmationRecord::Batch(c) => &c.signature,
			ConfirmationRecord::Call(c) => &c.signature,
			ConfirmationRecord::SignerSet(c) => &c.signature,
		}
	}

	/// Nonce of the confirmed batch or signer set; `None` for calls.
	pub fn nonce(&self) -> Option<u64> {
		match self {
			ConfirmationRecord::Batch(c) => Some(c.nonce),
			ConfirmationRecord::SignerSet(c) => Some(c.nonce),
			ConfirmationRecord::Call(_) => None,
		}
	}

	/// Token contract of the confirmed batch; `None` for other kinds.
	pub fn token_contract(&self) -> Option<&str> {
		match self {
			ConfirmationRecord::Batch(c) => Some(&c.token_contract),
			_ => None,
		}
	}

	/// Invalidation scope of the confirmed call; `None` for other kinds.
	pub fn invalidation_id(&self) -> Option<&str> {
		match self {
			ConfirmationRecord::Call(c) => Some(&c.invalidation_id),
			_ => None,
		}
	}

	/// Invalidation nonce of the confirmed call; `None` for other kinds.
	pub fn invalidation_nonce(&self) -> Option<u64> {
		match self {
			ConfirmationRecord::Call(c) => Some(c.invalidation_nonce),
			_ => None,
		}
	}

	/// Performs the stateless checks for this record.
	///
	/// `account_prefix` is the bech32 prefix of source-chain accounts.
	pub fn validate(&self, account_prefix: &str) -> Result<(), ConfirmationError> {
		let orchestrator = self.orchestrator_address();
		parse_account_address(orchestrator, account_prefix).map_err(|reason| {
			ConfirmationError::InvalidSourceAddress {
				address: orchestrator.to_string(),
				reason,
			}
		})?;

		check_eth_address("eth signer", self.eth_signer())?;
		if let Some(token_contract) = self.token_contract() {
			check_eth_address("token contract", token_contract)?;
		}

		let signature = self.signature();
		match hex::decode(signature) {
			Ok(bytes) if !bytes.is_empty() => {},
			Ok(_) => {
				return Err(ConfirmationError::InvalidSignatureEncoding(
					"signature is empty".to_string(),
				))
			},
			Err(e) => {
				return Err(ConfirmationError::InvalidSignatureEncoding(format!(
					"{}: {}",
					signature, e
				)))
			},
		}

		if let Some(invalidation_id) = self.invalidation_id() {
			hex::decode(invalidation_id).map_err(|e| {
				ConfirmationError::InvalidInvalidationId(format!("{}: {}", invalidation_id, e))
			})?;
		}

		Ok(())
	}
}

fn check_eth_address(field: &'static str, address: &str) -> Result<(), ConfirmationError> {
	parse_eth_address(address)
		.map(|_| ())
		.map_err(|reason| ConfirmationError::InvalidDestinationAddress {
			field,
			address: address.to_string(),
			reason,
		})
}

/// Validates confirmation records for one source chain.
#[derive(Debug, Clone)]
pub struct ConfirmationValidator {
	account_prefix: String,
}

impl ConfirmationValidator {
	/// Creates a validator for accounts carrying the given bech32 prefix.
	pub fn new(account_prefix: impl Into<String>) -> Self {
		Self {
			account_prefix: account_prefix.into(),
		}
	}

	pub fn account_prefix(&self) -> &str {
		&self.account_prefix
	}

	/// Validates a single record.
	pub fn validate(&self, record: &ConfirmationRecord) -> Result<(), ConfirmationError> {
		let result = record.validate(&self.account_prefix);
		if let Err(e) = &result {
			tracing::debug!(
				kind = %record.kind(),
				orchestrator = record.orchestrator_address(),
				error = %e,
				"Rejected confirmation"
			);
		}
		result
	}

	/// Validates every record independently, preserving input order.
	pub fn validate_all<'a, I>(&self, records: I) -> Vec<Result<(), ConfirmationError>>
	where
		I: IntoIterator<Item = &'a ConfirmationRecord>,
	{
		records
			.into_iter()
			.map(|record| self.validate(record))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const ORCHESTRATOR: &str = "cosmos1qyqszqgpqyqszqgpqyqszqgpqyqszqgpjnp7du";
	const SIGNER: &str = "0x9FC9C2DfBA3b6cF204C37a5F690619772b926e39";
	const TOKEN: &str = "0xcccccccccccccccccccccccccccccccccccccc02";

	fn signature() -> String {
		"ab".repeat(65)
	}

	fn batch_confirmation() -> ConfirmationRecord {
		ConfirmationRecord::Batch(BatchConfirmation {
			nonce: 7,
			token_contract: TOKEN.to_string(),
			orchestrator_address: ORCHESTRATOR.to_string(),
			eth_signer: SIGNER.to_string(),
			signature: signature(),
		})
	}

	fn call_confirmation(invalidation_id: &str) -> ConfirmationRecord {
		ConfirmationRecord::Call(CallConfirmation {
			invalidation_id: invalidation_id.to_string(),
			invalidation_nonce: 0,
			orchestrator_address: ORCHESTRATOR.to_string(),
			eth_signer: SIGNER.to_string(),
			signature: signature(),
		})
	}

	fn signer_set_confirmation(nonce: u64) -> ConfirmationRecord {
		ConfirmationRecord::SignerSet(SignerSetConfirmation {
			nonce,
			orchestrator_address: ORCHESTRATOR.to_string(),
			eth_signer: SIGNER.to_string(),
			signature: format!("0x{}", signature()),
		})
	}

	#[test]
	fn test_well_formed_records_pass() {
		let validator = ConfirmationValidator::new("cosmos");
		assert_eq!(validator.validate(&batch_confirmation()), Ok(()));
		assert_eq!(
			validator.validate(&call_confirmation("696e76616c69646174696f6e4964")),
			Ok(())
		);
		assert_eq!(validator.validate(&signer_set_confirmation(0)), Ok(()));
	}

	#[test]
	fn test_non_hex_signature_rejected() {
		let mut record = batch_confirmation();
		if let ConfirmationRecord::Batch(c) = &mut record {
			c.signature = "not-hex".to_string();
		}

		let result = ConfirmationValidator::new("cosmos").validate(&record);
		assert!(matches!(
			result,
			Err(ConfirmationError::InvalidSignatureEncoding(_))
		));
	}

	#[test]
	fn test_empty_signature_rejected() {
		let mut record = signer_set_confirmation(1);
		if let ConfirmationRecord::SignerSet(c) = &mut record {
			c.signature = String::new();
		}

		assert!(matches!(
			record.validate("cosmos"),
			Err(ConfirmationError::InvalidSignatureEncoding(_))
		));
	}

	#[test]
	fn test_orchestrator_must_match_prefix() {
		let result = ConfirmationValidator::new("osmo").validate(&batch_confirmation());
		match result {
			Err(ConfirmationError::InvalidSourceAddress { address, reason }) => {
				assert_eq!(address, ORCHESTRATOR);
				assert!(matches!(reason, AddressError::WrongPrefix { .. }));
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn test_bad_signer_rejected() {
		let mut record = call_confirmation("00");
		if let ConfirmationRecord::Call(c) = &mut record {
			c.eth_signer = "0x1234".to_string();
		}

		assert!(matches!(
			record.validate("cosmos"),
			Err(ConfirmationError::InvalidDestinationAddress {
				field: "eth signer",
				..
			})
		));
	}

	#[test]
	fn test_bad_token_contract_rejected() {
		let mut record = batch_confirmation();
		if let ConfirmationRecord::Batch(c) = &mut record {
			c.token_contract = "cccccccccccccccccccccccccccccccccccccc02".to_string();
		}

		assert!(matches!(
			record.validate("cosmos"),
			Err(ConfirmationError::InvalidDestinationAddress {
				field: "token contract",
				reason: AddressError::MissingPrefix,
				..
			})
		));
	}

	#[test]
	fn test_bad_invalidation_id_rejected() {
		let record = call_confirmation("xyz");
		assert!(matches!(
			record.validate("cosmos"),
			Err(ConfirmationError::InvalidInvalidationId(_))
		));
	}

	#[test]
	fn test_accessors_mark_inapplicable_fields() {
		let batch = batch_confirmation();
		assert_eq!(batch.kind(), ConfirmationKind::Batch);
		assert_eq!(batch.nonce(), Some(7));
		assert_eq!(batch.token_contract(), Some(TOKEN));
		assert_eq!(batch.invalidation_id(), None);
		assert_eq!(batch.invalidation_nonce(), None);

		let call = call_confirmation("00");
		assert_eq!(call.kind(), ConfirmationKind::Call);
		assert_eq!(call.nonce(), None);
		assert_eq!(call.invalidation_id(), Some("00"));
		assert_eq!(call.invalidation_nonce(), Some(0));

		// A real nonce of zero stays distinguishable from "not applicable".
		let signer_set = signer_set_confirmation(0);
		assert_eq!(signer_set.nonce(), Some(0));
		assert_eq!(signer_set.token_contract(), None);
		assert_eq!(signer_set.invalidation_nonce(), None);
	}

	#[test]
	fn test_validate_all_isolates_failures() {
		let mut broken = batch_confirmation();
		if let ConfirmationRecord::Batch(c) = &mut broken {
			c.signature = "zz".to_string();
		}
		let records = vec![batch_confirmation(), broken, signer_set_confirmation(2)];

		let results = ConfirmationValidator::new("cosmos").validate_all(&records);
		assert!(results[0].is_ok());
		assert!(matches!(
			results[1],
			Err(ConfirmationError::InvalidSignatureEncoding(_))
		));
		assert!(results[2].is_ok());
	}

	#[test]
	fn test_parallel_validation() {
		let validator = ConfirmationValidator::new("cosmos");
		let records: Vec<_> = (0..8).map(signer_set_confirmation).collect();

		std::thread::scope(|scope| {
			let handles: Vec<_> = records
				.iter()
				.map(|record| scope.spawn(|| validator.validate(record)))
				.collect();
			for handle in handles {
				assert_eq!(handle.join().unwrap(), Ok(()));
			}
		});
	}

	#[test]
	fn test_record_json_format() {
		let json = serde_json::json!({
			"type": "call",
			"invalidation_id": "0x00",
			"invalidation_nonce": 4,
			"orchestrator_address": ORCHESTRATOR,
			"eth_signer": SIGNER,
			"signature": signature(),
		});

		let record: ConfirmationRecord = serde_json::from_value(json).unwrap();
		assert_eq!(record.kind(), ConfirmationKind::Call);
		assert_eq!(record.invalidation_nonce(), Some(4));
		assert_eq!(ArtifactKind::from(record.kind()), ArtifactKind::Call);
		assert!(record.validate("cosmos").is_ok());
	}
}
