//! Address parsing for both sides of the bridge.
//!
//! Destination-chain addresses are 20-byte hex strings with an optional EIP-55
//! checksum. Source-chain accounts are bech32 strings carrying a
//! chain-specific human readable prefix.

use crate::utils::without_0x_prefix;
use alloy_primitives::Address;
use thiserror::Error;

/// Errors produced while parsing an address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
	#[error("Address is empty")]
	Empty,
	#[error("Missing 0x prefix")]
	MissingPrefix,
	#[error("Expected 40 hex characters, got {0}")]
	InvalidLength(usize),
	#[error("Invalid hex: {0}")]
	InvalidHex(String),
	#[error("Checksum mismatch, expected {0}")]
	BadChecksum(String),
	#[error("Invalid bech32 encoding: {0}")]
	InvalidBech32(String),
	#[error("Unexpected prefix '{found}', expected '{expected}'")]
	WrongPrefix { expected: String, found: String },
	#[error("Account must be 20 or 32 bytes, got {0}")]
	InvalidAccountLength(usize),
}

/// Parses a `0x`-prefixed destination-chain address.
///
/// All-lowercase and all-uppercase forms are accepted as they carry no checksum.
/// A mixed-case address must match its EIP-55 checksum exactly.
pub fn parse_eth_address(input: &str) -> Result<Address, AddressError> {
	if input.is_empty() {
		return Err(AddressError::Empty);
	}
	let body = input
		.strip_prefix("0x")
		.ok_or(AddressError::MissingPrefix)?;
	if body.len() != 40 {
		return Err(AddressError::InvalidLength(body.len()));
	}

	let address = body
		.parse::<Address>()
		.map_err(|e| AddressError::InvalidHex(e.to_string()))?;

	let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
	let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
	if has_upper && has_lower {
		let expected = address.to_checksum(None);
		if without_0x_prefix(&expected) != body {
			return Err(AddressError::BadChecksum(expected));
		}
	}

	Ok(address)
}

/// Decodes a bech32 source-chain account and returns its raw bytes.
///
/// The human readable part must equal `prefix` (case-insensitive, as bech32
/// forbids mixed case anyway).
pub fn parse_account_address(input: &str, prefix: &str) -> Result<Vec<u8>, AddressError> {
	if input.is_empty() {
		return Err(AddressError::Empty);
	}
	let (hrp, data) =
		bech32::decode(input).map_err(|e| AddressError::InvalidBech32(e.to_string()))?;

	let found = hrp.as_str().to_ascii_lowercase();
	if found != prefix {
		return Err(AddressError::WrongPrefix {
			expected: prefix.to_string(),
			found,
		});
	}
	if data.len() != 20 && data.len() != 32 {
		return Err(AddressError::InvalidAccountLength(data.len()));
	}

	Ok(data)
}
