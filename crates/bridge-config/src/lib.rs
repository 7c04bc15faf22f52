//! Configuration module for the bridge service.
//!
//! Configuration is a TOML document with `${VAR}` and `${VAR:-default}`
//! environment references resolved before parsing. Storage and custody follow
//! the pluggable layout used throughout the workspace: a `primary` name plus an
//! `implementations` table whose entries are handed unparsed to the matching
//! factory.
//!
//! A file may pull in others with `include = ["a.toml", "b.toml"]`; every
//! top-level section must then be defined in exactly one file.

mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Largest accepted chain identifier, in bytes.
pub const MAX_CHAIN_IDENTIFIER_LEN: usize = 32;
/// Upper bound for `batch.max_entries`.
pub const MAX_BATCH_ENTRIES: usize = 1000;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The full error embeds the whole input; keep only the message.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration of the bridge service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of the bridge deployment.
	pub bridge: BridgeConfig,
	/// Backend holding pool state.
	pub storage: StorageConfig,
	/// Ledger the pool escrows funds through.
	pub custody: CustodyConfig,
	/// Batch assembly limits.
	#[serde(default)]
	pub batch: BatchConfig,
}

/// Identity of the bridge deployment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
	/// Identifier shared with the destination contract and mixed into every
	/// checkpoint.
	pub chain_identifier: String,
	/// Bech32 prefix of source-chain accounts, e.g. `cosmos`.
	pub account_prefix: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the custody ledger.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustodyConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of ledger implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Batch assembly limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
	/// Maximum number of requests per batch.
	#[serde(default = "default_max_entries")]
	pub max_entries: usize,
	/// Destination-chain timeout written into new batches.
	#[serde(default = "default_batch_timeout")]
	pub timeout: u64,
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self {
			max_entries: default_max_entries(),
			timeout: default_batch_timeout(),
		}
	}
}

fn default_max_entries() -> usize {
	100
}

fn default_batch_timeout() -> u64 {
	43_200
}

/// Replaces `${VAR}` and `${VAR:-default}` with values from the environment.
///
/// A reference without a default whose variable is unset is an error.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut output = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(name.as_str()), cap.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					name.as_str()
				)))
			},
		};
		output.push_str(&input[last..whole.start()]);
		output.push_str(&value);
		last = whole.end();
	}
	output.push_str(&input[last..]);

	Ok(output)
}

fn check_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path.file_name().ok_or_else(|| {
			ConfigError::Validation(format!("Invalid path: {}", path.display()))
		})?;

		loader::ConfigLoader::new(base_dir)
			.load_config(file_name)
			.await
	}

	fn validate(&self) -> Result<(), ConfigError> {
		let identifier = &self.bridge.chain_identifier;
		if identifier.is_empty() {
			return Err(ConfigError::Validation(
				"Chain identifier cannot be empty".into(),
			));
		}
		if identifier.len() > MAX_CHAIN_IDENTIFIER_LEN {
			return Err(ConfigError::Validation(format!(
				"Chain identifier is {} bytes, at most {} are allowed",
				identifier.len(),
				MAX_CHAIN_IDENTIFIER_LEN
			)));
		}

		let prefix = &self.bridge.account_prefix;
		if prefix.is_empty() {
			return Err(ConfigError::Validation(
				"Account prefix cannot be empty".into(),
			));
		}
		if !prefix
			.chars()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
		{
			return Err(ConfigError::Validation(format!(
				"Account prefix '{}' must be lowercase alphanumeric",
				prefix
			)));
		}

		check_primary(
			"storage",
			&self.storage.primary,
			&self.storage.implementations,
		)?;
		check_primary(
			"custody",
			&self.custody.primary,
			&self.custody.implementations,
		)?;

		if !(1..=MAX_BATCH_ENTRIES).contains(&self.batch.max_entries) {
			return Err(ConfigError::Validation(format!(
				"batch.max_entries must be between 1 and {}",
				MAX_BATCH_ENTRIES
			)));
		}

		Ok(())
	}
}

/// Parses a configuration string, resolving environment references and
/// validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) const BASE_CONFIG: &str = r#"
[bridge]
chain_identifier = "testchain"
account_prefix = "cosmos"

[storage]
primary = "memory"
[storage.implementations.memory]

[custody]
primary = "memory"
[custody.implementations.memory]
"#;

	fn with_override(section: &str, replacement: &str) -> String {
		BASE_CONFIG.replace(section, replacement)
	}

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("BRIDGE_TEST_HOST", "localhost");
		std::env::set_var("BRIDGE_TEST_PORT", "5432");

		let result = resolve_env_vars("host = \"${BRIDGE_TEST_HOST}:${BRIDGE_TEST_PORT}\"").unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("BRIDGE_TEST_HOST");
		std::env::remove_var("BRIDGE_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let result = resolve_env_vars("value = \"${BRIDGE_UNSET_VAR:-fallback}\"").unwrap();
		assert_eq!(result, "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${BRIDGE_UNSET_VAR}\"");
		assert!(result.unwrap_err().to_string().contains("BRIDGE_UNSET_VAR"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = BASE_CONFIG.parse().unwrap();
		assert_eq!(config.bridge.chain_identifier, "testchain");
		assert_eq!(config.batch.max_entries, 100);
		assert_eq!(config.batch.timeout, 43_200);
		assert!(config.storage.implementations.contains_key("memory"));
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("BRIDGE_TEST_CHAIN", "gravity-bridge-3");
		let config: Config = with_override(
			"chain_identifier = \"testchain\"",
			"chain_identifier = \"${BRIDGE_TEST_CHAIN}\"",
		)
		.parse()
		.unwrap();
		assert_eq!(config.bridge.chain_identifier, "gravity-bridge-3");
		std::env::remove_var("BRIDGE_TEST_CHAIN");
	}

	#[test]
	fn test_chain_identifier_limits() {
		let exact = format!("chain_identifier = \"{}\"", "a".repeat(32));
		assert!(with_override("chain_identifier = \"testchain\"", &exact)
			.parse::<Config>()
			.is_ok());

		let long = format!("chain_identifier = \"{}\"", "a".repeat(33));
		let err = with_override("chain_identifier = \"testchain\"", &long)
			.parse::<Config>()
			.unwrap_err();
		assert!(err.to_string().contains("33 bytes"));

		assert!(with_override("chain_identifier = \"testchain\"", "chain_identifier = \"\"")
			.parse::<Config>()
			.is_err());
	}

	#[test]
	fn test_account_prefix_must_be_lowercase() {
		let err = with_override("account_prefix = \"cosmos\"", "account_prefix = \"Cosmos\"")
			.parse::<Config>()
			.unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_primary_must_be_configured() {
		let err = with_override(
			"[custody]\nprimary = \"memory\"",
			"[custody]\nprimary = \"chain\"",
		)
		.parse::<Config>()
		.unwrap_err();
		assert!(err.to_string().contains("Primary custody 'chain'"));
	}

	#[test]
	fn test_batch_bounds() {
		for (max_entries, ok) in [(0, false), (1, true), (1000, true), (1001, false)] {
			let config = format!("{}\n[batch]\nmax_entries = {}\n", BASE_CONFIG, max_entries);
			assert_eq!(config.parse::<Config>().is_ok(), ok, "max_entries = {}", max_entries);
		}
	}

	#[test]
	fn test_missing_section() {
		let config = BASE_CONFIG.replace("[bridge]", "[other]");
		assert!(matches!(
			config.parse::<Config>(),
			Err(ConfigError::Parse(_))
		));
	}
}
