//! In-memory custody ledger.
//!
//! Holds account balances, the bridge module account and per-denomination
//! supply in process memory. Assets and genesis balances come from the
//! implementation's configuration table.

use crate::{AssetMapping, AssetOrigin, CustodyLedger, LedgerError};
use async_trait::async_trait;
use bridge_types::{
	parse_eth_address, Address, Coin, ConfigSchema, Field, FieldType, Schema, ValidationError,
	U256,
};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Name under which the module account shows up in errors.
pub const MODULE_ACCOUNT: &str = "bridge-module";

#[derive(Debug, Default)]
struct LedgerState {
	/// (account, denom) -> balance
	balances: HashMap<(String, String), U256>,
	/// denom -> balance held by the module account
	module: HashMap<String, U256>,
	/// denom -> total supply
	supply: HashMap<String, U256>,
}

impl LedgerState {
	fn account_balance(&self, account: &str, denom: &str) -> U256 {
		self.balances
			.get(&(account.to_string(), denom.to_string()))
			.copied()
			.unwrap_or_default()
	}

	fn credit_account(&mut self, account: &str, coin: &Coin) -> Result<(), LedgerError> {
		let key = (account.to_string(), coin.denom.clone());
		let current = self.balances.get(&key).copied().unwrap_or_default();
		let updated = current
			.checked_add(coin.amount)
			.ok_or_else(|| LedgerError::Overflow(account.to_string()))?;
		self.balances.insert(key, updated);
		Ok(())
	}

	fn debit_account(&mut self, account: &str, coin: &Coin) -> Result<(), LedgerError> {
		let available = self.account_balance(account, &coin.denom);
		let remaining =
			available
				.checked_sub(coin.amount)
				.ok_or_else(|| LedgerError::InsufficientFunds {
					account: account.to_string(),
					needed: coin.clone(),
					available,
				})?;
		self.balances
			.insert((account.to_string(), coin.denom.clone()), remaining);
		Ok(())
	}

	fn debit_module(&mut self, coin: &Coin) -> Result<(), LedgerError> {
		let available = self.module.get(&coin.denom).copied().unwrap_or_default();
		let remaining =
			available
				.checked_sub(coin.amount)
				.ok_or_else(|| LedgerError::InsufficientFunds {
					account: MODULE_ACCOUNT.to_string(),
					needed: coin.clone(),
					available,
				})?;
		self.module.insert(coin.denom.clone(), remaining);
		Ok(())
	}

	fn increase_supply(&mut self, coin: &Coin) -> Result<(), LedgerError> {
		let supply = self.supply.get(&coin.denom).copied().unwrap_or_default();
		let supply = supply
			.checked_add(coin.amount)
			.ok_or_else(|| LedgerError::Overflow(coin.denom.clone()))?;
		self.supply.insert(coin.denom.clone(), supply);
		Ok(())
	}

	fn credit_module(&mut self, coin: &Coin) -> Result<(), LedgerError> {
		let current = self.module.get(&coin.denom).copied().unwrap_or_default();
		let updated = current
			.checked_add(coin.amount)
			.ok_or_else(|| LedgerError::Overflow(MODULE_ACCOUNT.to_string()))?;
		self.module.insert(coin.denom.clone(), updated);
		Ok(())
	}
}

/// Ledger kept entirely in memory.
///
/// Balances start from the configured genesis on every construction and are
/// lost when the process exits, even if the pool itself uses durable storage.
pub struct MemoryLedger {
	by_denom: HashMap<String, AssetMapping>,
	by_contract: HashMap<Address, AssetMapping>,
	state: Mutex<LedgerState>,
}

impl MemoryLedger {
	/// Creates a ledger that knows the given assets and holds no funds.
	pub fn new(assets: Vec<AssetMapping>) -> Self {
		let by_contract = assets
			.iter()
			.map(|asset| (asset.contract, asset.clone()))
			.collect();
		let by_denom = assets
			.into_iter()
			.map(|asset| (asset.denom.clone(), asset))
			.collect();

		Self {
			by_denom,
			by_contract,
			state: Mutex::new(LedgerState::default()),
		}
	}

	/// Credits `account` with newly issued funds, increasing supply.
	pub async fn fund(&self, account: &str, coin: &Coin) -> Result<(), LedgerError> {
		let mut state = self.state.lock().await;
		state.increase_supply(coin)?;
		state.credit_account(account, coin)
	}

	/// Balance held by the bridge module account.
	pub async fn module_balance(&self, denom: &str) -> U256 {
		let state = self.state.lock().await;
		state.module.get(denom).copied().unwrap_or_default()
	}

	/// Total supply of a denomination.
	pub async fn supply(&self, denom: &str) -> U256 {
		let state = self.state.lock().await;
		state.supply.get(denom).copied().unwrap_or_default()
	}
}

#[async_trait]
impl CustodyLedger for MemoryLedger {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryLedgerSchema)
	}

	async fn transfer_to_module(&self, account: &str, coin: &Coin) -> Result<(), LedgerError> {
		let mut state = self.state.lock().await;
		state.debit_account(account, coin)?;
		if let Err(e) = state.credit_module(coin) {
			// Put the debit back so the call has no effect.
			state.credit_account(account, coin)?;
			return Err(e);
		}
		Ok(())
	}

	async fn transfer_from_module(&self, account: &str, coin: &Coin) -> Result<(), LedgerError> {
		let mut state = self.state.lock().await;
		state.debit_module(coin)?;
		if let Err(e) = state.credit_account(account, coin) {
			state.credit_module(coin)?;
			return Err(e);
		}
		Ok(())
	}

	async fn mint(&self, coin: &Coin) -> Result<(), LedgerError> {
		let mut state = self.state.lock().await;
		state.increase_supply(coin)?;
		state.credit_module(coin)
	}

	async fn burn(&self, coin: &Coin) -> Result<(), LedgerError> {
		let mut state = self.state.lock().await;
		state.debit_module(coin)?;
		let supply = state.supply.get(&coin.denom).copied().unwrap_or_default();
		state
			.supply
			.insert(coin.denom.clone(), supply.saturating_sub(coin.amount));
		Ok(())
	}

	async fn lookup_asset(&self, denom: &str) -> Result<AssetMapping, LedgerError> {
		self.by_denom
			.get(denom)
			.cloned()
			.ok_or_else(|| LedgerError::UnknownAsset(denom.to_string()))
	}

	async fn lookup_contract(&self, contract: Address) -> Result<AssetMapping, LedgerError> {
		self.by_contract
			.get(&contract)
			.cloned()
			.ok_or(LedgerError::UnknownContract(contract))
	}

	async fn balance(&self, account: &str, denom: &str) -> Result<U256, LedgerError> {
		let state = self.state.lock().await;
		Ok(state.account_balance(account, denom))
	}
}

#[derive(Debug, Deserialize)]
struct AssetConfig {
	denom: String,
	contract: String,
	origin: AssetOrigin,
}

#[derive(Debug, Deserialize)]
struct BalanceConfig {
	account: String,
	denom: String,
	amount: String,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryLedgerConfig {
	#[serde(default)]
	assets: Vec<AssetConfig>,
	#[serde(default)]
	balances: Vec<BalanceConfig>,
}

fn check_contract(value: &toml::Value) -> Result<(), String> {
	let contract = value.as_str().unwrap_or_default();
	parse_eth_address(contract)
		.map(|_| ())
		.map_err(|e| e.to_string())
}

fn check_origin(value: &toml::Value) -> Result<(), String> {
	match value.as_str() {
		Some("native") | Some("foreign") => Ok(()),
		_ => Err("must be \"native\" or \"foreign\"".to_string()),
	}
}

fn check_amount(value: &toml::Value) -> Result<(), String> {
	let amount = value.as_str().unwrap_or_default();
	amount
		.parse::<U256>()
		.map(|_| ())
		.map_err(|e| format!("'{}' is not an amount: {}", amount, e))
}

/// Configuration schema for MemoryLedger.
///
/// ```toml
/// [[custody.implementations.memory.assets]]
/// denom = "uatom"
/// contract = "0x..."
/// origin = "native"
///
/// [[custody.implementations.memory.balances]]
/// account = "cosmos1..."
/// denom = "uatom"
/// amount = "1000000"
/// ```
pub struct MemoryLedgerSchema;

impl ConfigSchema for MemoryLedgerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let asset = Schema::new(vec![
			Field::required("denom", FieldType::String),
			Field::required("contract", FieldType::String).with_validator(check_contract),
			Field::required("origin", FieldType::String).with_validator(check_origin),
		]);
		let balance = Schema::new(vec![
			Field::required("account", FieldType::String),
			Field::required("denom", FieldType::String),
			Field::required("amount", FieldType::String).with_validator(check_amount),
		]);

		Schema::new(vec![
			Field::optional("assets", FieldType::Array(Box::new(FieldType::Table(asset)))),
			Field::optional(
				"balances",
				FieldType::Array(Box::new(FieldType::Table(balance))),
			),
		])
		.validate(config)
	}
}

fn build_ledger(config: &toml::Value) -> Result<MemoryLedger, LedgerError> {
	MemoryLedgerSchema
		.validate(config)
		.map_err(|e| LedgerError::Configuration(e.to_string()))?;

	let parsed: MemoryLedgerConfig = config
		.clone()
		.try_into()
		.map_err(|e| LedgerError::Configuration(e.to_string()))?;

	let mut assets = Vec::with_capacity(parsed.assets.len());
	for asset in parsed.assets {
		let contract = parse_eth_address(&asset.contract)
			.map_err(|e| LedgerError::Configuration(e.to_string()))?;
		if assets
			.iter()
			.any(|known: &AssetMapping| known.denom == asset.denom || known.contract == contract)
		{
			return Err(LedgerError::Configuration(format!(
				"Asset '{}' is mapped more than once",
				asset.denom
			)));
		}
		assets.push(AssetMapping {
			denom: asset.denom,
			contract,
			origin: asset.origin,
		});
	}

	let mut ledger = MemoryLedger::new(assets);
	let state = ledger.state.get_mut();
	for balance in parsed.balances {
		let amount = balance
			.amount
			.parse::<U256>()
			.map_err(|e| LedgerError::Configuration(e.to_string()))?;
		let coin = Coin::new(balance.denom, amount);
		state.increase_supply(&coin)?;
		state.credit_account(&balance.account, &coin)?;
	}

	tracing::debug!(
		assets = ledger.by_denom.len(),
		"Initialized memory custody ledger"
	);
	Ok(ledger)
}

/// Factory function to create a memory ledger from configuration.
pub fn create_ledger(config: &toml::Value) -> Result<Box<dyn CustodyLedger>, LedgerError> {
	Ok(Box::new(build_ledger(config)?))
}

/// Registry for the memory ledger implementation.
pub struct Registry;

impl bridge_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::LedgerFactory;

	fn factory() -> Self::Factory {
		create_ledger
	}
}

impl crate::LedgerRegistry for Registry {}
