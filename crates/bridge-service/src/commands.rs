//! Subcommands of the `bridge` binary.

use crate::factory_registry::{initialize_registry, FactoryError};
use bridge_checkpoint::{checkpoint_all, compute_checkpoint, EncodingError};
use bridge_config::Config;
use bridge_confirmation::{ConfirmationError, ConfirmationRecord, ConfirmationValidator};
use bridge_custody::CustodyLedger;
use bridge_pool::{EventBus, IdAllocator, OutgoingPool, PoolError};
use bridge_storage::StorageService;
use bridge_types::{parse_eth_address, Address, Coin, OutgoingArtifact, U256};
use clap::Subcommand;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum CommandError {
	#[error("Failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("Malformed JSON: {0}")]
	Json(#[from] serde_json::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error(transparent)]
	Factory(#[from] FactoryError),
	#[error(transparent)]
	Pool(#[from] PoolError),
	#[error(transparent)]
	Encoding(#[from] EncodingError),
	#[error("Rejected confirmation: {0}")]
	Confirmation(#[from] ConfirmationError),
}

/// Operations exposed on the command line.
#[derive(Subcommand, Debug)]
pub enum Command {
	/// Compute the checkpoint of an artifact file (a single artifact or an array)
	Checkpoint { artifact: PathBuf },
	/// Check that a confirmation record is well-formed
	Confirm { record: PathBuf },
	/// Escrow funds and add a transfer request to the pool
	Submit {
		#[arg(long)]
		sender: String,
		#[arg(long)]
		recipient: String,
		#[arg(long)]
		denom: String,
		#[arg(long)]
		amount: String,
		#[arg(long, default_value = "0")]
		fee: String,
	},
	/// Cancel a pending transfer request and refund its sender
	Cancel {
		id: u64,
		/// Only cancel if this account submitted the request
		#[arg(long)]
		sender: Option<String>,
	},
	/// List pending transfer requests
	Pending {
		/// Only requests of this token contract, highest fee first
		#[arg(long)]
		contract: Option<String>,
		/// Read at most this many requests of the contract
		#[arg(long, requires = "contract")]
		limit: Option<usize>,
	},
	/// Assemble the next batch for a token contract
	BuildBatch {
		#[arg(long)]
		contract: String,
		/// Overrides `batch.max_entries`
		#[arg(long)]
		max_entries: Option<usize>,
		/// Overrides `batch.timeout`
		#[arg(long)]
		timeout: Option<u64>,
	},
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ArtifactFile {
	Many(Vec<OutgoingArtifact>),
	One(OutgoingArtifact),
}

/// Pool and configuration wired together from the configured implementations.
pub struct Bridge {
	config: Config,
	pool: OutgoingPool,
}

impl Bridge {
	pub fn new(config: Config) -> Result<Self, CommandError> {
		let registry = initialize_registry();
		let storage = Arc::new(StorageService::new(registry.build_storage(&config)?));
		let ledger: Arc<dyn CustodyLedger> = Arc::from(registry.build_ledger(&config)?);
		let ids = IdAllocator::new(storage.clone());
		let pool = OutgoingPool::new(
			storage,
			ledger,
			ids,
			EventBus::new(EVENT_CAPACITY),
			config.bridge.account_prefix.clone(),
		);

		if config.custody.primary == "memory" && config.storage.primary != "memory" {
			tracing::warn!(
				storage = %config.storage.primary,
				"Custody balances are rebuilt from configuration on every run"
			);
		}

		Ok(Self { config, pool })
	}

	/// Runs one command and returns its printable output.
	pub async fn execute(&self, command: Command) -> Result<String, CommandError> {
		match command {
			Command::Checkpoint { artifact } => self.checkpoint(&artifact).await,
			Command::Confirm { record } => self.confirm(&record).await,
			Command::Submit {
				sender,
				recipient,
				denom,
				amount,
				fee,
			} => {
				let recipient = parse_contract(&recipient)?;
				let value = Coin::new(denom.clone(), parse_amount(&amount)?);
				let fee = Coin::new(denom, parse_amount(&fee)?);
				let id = self.pool.submit(&sender, recipient, value, fee).await?;
				Ok(format!("Submitted transfer request {}", id))
			},
			Command::Cancel { id, sender } => {
				let request = match sender {
					Some(sender) => self.pool.cancel_as(id, &sender).await?,
					None => self.pool.cancel(id).await?,
				};
				Ok(format!(
					"Cancelled transfer request {} of {}",
					request.id, request.sender
				))
			},
			Command::Pending { contract, limit } => {
				let snapshot = match (contract, limit) {
					(Some(contract), Some(limit)) => {
						self.pool
							.top_pending(parse_contract(&contract)?, limit)
							.await?
					},
					(Some(contract), None) => {
						self.pool
							.pending_for_contract(parse_contract(&contract)?)
							.await?
					},
					(None, _) => self.pool.pending().await?,
				};
				Ok(serde_json::to_string_pretty(&snapshot.to_vec()?)?)
			},
			Command::BuildBatch {
				contract,
				max_entries,
				timeout,
			} => {
				let contract = parse_contract(&contract)?;
				let max_entries = max_entries.unwrap_or(self.config.batch.max_entries);
				let timeout = timeout.unwrap_or(self.config.batch.timeout);
				self.build_batch(contract, max_entries, timeout).await
			},
		}
	}

	async fn checkpoint(&self, path: &Path) -> Result<String, CommandError> {
		let chain_identifier = &self.config.bridge.chain_identifier;
		match serde_json::from_str(&read(path).await?)? {
			ArtifactFile::One(artifact) => {
				Ok(compute_checkpoint(&artifact, chain_identifier)?.to_string())
			},
			ArtifactFile::Many(artifacts) => {
				let lines: Vec<String> = checkpoint_all(&artifacts, chain_identifier)
					.into_iter()
					.map(|result| match result {
						Ok(digest) => digest.to_string(),
						Err(e) => format!("error: {}", e),
					})
					.collect();
				Ok(lines.join("\n"))
			},
		}
	}

	async fn confirm(&self, path: &Path) -> Result<String, CommandError> {
		let record: ConfirmationRecord = serde_json::from_str(&read(path).await?)?;
		ConfirmationValidator::new(self.config.bridge.account_prefix.clone()).validate(&record)?;
		Ok(format!(
			"Valid {} confirmation from {}",
			record.kind(),
			record.orchestrator_address()
		))
	}

	async fn build_batch(
		&self,
		contract: Address,
		max_entries: usize,
		timeout: u64,
	) -> Result<String, CommandError> {
		let Some(batch) = self.pool.build_batch(contract, max_entries, timeout).await? else {
			return Ok(format!("No pending requests for {}", contract));
		};

		let artifact = OutgoingArtifact::Batch(batch);
		let checkpoint = compute_checkpoint(&artifact, &self.config.bridge.chain_identifier)?;
		tracing::info!(%contract, %checkpoint, "Built batch");
		Ok(serde_json::to_string_pretty(&serde_json::json!({
			"artifact": artifact,
			"checkpoint": checkpoint,
		}))?)
	}
}

async fn read(path: &Path) -> Result<String, CommandError> {
	tokio::fs::read_to_string(path)
		.await
		.map_err(|source| CommandError::Read {
			path: path.to_path_buf(),
			source,
		})
}

fn parse_contract(input: &str) -> Result<Address, CommandError> {
	parse_eth_address(input).map_err(|e| CommandError::InvalidArgument(format!("{}: {}", input, e)))
}

fn parse_amount(input: &str) -> Result<U256, CommandError> {
	input
		.parse::<U256>()
		.map_err(|e| CommandError::InvalidArgument(format!("amount '{}': {}", input, e)))
}
