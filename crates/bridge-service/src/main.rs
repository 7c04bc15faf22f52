//! Command-line entry point of the bridge core.
//!
//! Loads the configuration, wires the configured storage backend and custody
//! ledger into an outgoing pool, and runs one subcommand against it.

use bridge_config::Config;
use clap::Parser;
use std::path::PathBuf;

mod commands;
mod factory_registry;

use commands::{Bridge, Command};

/// Command-line arguments for the bridge service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "BRIDGE_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	// Command output goes to stdout, so logs go to stderr.
	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!(
		chain = %config.bridge.chain_identifier,
		"Loaded configuration"
	);

	let bridge = Bridge::new(config)?;
	let output = bridge.execute(args.command).await?;
	println!("{}", output);

	Ok(())
}
