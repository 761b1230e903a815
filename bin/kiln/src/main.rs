//! kiln is a CLI tool that compiles, estimates and deploys Solidity
//! contracts, and unifies contract sets for verification.

mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use kiln_deploy::{Deployer, SaleArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let mut deployer = Deployer::load_from_file(&PathBuf::from(&cli.config))?;

    if let Some(provider) = &cli.rpc_provider {
        deployer.rpc_url = provider.to_rpc_url();
    }

    match cli.command {
        Command::Deploy { args, from } => {
            let args = SaleArgs::load_from_file(&PathBuf::from(&args))?;

            tracing::info!(
                rpc_url = %deployer.rpc_url,
                target = %deployer.target,
                compiler_version = %deployer.compiler_version,
                "Starting deployment..."
            );

            let tx_hash = deployer.deploy(args, from).await?;
            println!("Success! transactionHash = {tx_hash}");
        }
        Command::Unify => {
            let dest = deployer.unify().await?;
            println!("Unified contracts written to {}", dest.display());
        }
    }

    Ok(())
}
