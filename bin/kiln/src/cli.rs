use alloy_core::primitives::Address;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// RPC endpoint selection: a local development node or a custom URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum RpcProvider {
    Localhost,
    #[strum(default)]
    Custom(String),
}

impl RpcProvider {
    pub fn to_rpc_url(&self) -> String {
        match self {
            RpcProvider::Localhost => "http://localhost:8545".to_string(),
            RpcProvider::Custom(url) => url.clone(),
        }
    }
}

#[derive(Parser)]
#[command(name = "kiln")]
#[command(
    author,
    version,
    about = "Compile, estimate and deploy Solidity contracts in one pipeline"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "KILN_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the Kiln.toml configuration file, or a directory containing it.
    #[arg(short, long, alias = "conf", env = "KILN_CONFIG", default_value = "Kiln.toml")]
    pub config: String,

    /// Override the configured RPC endpoint ("localhost" or a full URL).
    #[arg(long, alias = "rpc", env = "KILN_RPC_URL")]
    pub rpc_provider: Option<RpcProvider>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile the configured contracts, estimate gas and submit the
    /// deployment transaction.
    Deploy {
        /// Path to the JSON file with constructor arguments.
        #[arg(short, long, env = "KILN_ARGS")]
        args: String,

        /// Sender address. When omitted, the node's default account is used.
        #[arg(long, env = "KILN_FROM")]
        from: Option<Address>,
    },

    /// Concatenate the configured contracts into a single unified source
    /// file.
    Unify,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_provider_parsing() {
        assert_eq!("localhost".parse(), Ok(RpcProvider::Localhost));
        assert_eq!(
            "http://node:8545".parse(),
            Ok(RpcProvider::Custom("http://node:8545".to_string()))
        );
    }

    #[test]
    fn test_rpc_provider_urls() {
        assert_eq!(
            RpcProvider::Localhost.to_rpc_url(),
            "http://localhost:8545"
        );
        assert_eq!(
            RpcProvider::Custom("http://node:8545".to_string()).to_rpc_url(),
            "http://node:8545"
        );
    }
}
