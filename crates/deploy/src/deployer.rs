//! Deployer configuration and constructor parameter files.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::DeployError;

/// The default name for the kiln configuration file.
pub const KILN_FILENAME: &str = "Kiln.toml";

fn default_solc_binary() -> PathBuf {
    PathBuf::from("solc")
}

fn default_optimizer_runs() -> u32 {
    200
}

/// Default sale start offset when no explicit start time is supplied: latest
/// block timestamp plus one hour. Inherited deployment policy; configurable
/// because its correctness outside the original deployment is unverified.
fn default_start_time_offset() -> u64 {
    3600
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Everything needed to compile, deploy and unify one contract set.
///
/// Serializes to/from TOML (`Kiln.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployer {
    /// JSON-RPC endpoint of the target node.
    pub rpc_url: String,
    /// Pinned compiler version, e.g. "v0.4.18+commit.9cf6e910".
    pub compiler_version: String,
    /// Path to the solc binary.
    #[serde(default = "default_solc_binary")]
    pub solc_binary: PathBuf,
    /// Directory containing the contract sources.
    pub contracts_dir: PathBuf,
    /// Source file names, in dependency order. Later files may rely on
    /// declarations from earlier ones; the order is authoritative and never
    /// inferred.
    pub sources: Vec<String>,
    /// Qualified artifact to deploy, "File.sol:Contract".
    pub target: String,
    /// The pragma statement shared by all sources, without trailing newline,
    /// e.g. "pragma solidity ^0.4.18;". Used as the unified file header and
    /// stripped from each fragment.
    pub solidity_pragma: String,
    #[serde(default = "default_optimizer_runs")]
    pub optimizer_runs: u32,
    #[serde(default = "default_start_time_offset")]
    pub start_time_offset_secs: u64,
    /// Directory the unification pipeline writes into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Deployer {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deployer config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Kiln.toml` inside a
    /// directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(KILN_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Read the configured sources, preserving their declared order.
    pub fn read_sources(&self) -> Result<Vec<(String, String)>, DeployError> {
        let mut sources = Vec::with_capacity(self.sources.len());
        for name in &self.sources {
            let path = self.contracts_dir.join(name);
            let content = std::fs::read_to_string(&path).map_err(|e| {
                DeployError::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to read source {}: {e}", path.display()),
                ))
            })?;
            sources.push((name.clone(), content));
        }
        Ok(sources)
    }
}

/// Constructor arguments for the token sale contract, read from a JSON
/// parameter file. Immutable once loaded; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleArgs {
    pub owner: Address,
    pub funding_recipient: Address,
    pub community_pool_address: Address,
    pub future_development_pool_address: Address,
    pub team_pool_address: Address,
    /// Sale start as a unix timestamp. When absent, defaults to the latest
    /// block timestamp plus [`Deployer::start_time_offset_secs`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
}

impl SaleArgs {
    /// Load constructor arguments from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read arguments from {}", path.display()))?;
        let args: Self =
            serde_json::from_str(&content).context("Failed to parse arguments file as JSON")?;
        tracing::info!(path = %path.display(), "Constructor arguments loaded");
        Ok(args)
    }
}
