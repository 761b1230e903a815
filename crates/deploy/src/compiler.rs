//! Compiler client: drives an external `solc` binary through its
//! standard-JSON interface.
//!
//! Nothing here understands Solidity; the compiler is a collaborator. The
//! [`CompilerClient`] trait is the seam the pipeline uses, [`SolcCompiler`]
//! the subprocess-backed implementation.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::process::Stdio;

use alloy_core::primitives::Bytes;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::DeployError;

/// Proof that the pinned compiler version was resolved. Carries the full
/// version line the compiler reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerHandle {
    pub version: String,
}

/// A named compiled output: deployment bytecode plus the ABI descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytecode: Bytes,
    pub abi: Value,
}

/// All artifacts produced by one compiler run, keyed `File.sol:Contract`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledOutput {
    artifacts: HashMap<String, Artifact>,
}

impl CompiledOutput {
    pub fn from_artifacts(artifacts: HashMap<String, Artifact>) -> Self {
        Self { artifacts }
    }

    /// Select an artifact by its qualified name.
    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.get(name)
    }

    pub fn artifact_names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Operations the pipeline needs from an external Solidity compiler.
pub trait CompilerClient: Send + Sync {
    /// Resolve the exact compiler version required. Fails with
    /// [`DeployError::VersionLoad`] when the available compiler does not
    /// match.
    fn load_version(
        &self,
        version: &str,
    ) -> impl Future<Output = Result<CompilerHandle, DeployError>> + Send;

    /// Compile the full source set. Fails with [`DeployError::Compilation`]
    /// on any compiler-reported error.
    fn compile(
        &self,
        sources: &BTreeMap<String, String>,
        optimizer_runs: u32,
    ) -> impl Future<Output = Result<CompiledOutput, DeployError>> + Send;
}

/// Compiler client backed by a `solc` binary on the host.
pub struct SolcCompiler {
    binary: PathBuf,
}

impl SolcCompiler {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run_solc(&self, args: &[&str], stdin_data: Option<&[u8]>) -> Result<Vec<u8>, DeployError> {
        let mut command = Command::new(&self.binary);
        command.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        if stdin_data.is_some() {
            command.stdin(Stdio::piped());
        }

        let mut child = command.spawn()?;
        if let Some(data) = stdin_data {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| DeployError::Io(std::io::Error::other("failed to open solc stdin")))?;
            stdin.write_all(data).await?;
            // Dropping stdin closes the pipe so solc sees EOF.
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(DeployError::Compilation(format!(
                "solc exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

impl CompilerClient for SolcCompiler {
    async fn load_version(&self, version: &str) -> Result<CompilerHandle, DeployError> {
        let stdout = self
            .run_solc(&["--version"], None)
            .await
            .map_err(|e| DeployError::VersionLoad {
                requested: version.to_string(),
                detail: e.to_string(),
            })?;
        let reported = String::from_utf8_lossy(&stdout);

        // A pinned version like "v0.4.18+commit.9cf6e910" must appear in the
        // "Version: 0.4.18+commit.9cf6e910.Linux.g++" line solc prints.
        let wanted = version.trim_start_matches('v');
        let line = reported
            .lines()
            .find(|line| line.contains("Version:"))
            .unwrap_or_default()
            .trim()
            .to_string();
        if !line.contains(wanted) {
            return Err(DeployError::VersionLoad {
                requested: version.to_string(),
                detail: format!("available compiler reports '{line}'"),
            });
        }

        tracing::debug!(version = %line, "Compiler version resolved");
        Ok(CompilerHandle { version: line })
    }

    async fn compile(
        &self,
        sources: &BTreeMap<String, String>,
        optimizer_runs: u32,
    ) -> Result<CompiledOutput, DeployError> {
        let input = standard_json_input(sources, optimizer_runs);
        let payload = input.to_string();
        tracing::debug!(sources = sources.len(), "Compiling source set");

        let stdout = self
            .run_solc(&["--standard-json"], Some(payload.as_bytes()))
            .await?;
        let raw: Value = serde_json::from_slice(&stdout)
            .map_err(|e| DeployError::Compilation(format!("invalid compiler output: {e}")))?;

        parse_standard_json_output(&raw)
    }
}

/// Build the standard-JSON input document for one compiler run.
fn standard_json_input(sources: &BTreeMap<String, String>, optimizer_runs: u32) -> Value {
    let sources: serde_json::Map<String, Value> = sources
        .iter()
        .map(|(name, content)| (name.clone(), serde_json::json!({ "content": content })))
        .collect();

    serde_json::json!({
        "language": "Solidity",
        "sources": sources,
        "settings": {
            "optimizer": { "enabled": true, "runs": optimizer_runs },
            "outputSelection": { "*": { "*": ["abi", "evm.bytecode.object"] } }
        }
    })
}

/// Parse a standard-JSON output document into artifacts, collecting all
/// error-severity diagnostics into a single [`DeployError::Compilation`].
fn parse_standard_json_output(raw: &Value) -> Result<CompiledOutput, DeployError> {
    let mut diagnostics = Vec::new();
    for error in raw.get("errors").and_then(Value::as_array).into_iter().flatten() {
        if error.get("severity").and_then(Value::as_str) == Some("error") {
            let message = error
                .get("formattedMessage")
                .or_else(|| error.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown compiler error");
            diagnostics.push(message.trim().to_string());
        }
    }
    if !diagnostics.is_empty() {
        return Err(DeployError::Compilation(diagnostics.join("\n")));
    }

    let mut artifacts = HashMap::new();
    let contracts = raw
        .get("contracts")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    for (file, entries) in &contracts {
        let Some(entries) = entries.as_object() else {
            continue;
        };
        for (contract, body) in entries {
            let object = body
                .pointer("/evm/bytecode/object")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let bytecode = hex::decode(object.trim_start_matches("0x")).map_err(|e| {
                DeployError::Compilation(format!(
                    "artifact '{file}:{contract}' has invalid bytecode: {e}"
                ))
            })?;
            let abi = body.get("abi").cloned().unwrap_or(Value::Null);
            artifacts.insert(
                format!("{file}:{contract}"),
                Artifact {
                    bytecode: Bytes::from(bytecode),
                    abi,
                },
            );
        }
    }

    Ok(CompiledOutput::from_artifacts(artifacts))
}
