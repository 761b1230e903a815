//! The compile → estimate → send deployment task graph.
//!
//! A concrete instance of the executor in [`crate::graph`]: six named tasks
//! whose only edges are the ones data actually flows along, so chain reads,
//! compiler loading and compilation all overlap where possible.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_core::primitives::{Address, U256};
use anyhow::{Context, Result};

use crate::chain::{BlockInfo, ChainClient, DeploySpec, HttpChainClient};
use crate::compiler::{CompilerClient, CompilerHandle, SolcCompiler};
use crate::deployer::{Deployer, SaleArgs};
use crate::encode::{AbiWord, encode_words, init_code};
use crate::error::ExecutorError;
use crate::graph::TaskGraph;

pub const RESOLVE_BLOCK: &str = "resolve_block";
pub const RESOLVE_SENDER: &str = "resolve_sender";
pub const LOAD_COMPILER: &str = "load_compiler";
pub const COMPILE_AND_ESTIMATE: &str = "compile_and_estimate";
pub const RESOLVE_GAS_PRICE: &str = "resolve_gas_price";
pub const SEND_DEPLOYMENT: &str = "send_deployment";

/// Per-task results flowing through the deployment graph.
#[derive(Debug)]
pub enum StageOutput {
    Block(BlockInfo),
    Sender(Address),
    Compiler(CompilerHandle),
    /// Compiled init code with its estimated gas cost.
    Estimated { spec: DeploySpec, gas: U256 },
    GasPrice(U256),
    Submitted(String),
}

impl StageOutput {
    fn as_block(&self) -> Result<&BlockInfo> {
        match self {
            Self::Block(block) => Ok(block),
            other => anyhow::bail!("expected block header, got {other:?}"),
        }
    }

    fn as_sender(&self) -> Result<Address> {
        match self {
            Self::Sender(addr) => Ok(*addr),
            other => anyhow::bail!("expected sender address, got {other:?}"),
        }
    }

    fn as_estimated(&self) -> Result<(&DeploySpec, U256)> {
        match self {
            Self::Estimated { spec, gas } => Ok((spec, *gas)),
            other => anyhow::bail!("expected gas estimate, got {other:?}"),
        }
    }

    fn as_gas_price(&self) -> Result<U256> {
        match self {
            Self::GasPrice(price) => Ok(*price),
            other => anyhow::bail!("expected gas price, got {other:?}"),
        }
    }
}

/// Build the deployment task graph.
///
/// Tasks and edges:
/// - `resolve_block`, `resolve_sender`, `load_compiler` and
///   `resolve_gas_price` have no dependencies;
/// - `compile_and_estimate` needs the compiler and the block header (for the
///   start-time default);
/// - `send_deployment` needs the sender, the gas price and the estimate.
pub fn build_deploy_graph<C, S>(
    deployer: Arc<Deployer>,
    chain: Arc<C>,
    compiler: Arc<S>,
    args: SaleArgs,
    from_override: Option<Address>,
) -> TaskGraph<StageOutput>
where
    C: ChainClient + 'static,
    S: CompilerClient + 'static,
{
    let mut graph = TaskGraph::new();

    {
        let chain = Arc::clone(&chain);
        graph.add_task(RESOLVE_BLOCK, &[], move |_| async move {
            let block = chain.latest_block().await?;
            tracing::debug!(number = block.number, timestamp = block.timestamp, "Resolved latest block");
            Ok(StageOutput::Block(block))
        });
    }

    {
        let chain = Arc::clone(&chain);
        graph.add_task(RESOLVE_SENDER, &[], move |_| async move {
            // An explicit override short-circuits the chain query entirely.
            let sender = match from_override {
                Some(addr) => addr,
                None => chain.default_account().await?,
            };
            tracing::debug!(sender = %sender, "Resolved sending account");
            Ok(StageOutput::Sender(sender))
        });
    }

    {
        let compiler = Arc::clone(&compiler);
        let version = deployer.compiler_version.clone();
        graph.add_task(LOAD_COMPILER, &[], move |_| async move {
            let handle = compiler.load_version(&version).await?;
            Ok(StageOutput::Compiler(handle))
        });
    }

    {
        let chain = Arc::clone(&chain);
        let compiler = Arc::clone(&compiler);
        let deployer = Arc::clone(&deployer);
        graph.add_task(
            COMPILE_AND_ESTIMATE,
            &[LOAD_COMPILER, RESOLVE_BLOCK],
            move |ctx| async move {
                let block = *ctx.require(RESOLVE_BLOCK)?.as_block()?;

                let sources: BTreeMap<String, String> =
                    deployer.read_sources()?.into_iter().collect();
                let output = compiler.compile(&sources, deployer.optimizer_runs).await?;
                let artifact = output.artifact(&deployer.target).ok_or_else(|| {
                    crate::error::DeployError::Compilation(format!(
                        "artifact '{}' missing from compiler output",
                        deployer.target
                    ))
                })?;

                let start_time = args
                    .start_time
                    .unwrap_or(block.timestamp + deployer.start_time_offset_secs);
                let words = [
                    AbiWord::Address(args.owner),
                    AbiWord::Address(args.funding_recipient),
                    AbiWord::Address(args.community_pool_address),
                    AbiWord::Address(args.future_development_pool_address),
                    AbiWord::Address(args.team_pool_address),
                    AbiWord::Uint(U256::from(start_time)),
                ];
                let data = init_code(&artifact.bytecode, &encode_words(&words));

                let spec = DeploySpec {
                    from: None,
                    data,
                    gas: None,
                    gas_price: None,
                };
                let gas = chain.estimate_gas(&spec).await?;
                tracing::info!(gas = %gas, start_time, "Deployment estimated");
                Ok(StageOutput::Estimated { spec, gas })
            },
        );
    }

    {
        let chain = Arc::clone(&chain);
        graph.add_task(RESOLVE_GAS_PRICE, &[], move |_| async move {
            let price = chain.gas_price().await?;
            tracing::debug!(gas_price = %price, "Resolved network gas price");
            Ok(StageOutput::GasPrice(price))
        });
    }

    {
        let chain = Arc::clone(&chain);
        graph.add_task(
            SEND_DEPLOYMENT,
            &[RESOLVE_SENDER, RESOLVE_GAS_PRICE, COMPILE_AND_ESTIMATE],
            move |ctx| async move {
                let sender = ctx.require(RESOLVE_SENDER)?.as_sender()?;
                let gas_price = ctx.require(RESOLVE_GAS_PRICE)?.as_gas_price()?;
                let (estimated, gas) = ctx.require(COMPILE_AND_ESTIMATE)?.as_estimated()?;

                let spec = DeploySpec {
                    from: Some(sender),
                    data: estimated.data.clone(),
                    gas: Some(gas),
                    gas_price: Some(gas_price),
                };
                let tx_hash = chain.send_transaction(&spec).await?;
                tracing::info!(tx_hash = %tx_hash, "Deployment transaction submitted");
                Ok(StageOutput::Submitted(tx_hash))
            },
        );
    }

    graph
}

/// Run the deployment graph with explicit collaborators and return the
/// transaction hash.
pub async fn deploy_with<C, S>(
    deployer: Deployer,
    chain: Arc<C>,
    compiler: Arc<S>,
    args: SaleArgs,
    from_override: Option<Address>,
) -> Result<String, ExecutorError>
where
    C: ChainClient + 'static,
    S: CompilerClient + 'static,
{
    let graph = build_deploy_graph(Arc::new(deployer), chain, compiler, args, from_override);
    let ctx = graph.run().await?;

    match ctx.get(SEND_DEPLOYMENT) {
        Some(StageOutput::Submitted(tx_hash)) => Ok(tx_hash.clone()),
        _ => Err(ExecutorError::Task {
            task: SEND_DEPLOYMENT.to_string(),
            source: anyhow::anyhow!("no submission result recorded"),
        }),
    }
}

impl Deployer {
    /// Compile, estimate and submit the deployment with the production
    /// collaborators (HTTP JSON-RPC node, host solc binary).
    pub async fn deploy(
        self,
        args: SaleArgs,
        from_override: Option<Address>,
    ) -> Result<String> {
        let chain =
            Arc::new(HttpChainClient::new(&self.rpc_url).context("Failed to create chain client")?);
        let compiler = Arc::new(SolcCompiler::new(self.solc_binary.clone()));
        Ok(deploy_with(self, chain, compiler, args, from_override).await?)
    }
}
