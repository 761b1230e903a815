//! kiln-deploy - Deployment library for Solidity contracts.
//!
//! This crate orchestrates contract deployment as a dependency-ordered task
//! graph: resolve network and account context, compile with a pinned solc,
//! estimate gas, submit the transaction. The same executor also drives the
//! source unification pipeline used for contract verification.

mod chain;
mod compiler;
mod deployer;
mod encode;
mod error;
mod graph;
mod pipeline;
mod unify;

pub use chain::{BlockInfo, ChainClient, DeploySpec, HttpChainClient};
pub use compiler::{Artifact, CompiledOutput, CompilerClient, CompilerHandle, SolcCompiler};
pub use deployer::{Deployer, KILN_FILENAME, SaleArgs};
pub use encode::{AbiWord, encode_words, init_code};
pub use error::{DeployError, ExecutorError, GraphError};
pub use graph::{TaskContext, TaskGraph};
pub use pipeline::{
    COMPILE_AND_ESTIMATE, LOAD_COMPILER, RESOLVE_BLOCK, RESOLVE_GAS_PRICE, RESOLVE_SENDER,
    SEND_DEPLOYMENT, StageOutput, build_deploy_graph, deploy_with,
};
pub use unify::{
    APPEND_SOURCES, READ_SOURCES, STRIP_CROSS_REFERENCES, UnifyStage, WRITE_HEADER,
    build_unify_graph, unified_output_path,
};
