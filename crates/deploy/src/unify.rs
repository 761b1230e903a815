//! Source unification: concatenates the configured contract set into a
//! single timestamp-qualified file for verification/publishing.
//!
//! A second instance of the executor in [`crate::graph`], shaped as a
//! strictly linear chain (each task depends on the previous one). The
//! pipeline owns its destination file for the whole run; on failure the
//! partial output is left in place and must be treated as indeterminate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use crate::deployer::Deployer;
use crate::error::{DeployError, ExecutorError};
use crate::graph::TaskGraph;

pub const WRITE_HEADER: &str = "write_header";
pub const READ_SOURCES: &str = "read_sources";
pub const STRIP_CROSS_REFERENCES: &str = "strip_cross_references";
pub const APPEND_SOURCES: &str = "append_sources";

/// Per-step results flowing through the unification chain.
#[derive(Debug)]
pub enum UnifyStage {
    HeaderWritten,
    /// Fragment bodies in their declared order.
    SourcesRead(Vec<String>),
    /// Fragments with the pragma header and in-set imports removed.
    Stripped(Vec<String>),
    Appended,
}

impl UnifyStage {
    fn as_sources(&self) -> Result<&[String]> {
        match self {
            Self::SourcesRead(sources) => Ok(sources),
            other => anyhow::bail!("expected read sources, got {other:?}"),
        }
    }

    fn as_stripped(&self) -> Result<&[String]> {
        match self {
            Self::Stripped(sources) => Ok(sources),
            other => anyhow::bail!("expected stripped sources, got {other:?}"),
        }
    }
}

/// Compute the destination path for a unification run.
///
/// The filename embeds the pragma version, the pinned compiler version and
/// the current time in milliseconds, so successive runs never collide.
pub fn unified_output_path(deployer: &Deployer) -> PathBuf {
    let version = deployer
        .solidity_pragma
        .replacen("pragma solidity ", "", 1)
        .replacen(';', "", 1)
        .trim()
        .to_string();
    let millis = chrono::Utc::now().timestamp_millis();
    deployer.output_dir.join(format!(
        "Unified_{}_{}_{}.sol",
        version, deployer.compiler_version, millis
    ))
}

/// Strip one fragment: remove the shared pragma statement and any import of
/// another fragment in the same set (both become invalid once everything
/// lives in one file).
///
/// Plain first-occurrence textual replacement, matching the behavior this
/// tool inherited. A parser-aware strip would be more robust against pragma
/// or import text inside comments and string literals.
fn strip_cross_references(content: &str, pragma: &str, set: &[String]) -> String {
    let mut cleared = content.replacen(pragma, "", 1);
    for name in set {
        let import = format!("import './{name}';");
        cleared = cleared.replacen(&import, "", 1);
    }
    cleared
}

/// Build the linear unification graph writing to `dest`.
pub fn build_unify_graph(deployer: Arc<Deployer>, dest: PathBuf) -> TaskGraph<UnifyStage> {
    let mut graph = TaskGraph::new();

    {
        let deployer = Arc::clone(&deployer);
        let dest = dest.clone();
        graph.add_task(WRITE_HEADER, &[], move |_| async move {
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(DeployError::Io)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            // Created or truncated; any prior content is gone.
            tokio::fs::write(&dest, format!("{}\n", deployer.solidity_pragma))
                .await
                .map_err(DeployError::Io)
                .with_context(|| format!("failed to write header to {}", dest.display()))?;
            Ok(UnifyStage::HeaderWritten)
        });
    }

    {
        let deployer = Arc::clone(&deployer);
        graph.add_task(READ_SOURCES, &[WRITE_HEADER], move |_| async move {
            let sources = deployer.read_sources()?;
            tracing::debug!(count = sources.len(), "Read source fragments");
            Ok(UnifyStage::SourcesRead(
                sources.into_iter().map(|(_, content)| content).collect(),
            ))
        });
    }

    {
        let deployer = Arc::clone(&deployer);
        graph.add_task(
            STRIP_CROSS_REFERENCES,
            &[READ_SOURCES],
            move |ctx| async move {
                let sources = ctx.require(READ_SOURCES)?.as_sources()?;
                let stripped = sources
                    .iter()
                    .map(|content| {
                        strip_cross_references(
                            content,
                            &deployer.solidity_pragma,
                            &deployer.sources,
                        )
                    })
                    .collect();
                Ok(UnifyStage::Stripped(stripped))
            },
        );
    }

    {
        graph.add_task(
            APPEND_SOURCES,
            &[STRIP_CROSS_REFERENCES],
            move |ctx| async move {
                let stripped = ctx.require(STRIP_CROSS_REFERENCES)?.as_stripped()?;
                let mut file = tokio::fs::OpenOptions::new()
                    .append(true)
                    .open(&dest)
                    .await
                    .map_err(DeployError::Io)
                    .with_context(|| format!("failed to open {}", dest.display()))?;
                for fragment in stripped {
                    file.write_all(fragment.as_bytes())
                        .await
                        .map_err(DeployError::Io)
                        .with_context(|| format!("failed to append to {}", dest.display()))?;
                }
                file.flush().await.map_err(DeployError::Io)?;
                Ok(UnifyStage::Appended)
            },
        );
    }

    graph
}

impl Deployer {
    /// Run the unification pipeline and return the path of the unified file.
    pub async fn unify(&self) -> Result<PathBuf, ExecutorError> {
        let dest = unified_output_path(self);
        tracing::info!(dest = %dest.display(), "Unifying contracts...");

        let graph = build_unify_graph(Arc::new(self.clone()), dest.clone());
        graph.run().await?;

        tracing::info!(dest = %dest.display(), "Unification complete");
        Ok(dest)
    }
}
