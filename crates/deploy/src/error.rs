//! Error taxonomy for the deployment library.

use thiserror::Error;

/// Structural problems with a task graph, detected before any task runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A task declares a dependency on a name that is not in the graph.
    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    /// The dependency graph contains a cycle.
    #[error("task graph contains a dependency cycle involving '{task}'")]
    Cycle { task: String },

    /// The same task name was registered more than once.
    #[error("task '{task}' is registered more than once")]
    DuplicateTask { task: String },
}

/// Failure of a task graph run.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The graph was rejected during validation; no task was started.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The first task failure encountered, tagged with the task's name.
    #[error("task '{task}' failed: {source:#}")]
    Task {
        task: String,
        source: anyhow::Error,
    },
}

impl ExecutorError {
    /// Name of the task that caused the failure, if any single task did.
    pub fn task_name(&self) -> Option<&str> {
        match self {
            Self::Graph(_) => None,
            Self::Task { task, .. } => Some(task),
        }
    }
}

/// Failures reported by the external compiler and chain collaborators, plus
/// file I/O from the unification pipeline.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The pinned compiler version could not be resolved.
    #[error("compiler version '{requested}' unavailable: {detail}")]
    VersionLoad { requested: String, detail: String },

    /// The compiler reported an error, or the requested artifact is absent
    /// from its output.
    #[error("compilation failed: {0}")]
    Compilation(String),

    /// The node rejected the dry-run gas estimate.
    #[error("gas estimation rejected: {0}")]
    Estimation(String),

    /// The node rejected the deployment transaction.
    #[error("transaction submission rejected: {0}")]
    Submission(String),

    /// The RPC endpoint could not be reached or returned garbage.
    #[error("rpc failure: {0}")]
    Rpc(String),

    /// File read/write failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
