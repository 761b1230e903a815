//! Generic dependency-ordered task graph executor.
//!
//! A [`TaskGraph`] holds named tasks with declared dependency lists. Running
//! the graph validates it first (no cycles, no dangling references), then
//! executes every task exactly once: a task starts only after all of its
//! dependencies completed successfully, and independent tasks run
//! concurrently on the tokio runtime. The first failure stops all further
//! scheduling; tasks already in flight are drained and their results
//! discarded, and the run fails with the originating task's error, tagged
//! with that task's name. The executor never retries anything.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use tokio::task::JoinSet;

use crate::error::{ExecutorError, GraphError};

type TaskFn<T> = Box<dyn FnOnce(TaskContext<T>) -> BoxFuture<'static, Result<T>> + Send>;

struct Task<T> {
    deps: Vec<String>,
    run: TaskFn<T>,
}

/// Results accumulated during one run, keyed by task name.
///
/// Each spawned task receives a context holding exactly the results of its
/// declared dependencies. On success, [`TaskGraph::run`] returns a context
/// holding one entry per task. Contexts are discarded after the run; nothing
/// persists between runs.
#[derive(Debug)]
pub struct TaskContext<T> {
    results: HashMap<String, Arc<T>>,
}

impl<T> TaskContext<T> {
    fn new(results: HashMap<String, Arc<T>>) -> Self {
        Self { results }
    }

    /// Look up a completed task's result by name.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.results.get(name).map(Arc::as_ref)
    }

    /// Look up a declared dependency's result, failing if it is absent.
    pub fn require(&self, name: &str) -> Result<&T> {
        self.get(name)
            .with_context(|| format!("no result recorded for dependency '{name}'"))
    }

    /// Number of completed tasks recorded in this context.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// A named set of tasks with declared dependencies.
pub struct TaskGraph<T> {
    tasks: HashMap<String, Task<T>>,
    duplicates: Vec<String>,
}

impl<T> Default for TaskGraph<T> {
    fn default() -> Self {
        Self {
            tasks: HashMap::new(),
            duplicates: Vec::new(),
        }
    }
}

impl<T: Send + Sync + 'static> TaskGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task under a unique name.
    ///
    /// `deps` are the names of tasks whose results the closure may read from
    /// its [`TaskContext`]; the task will not start before all of them have
    /// completed successfully. Registering the same name twice is reported as
    /// [`GraphError::DuplicateTask`] when the graph runs.
    pub fn add_task<F, Fut>(&mut self, name: impl Into<String>, deps: &[&str], run: F) -> &mut Self
    where
        F: FnOnce(TaskContext<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let name = name.into();
        let task = Task {
            deps: deps.iter().map(|d| d.to_string()).collect(),
            run: Box::new(move |ctx| Box::pin(run(ctx))),
        };
        if self.tasks.insert(name.clone(), task).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Reject duplicate names, dangling dependency references and cycles.
    fn validate(&self) -> Result<(), GraphError> {
        if let Some(task) = self.duplicates.first() {
            return Err(GraphError::DuplicateTask { task: task.clone() });
        }

        for (name, task) in &self.tasks {
            for dep in &task.deps {
                if !self.tasks.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        task: name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        // Kahn's algorithm; any task left with unsatisfied dependencies
        // afterwards sits on a cycle.
        let mut indegree: HashMap<&str, usize> = self
            .tasks
            .iter()
            .map(|(name, task)| (name.as_str(), task.deps.len()))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for (name, task) in &self.tasks {
            for dep in &task.deps {
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }

        let mut queue: Vec<&str> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut visited = 0usize;
        while let Some(name) = queue.pop() {
            visited += 1;
            for &dependent in dependents.get(name).into_iter().flatten() {
                if let Some(degree) = indegree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push(dependent);
                    }
                }
            }
        }

        if visited < self.tasks.len() {
            let task = indegree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(name, _)| *name)
                .min()
                .unwrap_or_default()
                .to_string();
            return Err(GraphError::Cycle { task });
        }

        Ok(())
    }

    /// Run the graph to completion.
    ///
    /// On success, returns a [`TaskContext`] with one entry per task. On the
    /// first task failure, stops scheduling, lets in-flight tasks finish
    /// (their results are discarded) and returns [`ExecutorError::Task`]
    /// naming the failed task.
    pub async fn run(mut self) -> Result<TaskContext<T>, ExecutorError> {
        self.validate()?;

        let total = self.tasks.len();
        let mut remaining: HashMap<String, usize> = self
            .tasks
            .iter()
            .map(|(name, task)| (name.clone(), task.deps.len()))
            .collect();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for (name, task) in &self.tasks {
            for dep in &task.deps {
                dependents.entry(dep.clone()).or_default().push(name.clone());
            }
        }

        let mut results: HashMap<String, Arc<T>> = HashMap::with_capacity(total);
        let mut set: JoinSet<(String, Result<T>)> = JoinSet::new();
        let mut inflight: HashMap<tokio::task::Id, String> = HashMap::new();
        let mut failure: Option<ExecutorError> = None;

        let ready: Vec<String> = remaining
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| name.clone())
            .collect();
        for name in ready {
            spawn_task(&mut self.tasks, &results, &mut set, &mut inflight, name);
        }

        while let Some(joined) = set.join_next_with_id().await {
            let (name, outcome) = match joined {
                Ok((id, (name, outcome))) => {
                    inflight.remove(&id);
                    (name, outcome)
                }
                Err(join_err) => {
                    let name = inflight
                        .remove(&join_err.id())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    (name, Err(anyhow::anyhow!("task aborted: {join_err}")))
                }
            };

            match outcome {
                Err(source) => {
                    tracing::error!(task = %name, error = %source, "Task failed");
                    if failure.is_none() {
                        failure = Some(ExecutorError::Task { task: name, source });
                    }
                    // Keep draining: in-flight tasks are allowed to finish,
                    // their results are discarded, and nothing new starts.
                }
                Ok(value) => {
                    if failure.is_some() {
                        tracing::debug!(task = %name, "Discarding result completed after failure");
                        continue;
                    }
                    tracing::debug!(task = %name, "Task completed");
                    results.insert(name.clone(), Arc::new(value));
                    for dependent in dependents.get(&name).cloned().unwrap_or_default() {
                        if let Some(degree) = remaining.get_mut(&dependent) {
                            *degree -= 1;
                            if *degree == 0 {
                                spawn_task(
                                    &mut self.tasks,
                                    &results,
                                    &mut set,
                                    &mut inflight,
                                    dependent,
                                );
                            }
                        }
                    }
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        debug_assert_eq!(results.len(), total);
        Ok(TaskContext::new(results))
    }
}

/// Start one task on the join set, handing it the results of its declared
/// dependencies.
fn spawn_task<T: Send + Sync + 'static>(
    tasks: &mut HashMap<String, Task<T>>,
    results: &HashMap<String, Arc<T>>,
    set: &mut JoinSet<(String, Result<T>)>,
    inflight: &mut HashMap<tokio::task::Id, String>,
    name: String,
) {
    let Some(task) = tasks.remove(&name) else {
        return;
    };
    let mut deps = HashMap::with_capacity(task.deps.len());
    for dep in &task.deps {
        if let Some(value) = results.get(dep) {
            deps.insert(dep.clone(), Arc::clone(value));
        }
    }
    let ctx = TaskContext::new(deps);

    tracing::debug!(task = %name, "Starting task");
    let task_name = name.clone();
    let handle = set.spawn(async move {
        let outcome = (task.run)(ctx).await;
        (task_name, outcome)
    });
    inflight.insert(handle.id(), name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_diamond_graph_produces_one_entry_per_task() {
        let mut graph: TaskGraph<i64> = TaskGraph::new();
        graph
            .add_task("a", &[], |_| async { Ok(1) })
            .add_task("b", &["a"], |ctx| async move {
                Ok(ctx.require("a")? + 10)
            })
            .add_task("c", &["a"], |ctx| async move {
                Ok(ctx.require("a")? + 100)
            })
            .add_task("d", &["b", "c"], |ctx| async move {
                Ok(ctx.require("b")? + ctx.require("c")?)
            });

        let ctx = graph.run().await.unwrap();
        assert_eq!(ctx.len(), 4);
        assert_eq!(ctx.get("a"), Some(&1));
        assert_eq!(ctx.get("b"), Some(&11));
        assert_eq!(ctx.get("c"), Some(&101));
        assert_eq!(ctx.get("d"), Some(&112));
    }

    #[tokio::test]
    async fn test_empty_graph_succeeds() {
        let graph: TaskGraph<i64> = TaskGraph::new();
        let ctx = graph.run().await.unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_cycle_is_rejected_before_any_task_runs() {
        static TOUCHED: AtomicBool = AtomicBool::new(false);

        let mut graph: TaskGraph<i64> = TaskGraph::new();
        graph
            .add_task("a", &["b"], |_| async {
                TOUCHED.store(true, Ordering::SeqCst);
                Ok(1)
            })
            .add_task("b", &["a"], |_| async {
                TOUCHED.store(true, Ordering::SeqCst);
                Ok(2)
            });

        let err = graph.run().await.unwrap_err();
        assert!(matches!(err, ExecutorError::Graph(GraphError::Cycle { .. })));
        assert!(!TOUCHED.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_self_dependency_is_a_cycle() {
        let mut graph: TaskGraph<i64> = TaskGraph::new();
        graph.add_task("a", &["a"], |_| async { Ok(1) });

        let err = graph.run().await.unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::Graph(GraphError::Cycle { task }) if task == "a"
        ));
    }

    #[tokio::test]
    async fn test_dangling_dependency_is_rejected() {
        let mut graph: TaskGraph<i64> = TaskGraph::new();
        graph.add_task("a", &["missing"], |_| async { Ok(1) });

        let err = graph.run().await.unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::Graph(GraphError::UnknownDependency { task, dependency })
                if task == "a" && dependency == "missing"
        ));
    }

    #[tokio::test]
    async fn test_duplicate_task_is_rejected() {
        let mut graph: TaskGraph<i64> = TaskGraph::new();
        graph
            .add_task("a", &[], |_| async { Ok(1) })
            .add_task("a", &[], |_| async { Ok(2) });

        let err = graph.run().await.unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::Graph(GraphError::DuplicateTask { task }) if task == "a"
        ));
    }

    #[tokio::test]
    async fn test_failure_is_tagged_and_dependents_never_start() {
        static DEPENDENT_RAN: AtomicBool = AtomicBool::new(false);

        let mut graph: TaskGraph<i64> = TaskGraph::new();
        graph
            .add_task("boom", &[], |_| async {
                anyhow::bail!("it broke")
            })
            .add_task("after", &["boom"], |_| async {
                DEPENDENT_RAN.store(true, Ordering::SeqCst);
                Ok(1)
            })
            .add_task("transitive", &["after"], |_| async {
                DEPENDENT_RAN.store(true, Ordering::SeqCst);
                Ok(2)
            });

        let err = graph.run().await.unwrap_err();
        assert_eq!(err.task_name(), Some("boom"));
        assert!(err.to_string().contains("it broke"));
        assert!(!DEPENDENT_RAN.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_inflight_task_finishes_but_result_is_discarded() {
        let mut graph: TaskGraph<i64> = TaskGraph::new();
        graph
            .add_task("slow", &[], |_| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(1)
            })
            .add_task("fail_fast", &[], |_| async {
                anyhow::bail!("early failure")
            });

        let err = graph.run().await.unwrap_err();
        assert_eq!(err.task_name(), Some("fail_fast"));
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported_with_its_name() {
        let mut graph: TaskGraph<i64> = TaskGraph::new();
        graph.add_task("panicky", &[], |_| async { panic!("kaboom") });

        let err = graph.run().await.unwrap_err();
        assert_eq!(err.task_name(), Some("panicky"));
    }

    #[tokio::test]
    async fn test_independent_start_order_does_not_change_results() {
        // Same graph twice, with the sleeps swapped so that completion order
        // reverses; the result mapping must be identical.
        for (delay_x, delay_y) in [(40u64, 5u64), (5, 40)] {
            let mut graph: TaskGraph<i64> = TaskGraph::new();
            graph
                .add_task("x", &[], move |_| async move {
                    tokio::time::sleep(Duration::from_millis(delay_x)).await;
                    Ok(7)
                })
                .add_task("y", &[], move |_| async move {
                    tokio::time::sleep(Duration::from_millis(delay_y)).await;
                    Ok(9)
                })
                .add_task("sum", &["x", "y"], |ctx| async move {
                    Ok(ctx.require("x")? + ctx.require("y")?)
                });

            let ctx = graph.run().await.unwrap();
            assert_eq!(ctx.get("x"), Some(&7));
            assert_eq!(ctx.get("y"), Some(&9));
            assert_eq!(ctx.get("sum"), Some(&16));
        }
    }

    #[tokio::test]
    async fn test_context_exposes_only_declared_dependencies() {
        let mut graph: TaskGraph<i64> = TaskGraph::new();
        graph
            .add_task("a", &[], |_| async { Ok(1) })
            .add_task("b", &[], |_| async { Ok(2) })
            .add_task("needs_a", &["a"], |ctx| async move {
                assert!(ctx.get("b").is_none());
                assert!(ctx.require("b").is_err());
                ctx.require("a").map(|v| *v)
            });

        let ctx = graph.run().await.unwrap();
        assert_eq!(ctx.get("needs_a"), Some(&1));
    }
}
