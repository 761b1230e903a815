//! Executor property tests against the public API.
//!
//! Run with: cargo test --test executor_test

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use kiln_deploy::{ExecutorError, GraphError, TaskGraph};

/// A moderately wide graph: three independent roots, two mid-level tasks and
/// one sink. Every task must appear exactly once in the result.
#[tokio::test]
async fn test_wide_graph_has_one_entry_per_task() {
    let mut graph: TaskGraph<String> = TaskGraph::new();
    for root in ["r1", "r2", "r3"] {
        graph.add_task(root, &[], move |_| async move { Ok(root.to_string()) });
    }
    graph
        .add_task("m1", &["r1", "r2"], |ctx| async move {
            Ok(format!("{}+{}", ctx.require("r1")?, ctx.require("r2")?))
        })
        .add_task("m2", &["r2", "r3"], |ctx| async move {
            Ok(format!("{}+{}", ctx.require("r2")?, ctx.require("r3")?))
        })
        .add_task("sink", &["m1", "m2"], |ctx| async move {
            Ok(format!("{}|{}", ctx.require("m1")?, ctx.require("m2")?))
        });

    let ctx = graph.run().await.unwrap();
    assert_eq!(ctx.len(), 6);
    assert_eq!(ctx.get("sink").map(String::as_str), Some("r1+r2|r2+r3"));
}

/// Independent tasks genuinely overlap: with three tasks each sleeping 50ms,
/// a serial executor would need 150ms.
#[tokio::test]
async fn test_independent_tasks_run_concurrently() {
    let mut graph: TaskGraph<u64> = TaskGraph::new();
    for name in ["a", "b", "c"] {
        graph.add_task(name, &[], |_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(1)
        });
    }

    let started = std::time::Instant::now();
    let ctx = graph.run().await.unwrap();
    assert_eq!(ctx.len(), 3);
    assert!(started.elapsed() < Duration::from_millis(140));
}

/// A task never observes a partially filled context: dependencies are always
/// complete before the dependent starts.
#[tokio::test]
async fn test_dependencies_complete_before_dependent_starts() {
    let counter = Arc::new(AtomicUsize::new(0));

    let mut graph: TaskGraph<usize> = TaskGraph::new();
    for name in ["a", "b", "c"] {
        let counter = Arc::clone(&counter);
        graph.add_task(name, &[], move |_| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(counter.fetch_add(1, Ordering::SeqCst))
        });
    }
    {
        let counter = Arc::clone(&counter);
        graph.add_task("sink", &["a", "b", "c"], move |_| async move {
            // All three predecessors have bumped the counter by now.
            Ok(counter.load(Ordering::SeqCst))
        });
    }

    let ctx = graph.run().await.unwrap();
    assert_eq!(ctx.get("sink"), Some(&3));
}

#[tokio::test]
async fn test_cycle_in_larger_graph_is_caught() {
    let mut graph: TaskGraph<u64> = TaskGraph::new();
    graph
        .add_task("ok", &[], |_| async { Ok(0) })
        .add_task("a", &["ok", "c"], |_| async { Ok(1) })
        .add_task("b", &["a"], |_| async { Ok(2) })
        .add_task("c", &["b"], |_| async { Ok(3) });

    let err = graph.run().await.unwrap_err();
    assert!(matches!(err, ExecutorError::Graph(GraphError::Cycle { .. })));
}

/// Failure in one branch never causes a result from the other branch to leak
/// into a success value: the whole run reports the failing task.
#[tokio::test]
async fn test_failure_in_one_branch_fails_the_run() {
    let mut graph: TaskGraph<u64> = TaskGraph::new();
    graph
        .add_task("good_root", &[], |_| async { Ok(1) })
        .add_task("good_leaf", &["good_root"], |ctx| async move {
            Ok(ctx.require("good_root")? + 1)
        })
        .add_task("bad_root", &[], |_| async {
            anyhow::bail!("node unreachable")
        });

    let err = graph.run().await.unwrap_err();
    assert_eq!(err.task_name(), Some("bad_root"));
}
