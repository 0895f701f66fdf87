//! Cleanup after an interrupt in the middle of a batch.
//!
//! Kept in its own test binary: it asserts that the test process has no
//! descendants left, which other tests' workers would disturb.

mod common;

use common::{job_spec, temp_dir};
use fmax::application::process_tree::ProcessSnapshot;
use fmax::application::{PoolOptions, WorkerCommand, WorkerPool};
use fmax::domain::models::JobOutcome;
use fmax::BatchExecutor;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const FP: &str = "0123456789abcdef0123456789abcdef";

// `nested`: the helper is a grandchild in the worker's process group.
// `detached`: the helper moves to its own session and the worker ignores
// SIGTERM, so only the descendant walk and SIGKILL can clean up.
const WORKER_SCRIPT: &str = r#"
case "$(pwd)" in
  */nested)
    sh -c 'sleep 300 & echo $! > helper.pid; wait' &
    wait ;;
  */detached)
    trap '' TERM
    setsid sleep 300 &
    echo $! > helper.pid
    while :; do sleep 1; done ;;
esac
"#;

fn read_pid(run_dir: &Path) -> Option<u32> {
    std::fs::read_to_string(run_dir.join("helper.pid"))
        .ok()?
        .trim()
        .parse()
        .ok()
}

async fn wait_for_helpers(run_dirs: &[PathBuf]) -> Vec<u32> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let pids: Vec<u32> = run_dirs.iter().filter_map(|d| read_pid(d)).collect();
        if pids.len() == run_dirs.len() {
            return pids;
        }
        assert!(Instant::now() < deadline, "helpers never started");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_interrupt_mid_batch_leaves_no_processes() {
    let dir = temp_dir();
    let cancel = CancellationToken::new();
    let pool = WorkerPool::new(
        WorkerCommand::new("sh", ["-c", WORKER_SCRIPT, "fmax-worker"]),
        PoolOptions {
            max_workers: 2,
            grace_period: Duration::from_millis(500),
            reuse_cached_results: false,
        },
        cancel.clone(),
    );
    let run_dirs = vec![dir.path().join("nested"), dir.path().join("detached")];
    let jobs = vec![
        job_spec(&run_dirs[0], 100.0, FP),
        job_spec(&run_dirs[1], 200.0, FP),
    ];

    let interrupt = tokio::spawn({
        let run_dirs = run_dirs.clone();
        async move {
            let helpers = wait_for_helpers(&run_dirs).await;
            cancel.cancel();
            helpers
        }
    });

    let started = Instant::now();
    let harvested = pool.submit_batch(jobs, Duration::from_secs(60)).await.unwrap();
    pool.shutdown().await;
    let helpers = interrupt.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(15));
    assert_eq!(harvested.len(), 2);
    assert!(harvested.iter().all(|j| j.outcome == JobOutcome::Cancelled));
    assert!(pool.active_workers().is_empty());

    // give the kernel a moment to deliver the last SIGKILLs
    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = ProcessSnapshot::capture();
    for pid in helpers {
        assert!(!snapshot.is_alive(pid), "helper {pid} survived");
    }
    assert_eq!(snapshot.descendants(std::process::id()), Vec::<u32>::new());
}
