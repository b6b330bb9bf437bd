//! Runs a thousand `add` jobs through a pool of thread-backed units.
//!
//! ```sh
//! RUST_LOG=flock=debug cargo run --example add_pool
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use flock::logging;
use flock::{FunctionRegistry, PoolConfig, ThreadUnitFactory, WorkerPool, job};

#[derive(Deserialize)]
struct Pair {
    one: i64,
    two: i64,
}

#[job]
fn add(args: Pair) -> i64 {
    args.one + args.two
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_default();

    let registry = FunctionRegistry::new().with(AddJob);
    let pool = WorkerPool::new(
        PoolConfig::default()
            .with_max_workers(50)
            .with_max_jobs_per_worker(10),
        Arc::new(ThreadUnitFactory::new(registry)),
    )?;

    let started = Instant::now();
    for i in 0..1000i64 {
        let result: i64 = pool
            .run("add", &serde_json::json!({ "one": i + 1, "two": i + 2 }))
            .await?;
        assert_eq!(result, (i + 1) + (i + 2));
    }
    tracing::info!(elapsed = ?started.elapsed(), metrics = ?pool.metrics(), "1000 jobs done");

    pool.shutdown();
    Ok(())
}
