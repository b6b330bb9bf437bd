//! # Flock
//!
//! A self-scaling pool of execution units for named-function jobs.
//!
//! Jobs go to the least-loaded worker, and the pool grows up to
//! `max_workers` when every worker is full. A job stuck at the head of a
//! worker's queue for longer than `switch_queue_time` causes the jobs queued
//! behind it to migrate elsewhere. Workers left idle for `max_idle_time` are
//! terminated and replaced.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use flock::{FunctionRegistry, PoolConfig, ThreadUnitFactory, WorkerPool, job};
//!
//! #[job]
//! fn add(args: (i64, i64)) -> i64 {
//!     args.0 + args.1
//! }
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = FunctionRegistry::new().with(AddJob);
//! let pool = WorkerPool::new(
//!     PoolConfig::default(),
//!     Arc::new(ThreadUnitFactory::new(registry)),
//! )?;
//!
//! let sum: i64 = pool.run("add", &(1, 2)).await?;
//! assert_eq!(sum, 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`]: placement, scaling and control signal handling
//! - [`worker`]: per-unit queue, dispatch and timers
//! - [`bus`]: the control bus carrying *migrate* and *replace*
//! - [`unit`]: thread-backed execution unit and function registry
//! - [`job`]: result sinks and caller handles
//! - [`config`], [`error`], [`logging`]

pub mod bus;
pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod pool;
pub mod timer;
pub mod unit;
pub mod worker;

pub use bus::{ControlBus, ControlFrame, ControlSignal, ControlSubscription};
pub use config::{AgentConfig, PoolConfig};
pub use error::{BusError, PoolError};
pub use job::{JobHandle, JobRequest, ResultSink};
pub use pool::{PoolMetrics, PoolStatus, WorkerPool};
pub use unit::{FunctionRegistry, ThreadUnit, ThreadUnitFactory};
pub use worker::{AgentState, AgentStats, ExitOutcome, RejectReason, Rejection, WorkerAgent};

pub use flock_api::{
    ErrorKind, ExecutionUnit, JobError, JobFunction, JobId, JobPayload, JobResult, ReplyKind,
    UnitError, UnitFactory, UnitReply, UnitRequest, WorkerId, job, job_fn,
};
