//! # Worker Pool
//!
//! The pool owns the worker registry and is the only component that changes
//! it. Callers reach it through [`WorkerPool::submit`] and friends; workers
//! reach it through the control bus, which the pool's control task drains.
//!
//! ## Placement
//!
//! A job goes to the worker with the fewest queued jobs, the first in
//! registry order on ties. When that worker is full the pool starts a new
//! one, up to `max_workers`. A worker that refuses the job anyway gets one
//! re-selection; after that the pool is saturated and the job fails with
//! [`JobError::PoolSaturated`].
//!
//! ## Control Signals
//!
//! - *migrate*: every carried job is placed again, on a worker other than the
//!   sender when possible. The caller's handle travels with the job.
//! - *replace*: the sender is removed from the registry and a successor is
//!   started in its place, unless live workers already reach `max_workers`.
//!
//! A terminated worker stays registered until its *replace* signal is
//! handled, but it no longer counts toward `max_workers`. Jobs migrated off
//! a force-exited worker at full size can therefore start its successor.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use flock_api::errors::JobError;
use flock_api::protocol::JobPayload;
use flock_api::types::{JobId, JobResult, WorkerId};
use flock_api::unit::UnitFactory;

use crate::bus::{ControlBus, ControlSignal, ControlSubscription};
use crate::config::{AgentConfig, PoolConfig};
use crate::error::PoolError;
use crate::job::{JobHandle, JobRequest};
use crate::worker::{AgentStats, ExitOutcome, WorkerAgent};

/// Lifecycle of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Running,
    ShuttingDown,
    Shutdown,
}

/// Snapshot of pool load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetrics {
    pub status: PoolStatus,
    pub worker_count: usize,
    /// Jobs queued across all workers, in-flight heads included
    pub queued_jobs: usize,
    /// Per-worker view, in registry order
    pub workers: Vec<AgentStats>,
}

struct PoolInner {
    config: PoolConfig,
    agent_config: AgentConfig,
    factory: Arc<dyn UnitFactory>,
    bus: ControlBus,
    runtime: Handle,
    /// Registry in creation order
    workers: RwLock<Vec<Arc<WorkerAgent>>>,
    status: Mutex<PoolStatus>,
    control_task: Mutex<Option<JoinHandle<()>>>,
}

/// Self-scaling pool of worker agents.
///
/// Cheap to clone; clones share the same workers. The pool lives until the
/// last clone is dropped or [`shutdown`](WorkerPool::shutdown) is called.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("status", &self.status())
            .field("workers", &self.worker_count())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool on the current tokio runtime and starts `min_workers`
    /// workers.
    ///
    /// # Arguments
    /// * `config` - Pool sizing and timer configuration
    /// * `factory` - Starts the execution unit behind every worker
    pub fn new(config: PoolConfig, factory: Arc<dyn UnitFactory>) -> Result<Self, PoolError> {
        let runtime = Handle::try_current().map_err(|e| PoolError::NoRuntime(e.to_string()))?;
        Self::with_runtime(config, factory, runtime)
    }

    /// Creates a pool whose workers, timers and control task run on
    /// `runtime`.
    pub fn with_runtime(
        config: PoolConfig,
        factory: Arc<dyn UnitFactory>,
        runtime: Handle,
    ) -> Result<Self, PoolError> {
        config.validate()?;

        let bus = ControlBus::new();
        // Subscribe before any worker exists so no signal is missed
        let subscription = bus.subscribe();

        let inner = Arc::new(PoolInner {
            agent_config: config.agent_config(),
            config,
            factory,
            bus,
            runtime,
            workers: RwLock::new(Vec::new()),
            status: Mutex::new(PoolStatus::Running),
            control_task: Mutex::new(None),
        });

        {
            let mut workers = inner.workers.write();
            for _ in 0..inner.config.min_workers {
                inner.spawn_worker(&mut workers)?;
            }
        }

        let task = inner
            .runtime
            .spawn(run_control_loop(Arc::downgrade(&inner), subscription));
        *inner.control_task.lock() = Some(task);

        info!(
            min_workers = inner.config.min_workers,
            max_workers = inner.config.max_workers,
            max_jobs_per_worker = inner.config.max_jobs_per_worker,
            "Worker pool started"
        );
        Ok(Self { inner })
    }

    /// Runs `name` with `args` and waits for the result.
    pub async fn submit(&self, name: impl Into<String>, args: Value) -> JobResult<Value> {
        self.dispatch(name, args).await
    }

    /// Places a job and returns its handle without waiting.
    ///
    /// Placement failures resolve the handle immediately.
    pub fn dispatch(&self, name: impl Into<String>, args: Value) -> JobHandle {
        self.dispatch_payload(JobPayload::new(name, args))
    }

    pub fn dispatch_payload(&self, payload: JobPayload) -> JobHandle {
        let (request, handle) = JobRequest::new(payload);

        if self.status() != PoolStatus::Running {
            request.reject(JobError::PoolShutdown);
            return handle;
        }

        match self.inner.place(request, None) {
            Ok((worker, job)) => {
                debug!(worker = %worker, job = %job, "Job placed");
            }
            Err(request) if !self.inner.is_running() => {
                request.reject(JobError::PoolShutdown);
            }
            Err(request) => {
                let error = self.inner.saturated();
                warn!(function = %request.payload.name, "Job rejected: {}", error);
                request.reject(error);
            }
        }
        handle
    }

    /// Typed submission: serializes `args` and deserializes the result.
    pub async fn run<A, R>(&self, name: &str, args: &A) -> JobResult<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let args = serde_json::to_value(args)?;
        let value = self.submit(name, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Starts a worker unless the pool is at `max_workers`.
    pub fn create_worker(&self) -> Option<Arc<WorkerAgent>> {
        let mut workers = self.inner.workers.write();
        match self.inner.spawn_worker(&mut workers) {
            Ok(agent) => agent,
            Err(PoolError::ShuttingDown) => None,
            Err(e) => {
                error!("Failed to create worker: {}", e);
                None
            }
        }
    }

    /// Force-terminates a worker; its queued jobs migrate and it is removed
    /// from the registry once its *replace* signal is handled.
    ///
    /// Returns `false` if no such worker is registered.
    pub fn delete_worker(&self, id: &WorkerId) -> bool {
        let Some(agent) = self.worker(id) else {
            return false;
        };
        match agent.exit(true) {
            ExitOutcome::Terminated { migrated } => {
                info!(worker = %id, migrated, "Worker deleted");
            }
            outcome => {
                debug!(worker = %id, ?outcome, "Worker already stopping");
            }
        }
        true
    }

    pub fn worker(&self, id: &WorkerId) -> Option<Arc<WorkerAgent>> {
        self.inner
            .workers
            .read()
            .iter()
            .find(|agent| agent.id() == id)
            .cloned()
    }

    /// Registered worker ids, in registry order.
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.inner
            .workers
            .read()
            .iter()
            .map(|agent| agent.id().clone())
            .collect()
    }

    pub fn worker_count(&self) -> usize {
        self.inner.workers.read().len()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// The control bus the pool's workers publish on.
    pub fn bus(&self) -> &ControlBus {
        &self.inner.bus
    }

    pub fn status(&self) -> PoolStatus {
        *self.inner.status.lock()
    }

    pub fn metrics(&self) -> PoolMetrics {
        let workers: Vec<AgentStats> = self
            .inner
            .workers
            .read()
            .iter()
            .map(|agent| agent.stats())
            .collect();
        PoolMetrics {
            status: self.status(),
            worker_count: workers.len(),
            queued_jobs: workers.iter().map(|stats| stats.queue_len).sum(),
            workers,
        }
    }

    /// Stops every worker and fails every pending job with `PoolShutdown`.
    ///
    /// Later submissions fail the same way. Returns the number of jobs
    /// failed.
    pub fn shutdown(&self) -> usize {
        {
            let mut status = self.inner.status.lock();
            if *status != PoolStatus::Running {
                return 0;
            }
            *status = PoolStatus::ShuttingDown;
        }

        let workers: Vec<Arc<WorkerAgent>> = self.inner.workers.write().drain(..).collect();
        let failed: usize = workers.iter().map(|agent| agent.shutdown()).sum();

        *self.inner.status.lock() = PoolStatus::Shutdown;
        info!(workers = workers.len(), failed, "Worker pool shut down");
        failed
    }
}

impl PoolInner {
    /// Starts a worker and registers it. `Ok(None)` when live workers reach
    /// `max_workers`; terminated entries awaiting replacement do not count.
    fn spawn_worker(
        &self,
        workers: &mut Vec<Arc<WorkerAgent>>,
    ) -> Result<Option<Arc<WorkerAgent>>, PoolError> {
        if !self.is_running() {
            return Err(PoolError::ShuttingDown);
        }
        if live_count(workers) >= self.config.max_workers {
            return Ok(None);
        }
        let agent = WorkerAgent::spawn(
            self.agent_config.clone(),
            self.factory.as_ref(),
            self.bus.clone(),
            self.runtime.clone(),
        )?;
        workers.push(agent.clone());
        Ok(Some(agent))
    }

    /// Least-loaded worker, scaling up when it is full.
    fn select_worker(&self, exclude: Option<&WorkerId>) -> Option<Arc<WorkerAgent>> {
        let mut workers = self.workers.write();
        let least = workers
            .iter()
            .filter(|agent| Some(agent.id()) != exclude && !agent.is_terminated())
            .min_by_key(|agent| agent.queue_len())
            .cloned();

        if let Some(agent) = &least {
            if agent.queue_len() < self.agent_config.max_jobs {
                return least;
            }
        }

        match self.spawn_worker(&mut workers) {
            Ok(Some(agent)) => {
                debug!(worker = %agent.id(), workers = workers.len(), "Scaled up");
                Some(agent)
            }
            Ok(None) | Err(PoolError::ShuttingDown) => least,
            Err(e) => {
                error!("Failed to scale up: {}", e);
                least
            }
        }
    }

    /// Hands `request` to a worker, re-selecting once if it is refused.
    /// Gives the request back when no worker took it.
    fn place(
        &self,
        mut request: JobRequest,
        exclude: Option<&WorkerId>,
    ) -> Result<(WorkerId, JobId), JobRequest> {
        for attempt in 0..2 {
            let Some(agent) = self.select_worker(exclude) else {
                return Err(request);
            };
            match agent.input(request) {
                Ok(job) => return Ok((agent.id().clone(), job)),
                Err(rejection) => {
                    debug!(worker = %agent.id(), attempt, reason = ?rejection.reason, "Worker refused job");
                    request = rejection.request;
                }
            }
        }
        Err(request)
    }

    fn saturated(&self) -> JobError {
        JobError::PoolSaturated {
            workers: live_count(&self.workers.read()),
            max_jobs: self.agent_config.max_jobs,
        }
    }

    fn is_running(&self) -> bool {
        *self.status.lock() == PoolStatus::Running
    }

    fn handle_signal(&self, signal: ControlSignal) {
        match signal {
            ControlSignal::Migrate { worker_id, jobs } => self.migrate_jobs(&worker_id, jobs),
            ControlSignal::Replace { worker_id } => self.replace_worker(&worker_id),
        }
    }

    fn migrate_jobs(&self, from: &WorkerId, jobs: Vec<JobRequest>) {
        if !self.is_running() {
            for request in jobs {
                request.reject(JobError::PoolShutdown);
            }
            return;
        }

        let count = jobs.len();
        let mut rejected = 0;
        for request in jobs {
            let placed = match self.place(request, Some(from)) {
                Ok(placed) => Ok(placed),
                // Nobody else has room; a live sender may still take it back
                Err(request) => self.place(request, None),
            };
            match placed {
                Ok((worker, job)) => {
                    debug!(from = %from, to = %worker, job = %job, "Migrated job placed");
                }
                Err(request) => {
                    rejected += 1;
                    request.reject(self.saturated());
                }
            }
        }

        if rejected > 0 {
            warn!(from = %from, count, rejected, "Migrated jobs rejected, pool saturated");
        } else {
            info!(from = %from, count, "Migrated jobs re-placed");
        }
    }

    fn replace_worker(&self, id: &WorkerId) {
        let mut workers = self.workers.write();
        let Some(index) = workers.iter().position(|agent| agent.id() == id) else {
            debug!(worker = %id, "Replace for unregistered worker ignored");
            return;
        };
        workers.remove(index);

        match self.spawn_worker(&mut workers) {
            Ok(Some(agent)) => {
                info!(old = %id, new = %agent.id(), "Worker replaced");
            }
            Ok(None) => {
                debug!(old = %id, "Worker removed, successor already running");
            }
            Err(PoolError::ShuttingDown) => {}
            Err(e) => {
                error!(old = %id, "Failed to start replacement worker: {}", e);
            }
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        if let Some(task) = self.control_task.get_mut().take() {
            task.abort();
        }
    }
}

fn live_count(workers: &[Arc<WorkerAgent>]) -> usize {
    workers.iter().filter(|agent| !agent.is_terminated()).count()
}

async fn run_control_loop(pool: Weak<PoolInner>, mut subscription: ControlSubscription) {
    while let Some(signal) = subscription.recv().await {
        let Some(inner) = pool.upgrade() else {
            break;
        };
        inner.handle_signal(signal);
    }
    debug!("Pool control loop stopped");
}
