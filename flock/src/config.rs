use std::time::Duration;

use crate::error::PoolError;

pub const DEFAULT_MIN_WORKERS: usize = 3;
pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_MAX_IDLE_TIME: Duration = Duration::from_millis(30_000);
pub const DEFAULT_SWITCH_QUEUE_TIME: Duration = Duration::from_millis(10_000);
pub const DEFAULT_MAX_JOBS_PER_WORKER: usize = 150;

// --- Pool Configuration ---

/// Configuration for a `WorkerPool`.
///
/// The execution unit factory is passed to the pool separately; everything
/// here has a default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of workers started with the pool.
    pub min_workers: usize,

    /// Upper bound on the number of workers.
    pub max_workers: usize,

    /// How long a worker may sit with an empty queue before it terminates
    /// and asks to be replaced.
    pub max_idle_time: Duration,

    /// How long the head job may run before the jobs queued behind it are
    /// migrated to other workers.
    pub switch_queue_time: Duration,

    /// Queue length at which a worker refuses new jobs.
    pub max_jobs_per_worker: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: DEFAULT_MIN_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
            max_idle_time: DEFAULT_MAX_IDLE_TIME,
            switch_queue_time: DEFAULT_SWITCH_QUEUE_TIME,
            max_jobs_per_worker: DEFAULT_MAX_JOBS_PER_WORKER,
        }
    }
}

impl PoolConfig {
    /// Defaults with `max_workers` sized to the machine.
    pub fn for_available_cpus() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            min_workers: DEFAULT_MIN_WORKERS.min(cpus),
            max_workers: cpus,
            ..Self::default()
        }
    }

    pub fn with_min_workers(mut self, min_workers: usize) -> Self {
        self.min_workers = min_workers;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_max_idle_time(mut self, max_idle_time: Duration) -> Self {
        self.max_idle_time = max_idle_time;
        self
    }

    pub fn with_switch_queue_time(mut self, switch_queue_time: Duration) -> Self {
        self.switch_queue_time = switch_queue_time;
        self
    }

    pub fn with_max_jobs_per_worker(mut self, max_jobs_per_worker: usize) -> Self {
        self.max_jobs_per_worker = max_jobs_per_worker;
        self
    }

    /// Checks the configuration for values the pool cannot run with.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_workers == 0 {
            return Err(PoolError::InvalidConfig("max_workers must be at least 1".into()));
        }
        if self.min_workers > self.max_workers {
            return Err(PoolError::InvalidConfig(format!(
                "min_workers ({}) exceeds max_workers ({})",
                self.min_workers, self.max_workers
            )));
        }
        if self.max_jobs_per_worker == 0 {
            return Err(PoolError::InvalidConfig(
                "max_jobs_per_worker must be at least 1".into(),
            ));
        }
        if self.max_idle_time.is_zero() {
            return Err(PoolError::InvalidConfig("max_idle_time must be non-zero".into()));
        }
        if self.switch_queue_time.is_zero() {
            return Err(PoolError::InvalidConfig(
                "switch_queue_time must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// The per-worker slice of this configuration.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_jobs: self.max_jobs_per_worker,
            switch_queue_time: self.switch_queue_time,
            max_idle_time: self.max_idle_time,
        }
    }
}

// --- Worker Configuration ---

/// Settings a single `WorkerAgent` runs with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentConfig {
    /// Queue length at which `input` answers with a switch.
    pub max_jobs: usize,

    /// Migration budget for the head job.
    pub switch_queue_time: Duration,

    /// Idle time before self-termination.
    pub max_idle_time: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        PoolConfig::default().agent_config()
    }
}
