use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use flock_api::errors::{JobError, UnitError};
use flock_api::protocol::{UnitReply, UnitRequest};
use flock_api::types::{JobId, WorkerId};
use flock_api::unit::{ExecutionUnit, ReplyReceiver, UnitFactory};

use crate::bus::{ControlBus, ControlSignal};
use crate::config::AgentConfig;
use crate::error::PoolError;
use crate::job::{Job, JobRequest};
use crate::timer::ScheduledTask;

/// Lifecycle state of a worker agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Queue is empty and the idle timer is armed
    Idle,
    /// The queue head is dispatched to the execution unit
    Active,
    /// The execution unit is stopped; nothing more is dispatched
    Terminated,
}

/// Why `input` refused a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The queue is at `max_jobs`; place the job elsewhere
    Full,
    /// The agent has terminated
    Terminated,
}

/// A job handed back by `input`, untouched.
#[derive(Debug)]
pub struct Rejection {
    pub request: JobRequest,
    pub reason: RejectReason,
}

/// Result of `exit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The unit was stopped; `migrated` jobs were handed back to the pool
    Terminated { migrated: usize },
    /// Graceful exit refused because jobs are queued
    Refused { queued: usize },
    /// The agent had already terminated
    AlreadyTerminated,
}

/// Point-in-time view of an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStats {
    pub id: WorkerId,
    pub state: AgentState,
    pub queue_len: usize,
    pub jobs_completed: u64,
    pub jobs_migrated: u64,
}

struct AgentCore {
    state: AgentState,
    /// FIFO; the head is the job in flight
    queue: VecDeque<Job>,
    idle_timer: Option<ScheduledTask>,
    /// Bumped on every arm; a firing timer only acts if it is still current
    idle_generation: u64,
    unit: Option<Box<dyn ExecutionUnit>>,
    jobs_completed: u64,
    jobs_migrated: u64,
}

impl AgentCore {
    fn cancel_idle_timer(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.cancel();
        }
    }

    fn mint_job_id(&self) -> JobId {
        loop {
            let id = JobId::generate();
            if !self.queue.iter().any(|job| job.id == id) {
                return id;
            }
        }
    }
}

/// # Worker Agent
///
/// Scheduler-side owner of one execution unit and its local job queue.
///
/// ## Key Responsibilities
/// - Accepting jobs up to `max_jobs` and refusing the rest
/// - Dispatching the queue head to the unit, one job at a time
/// - Resolving each job's result sink when the unit replies
/// - Migrating the backlog when the head overruns `switch_queue_time`
/// - Terminating after `max_idle_time` with an empty queue
///
/// ## Implementation Details
/// The agent never touches the pool's registry. Lifecycle decisions go out
/// as control bus signals: *migrate* hands queued jobs back for placement and
/// *replace* asks the pool for a successor.
///
/// All state sits behind one lock. Unit replies and timer expiries arrive on
/// runtime tasks holding a weak reference and take that lock, so every
/// transition is serialized. Timers re-check the state they fire for, since
/// a cancelled timer may already be running.
pub struct WorkerAgent {
    id: WorkerId,
    config: AgentConfig,
    bus: ControlBus,
    runtime: Handle,
    core: Mutex<AgentCore>,
    reply_listener: Mutex<Option<JoinHandle<()>>>,
    this: Weak<WorkerAgent>,
}

impl fmt::Debug for WorkerAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.lock();
        f.debug_struct("WorkerAgent")
            .field("id", &self.id)
            .field("state", &core.state)
            .field("queue_len", &core.queue.len())
            .finish()
    }
}

impl WorkerAgent {
    /// Starts an execution unit and wraps it in a new idle agent.
    ///
    /// ## Parameters
    /// - `config`: queue bound and timer lengths
    /// - `factory`: starts the execution unit
    /// - `bus`: where migrate and replace signals are published
    /// - `runtime`: runs the reply listener and timers
    pub fn spawn(
        config: AgentConfig,
        factory: &dyn UnitFactory,
        bus: ControlBus,
        runtime: Handle,
    ) -> Result<Arc<Self>, PoolError> {
        let id = WorkerId::generate();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let unit = factory.spawn(&id, reply_tx)?;

        let agent = Arc::new_cyclic(|this| WorkerAgent {
            id,
            config,
            bus,
            runtime,
            core: Mutex::new(AgentCore {
                state: AgentState::Idle,
                queue: VecDeque::new(),
                idle_timer: None,
                idle_generation: 0,
                unit: Some(unit),
                jobs_completed: 0,
                jobs_migrated: 0,
            }),
            reply_listener: Mutex::new(None),
            this: this.clone(),
        });

        agent.start_reply_listener(reply_rx);
        {
            let mut core = agent.core.lock();
            agent.arm_idle_timer(&mut core);
        }

        info!(worker = %agent.id, "Worker started");
        Ok(agent)
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> AgentState {
        self.core.lock().state
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == AgentState::Terminated
    }

    /// Number of queued jobs, head included.
    pub fn queue_len(&self) -> usize {
        self.core.lock().queue.len()
    }

    pub fn stats(&self) -> AgentStats {
        let core = self.core.lock();
        AgentStats {
            id: self.id.clone(),
            state: core.state,
            queue_len: core.queue.len(),
            jobs_completed: core.jobs_completed,
            jobs_migrated: core.jobs_migrated,
        }
    }

    /// Queues a job.
    ///
    /// A full queue answers with [`RejectReason::Full`], the signal to place
    /// the job elsewhere. An accepted job is dispatched at once if the queue
    /// was empty.
    pub fn input(&self, request: JobRequest) -> Result<JobId, Rejection> {
        let mut core = self.core.lock();

        if core.state == AgentState::Terminated {
            return Err(Rejection {
                request,
                reason: RejectReason::Terminated,
            });
        }
        if core.queue.len() >= self.config.max_jobs {
            return Err(Rejection {
                request,
                reason: RejectReason::Full,
            });
        }

        let id = core.mint_job_id();
        core.cancel_idle_timer();
        let was_empty = core.queue.is_empty();
        core.queue.push_back(Job::new(id.clone(), request));
        debug!(worker = %self.id, job = %id, queue_len = core.queue.len(), "Job queued");

        if was_empty {
            self.dispatch_head(&mut core);
        }
        Ok(id)
    }

    /// Stops the agent.
    ///
    /// Without `force` a busy agent refuses. With `force` every queued job,
    /// the in-flight head included, is handed back over the bus before the
    /// unit stops. Either way a terminated agent publishes *replace*.
    pub fn exit(&self, force: bool) -> ExitOutcome {
        let mut core = self.core.lock();

        if core.state == AgentState::Terminated {
            return ExitOutcome::AlreadyTerminated;
        }

        if core.queue.is_empty() {
            core.cancel_idle_timer();
            self.terminate_unit(&mut core);
            info!(worker = %self.id, "Worker exited");
            self.bus.publish(ControlSignal::Replace {
                worker_id: self.id.clone(),
            });
            return ExitOutcome::Terminated { migrated: 0 };
        }

        if !force {
            warn!(
                worker = %self.id,
                queued = core.queue.len(),
                "Refusing to terminate a busy worker without force"
            );
            return ExitOutcome::Refused {
                queued: core.queue.len(),
            };
        }

        let migrated = self.abandon(&mut core);
        info!(worker = %self.id, migrated, "Worker force-exited");
        ExitOutcome::Terminated { migrated }
    }

    /// Stops the unit and fails every queued job with `PoolShutdown`.
    /// Publishes nothing. Returns the number of jobs failed.
    pub fn shutdown(&self) -> usize {
        let mut core = self.core.lock();
        if core.state == AgentState::Terminated {
            return 0;
        }

        core.cancel_idle_timer();
        let pending: Vec<Job> = core.queue.drain(..).collect();
        let failed = pending.len();
        for job in pending {
            job.into_request().reject(JobError::PoolShutdown);
        }
        self.terminate_unit(&mut core);
        debug!(worker = %self.id, failed, "Worker shut down");
        failed
    }

    fn start_reply_listener(&self, mut replies: ReplyReceiver) {
        let this = self.this.clone();
        let handle = self.runtime.spawn(async move {
            while let Some(reply) = replies.recv().await {
                match this.upgrade() {
                    Some(agent) => agent.on_reply(reply),
                    None => break,
                }
            }
        });
        *self.reply_listener.lock() = Some(handle);
    }

    /// Sends the head job to the unit, arming its migration timer the first
    /// time it is dispatched.
    fn dispatch_head(&self, core: &mut AgentCore) {
        let Some(head) = core.queue.front_mut() else {
            return;
        };

        if head.migration_timer.is_none() {
            let this = self.this.clone();
            let job_id = head.id.clone();
            head.migration_timer = Some(ScheduledTask::schedule(
                &self.runtime,
                self.config.switch_queue_time,
                move || async move {
                    if let Some(agent) = this.upgrade() {
                        agent.on_migration_timeout(&job_id);
                    }
                },
            ));
        }

        let request = UnitRequest {
            id: head.id.clone(),
            data: head.request.payload.clone(),
        };
        core.state = AgentState::Active;
        debug!(worker = %self.id, job = %request.id, function = %request.data.name, "Dispatching job");

        let posted = match core.unit.as_ref() {
            Some(unit) => unit.post(request),
            None => Err(UnitError::Closed),
        };
        if let Err(e) = posted {
            error!(worker = %self.id, "Execution unit rejected job: {}", e);
            let migrated = self.abandon(core);
            warn!(worker = %self.id, migrated, "Worker abandoned after unit failure");
        }
    }

    fn on_reply(&self, reply: UnitReply) {
        let mut core = self.core.lock();

        if core.state == AgentState::Terminated {
            debug!(worker = %self.id, job = %reply.id, "Ignoring reply for terminated worker");
            return;
        }

        let Some(index) = core.queue.iter().position(|job| job.id == reply.id) else {
            warn!(worker = %self.id, job = %reply.id, "Reply for unknown job");
            return;
        };
        let Some(mut job) = core.queue.remove(index) else {
            return;
        };
        job.cancel_timer();

        let result = reply.into_result(&job.request.payload.name);
        if let Err(e) = &result {
            debug!(worker = %self.id, job = %job.id, "Job failed: {}", e);
        }
        job.request.sink.resolve(result);
        core.jobs_completed += 1;

        if index == 0 {
            if core.queue.is_empty() {
                core.state = AgentState::Idle;
                self.arm_idle_timer(&mut core);
            } else {
                self.dispatch_head(&mut core);
            }
        }
    }

    fn on_migration_timeout(&self, job_id: &JobId) {
        let mut core = self.core.lock();

        if core.state == AgentState::Terminated {
            return;
        }
        match core.queue.front() {
            Some(head) if head.id == *job_id => {}
            _ => return,
        }
        if core.queue.len() < 2 {
            debug!(worker = %self.id, job = %job_id, "Head job overran its budget with nothing queued behind it");
            return;
        }

        let jobs: Vec<JobRequest> = core.queue.drain(1..).map(Job::into_request).collect();
        core.jobs_migrated += jobs.len() as u64;
        warn!(
            worker = %self.id,
            job = %job_id,
            migrated = jobs.len(),
            budget = ?self.config.switch_queue_time,
            "Head job stalled, migrating queued jobs"
        );
        self.bus.publish(ControlSignal::Migrate {
            worker_id: self.id.clone(),
            jobs,
        });
    }

    fn on_idle_timeout(&self, generation: u64) {
        let mut core = self.core.lock();

        if core.state == AgentState::Terminated || !core.queue.is_empty() {
            return;
        }
        if core.idle_timer.is_none() || core.idle_generation != generation {
            debug!(worker = %self.id, generation, "Stale idle timer ignored");
            return;
        }

        core.idle_timer = None;
        self.terminate_unit(&mut core);
        info!(worker = %self.id, idle = ?self.config.max_idle_time, "Idle worker terminated");
        self.bus.publish(ControlSignal::Replace {
            worker_id: self.id.clone(),
        });
    }

    fn arm_idle_timer(&self, core: &mut AgentCore) {
        core.idle_generation += 1;
        let generation = core.idle_generation;
        let this = self.this.clone();
        core.idle_timer = Some(ScheduledTask::schedule(
            &self.runtime,
            self.config.max_idle_time,
            move || async move {
                if let Some(agent) = this.upgrade() {
                    agent.on_idle_timeout(generation);
                }
            },
        ));
    }

    /// Hands every queued job back to the pool, stops the unit and asks for a
    /// replacement. Returns the number of jobs handed back.
    fn abandon(&self, core: &mut AgentCore) -> usize {
        core.cancel_idle_timer();
        let jobs: Vec<JobRequest> = core.queue.drain(..).map(Job::into_request).collect();
        let migrated = jobs.len();
        if migrated > 0 {
            core.jobs_migrated += migrated as u64;
            self.bus.publish(ControlSignal::Migrate {
                worker_id: self.id.clone(),
                jobs,
            });
        }
        self.terminate_unit(core);
        self.bus.publish(ControlSignal::Replace {
            worker_id: self.id.clone(),
        });
        migrated
    }

    fn terminate_unit(&self, core: &mut AgentCore) {
        if let Some(unit) = core.unit.take() {
            unit.terminate();
        }
        core.state = AgentState::Terminated;
        if let Some(listener) = self.reply_listener.lock().take() {
            listener.abort();
        }
    }
}

impl Drop for WorkerAgent {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        core.idle_timer = None;
        if let Some(unit) = core.unit.take() {
            unit.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flock_api::protocol::JobPayload;
    use flock_api::unit::ReplySender;
    use serde_json::json;

    #[derive(Debug)]
    struct SilentUnit;

    impl ExecutionUnit for SilentUnit {
        fn post(&self, _request: UnitRequest) -> Result<(), UnitError> {
            Ok(())
        }

        fn terminate(&self) {}

        fn is_alive(&self) -> bool {
            true
        }
    }

    #[derive(Debug)]
    struct SilentFactory;

    impl UnitFactory for SilentFactory {
        fn spawn(
            &self,
            _worker: &WorkerId,
            _replies: ReplySender,
        ) -> Result<Box<dyn ExecutionUnit>, UnitError> {
            Ok(Box::new(SilentUnit))
        }
    }

    fn agent() -> Arc<WorkerAgent> {
        WorkerAgent::spawn(
            AgentConfig::default(),
            &SilentFactory,
            ControlBus::new(),
            Handle::current(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_idle_timer_does_not_terminate() {
        let agent = agent();
        let first = agent.core.lock().idle_generation;

        let (request, _handle) = JobRequest::new(JobPayload::new("add", json!([1, 2])));
        let job = agent.input(request).unwrap();
        agent.on_reply(UnitReply::success(job, json!(3)));
        assert_eq!(agent.state(), AgentState::Idle);

        // The first timer fired before the job arrived but ran late
        agent.on_idle_timeout(first);
        assert_eq!(agent.state(), AgentState::Idle);

        let current = agent.core.lock().idle_generation;
        assert!(current > first);
        agent.on_idle_timeout(current);
        assert_eq!(agent.state(), AgentState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_ignored_while_busy() {
        let agent = agent();
        let generation = agent.core.lock().idle_generation;

        let (request, _handle) = JobRequest::new(JobPayload::new("add", json!([1, 2])));
        agent.input(request).unwrap();

        agent.on_idle_timeout(generation);
        assert_eq!(agent.state(), AgentState::Active);
    }
}
