//! # Jobs and Result Delivery
//!
//! A submitted job is a [`JobRequest`]: the payload to run and the
//! [`ResultSink`] its outcome is delivered to. The caller keeps the matching
//! [`JobHandle`]. Once a worker accepts the request it becomes a queued
//! [`Job`] with an id local to that worker.
//!
//! The sink is shared, not moved, when a job is migrated: the request travels
//! over the control bus with the same sink, so the caller's handle resolves
//! wherever the job finally runs. A sink delivers at most once; later
//! resolutions are ignored.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use flock_api::errors::JobError;
use flock_api::protocol::JobPayload;
use flock_api::types::{JobId, JobResult};

use crate::timer::ScheduledTask;

type JobSender = oneshot::Sender<JobResult<Value>>;

/// Write side of a job's one-shot result channel.
#[derive(Clone)]
pub struct ResultSink {
    slot: Arc<Mutex<Option<JobSender>>>,
}

impl fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSink")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl ResultSink {
    /// Creates a sink and the handle it resolves.
    pub fn channel() -> (ResultSink, JobHandle) {
        let (tx, rx) = oneshot::channel();
        let sink = ResultSink {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (sink, JobHandle { receiver: rx })
    }

    /// A sink nobody is waiting on, for jobs that arrive without a caller.
    pub fn detached() -> ResultSink {
        let (sink, handle) = Self::channel();
        drop(handle);
        sink
    }

    /// Delivers `result`. Returns `false` if a result was already delivered
    /// or the caller stopped waiting.
    pub fn resolve(&self, result: JobResult<Value>) -> bool {
        let sender = self.slot.lock().take();
        match sender {
            Some(tx) => match tx.send(result) {
                Ok(()) => true,
                Err(_) => {
                    debug!("Job result dropped, caller is no longer waiting");
                    false
                }
            },
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.lock().is_none()
    }
}

/// Caller side of a submitted job; resolves to the job's result.
#[derive(Debug)]
pub struct JobHandle {
    receiver: oneshot::Receiver<JobResult<Value>>,
}

impl Future for JobHandle {
    type Output = JobResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(JobError::Lost)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A job looking for a worker.
#[derive(Clone, Debug)]
pub struct JobRequest {
    pub payload: JobPayload,
    pub sink: ResultSink,
}

impl JobRequest {
    pub fn new(payload: JobPayload) -> (JobRequest, JobHandle) {
        let (sink, handle) = ResultSink::channel();
        (JobRequest { payload, sink }, handle)
    }

    /// Fails the request without running it.
    pub fn reject(self, error: JobError) {
        self.sink.resolve(Err(error));
    }
}

/// A job queued on a worker.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub request: JobRequest,
    /// Armed the first time the job is dispatched as queue head.
    pub migration_timer: Option<ScheduledTask>,
}

impl Job {
    pub fn new(id: JobId, request: JobRequest) -> Self {
        Self {
            id,
            request,
            migration_timer: None,
        }
    }

    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.migration_timer.take() {
            timer.cancel();
        }
    }

    /// Drops the worker-local parts, leaving what can be placed elsewhere.
    pub fn into_request(mut self) -> JobRequest {
        self.cancel_timer();
        self.request
    }
}
