use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};

use flock_api::errors::UnitError;
use flock_api::protocol::UnitRequest;
use flock_api::types::WorkerId;
use flock_api::unit::{ExecutionUnit, ReplySender, UnitFactory};

use super::registry::FunctionRegistry;
use crate::worker_span;

/// Starts a [`ThreadUnit`] per worker, all sharing one function registry.
#[derive(Debug, Clone)]
pub struct ThreadUnitFactory {
    registry: Arc<FunctionRegistry>,
}

impl ThreadUnitFactory {
    pub fn new(registry: FunctionRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }
}

impl UnitFactory for ThreadUnitFactory {
    fn spawn(
        &self,
        worker: &WorkerId,
        replies: ReplySender,
    ) -> Result<Box<dyn ExecutionUnit>, UnitError> {
        let unit = ThreadUnit::start(worker.clone(), self.registry.clone(), replies)?;
        Ok(Box::new(unit))
    }
}

/// Execution unit backed by a dedicated OS thread.
///
/// The thread drives its own current-thread tokio runtime and runs one
/// request at a time, in arrival order. Terminating closes the request
/// channel; a job body already running is not interrupted, and its reply is
/// dropped if the owner stopped listening.
pub struct ThreadUnit {
    worker: WorkerId,
    requests: Mutex<Option<flume::Sender<UnitRequest>>>,
    alive: Arc<AtomicBool>,
}

impl fmt::Debug for ThreadUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadUnit")
            .field("worker", &self.worker)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl ThreadUnit {
    /// Spawns the unit thread.
    ///
    /// # Arguments
    /// * `worker` - Owning worker, used for the thread name and log span
    /// * `registry` - Functions the unit can run
    /// * `replies` - Where replies are sent
    pub fn start(
        worker: WorkerId,
        registry: Arc<FunctionRegistry>,
        replies: ReplySender,
    ) -> Result<Self, UnitError> {
        let (tx, rx) = flume::unbounded();
        let alive = Arc::new(AtomicBool::new(true));

        let thread_worker = worker.clone();
        let thread_alive = alive.clone();
        std::thread::Builder::new()
            .name(format!("flock-unit-{}", worker))
            .spawn(move || run_unit_thread(thread_worker, registry, rx, replies, thread_alive))
            .map_err(|e| UnitError::Spawn(e.to_string()))?;

        debug!(worker = %worker, "Execution unit thread started");
        Ok(Self {
            worker,
            requests: Mutex::new(Some(tx)),
            alive,
        })
    }
}

impl ExecutionUnit for ThreadUnit {
    fn post(&self, request: UnitRequest) -> Result<(), UnitError> {
        if !self.is_alive() {
            return Err(UnitError::Closed);
        }
        match self.requests.lock().as_ref() {
            Some(tx) => tx.send(request).map_err(|e| UnitError::Send(e.to_string())),
            None => Err(UnitError::Closed),
        }
    }

    fn terminate(&self) {
        self.alive.store(false, Ordering::Release);
        if self.requests.lock().take().is_some() {
            debug!(worker = %self.worker, "Execution unit terminated");
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl Drop for ThreadUnit {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn run_unit_thread(
    worker: WorkerId,
    registry: Arc<FunctionRegistry>,
    requests: flume::Receiver<UnitRequest>,
    replies: ReplySender,
    alive: Arc<AtomicBool>,
) {
    let span = worker_span!(worker);
    let _enter = span.enter();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to build execution unit runtime: {}", e);
            alive.store(false, Ordering::Release);
            return;
        }
    };

    runtime.block_on(async {
        while let Ok(request) = requests.recv_async().await {
            if !alive.load(Ordering::Acquire) {
                break;
            }
            let reply = registry.execute(request).await;
            if replies.send(reply).is_err() {
                debug!("Reply channel closed");
                break;
            }
        }
    });

    alive.store(false, Ordering::Release);
    debug!("Execution unit thread exited");
}
