use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A single-shot task that runs `action` after a delay unless cancelled.
///
/// Cancelling (or dropping) aborts the sleeping task. An action that already
/// started is not interrupted, so actions must re-check the state they act on.
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

impl ScheduledTask {
    pub fn schedule<F, Fut>(runtime: &Handle, delay: Duration, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            action().await;
        });
        Self { handle }
    }

    pub fn cancel(self) {
        // Drop aborts
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
