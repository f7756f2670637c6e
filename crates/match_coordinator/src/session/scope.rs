//! Task ownership for one session lifetime.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::trace;

/// Owns the background tasks started on behalf of a session: change-feed
/// pumps, matchmaking attempts, AI timers and remote writes.
///
/// Releasing the scope (or dropping it) aborts every task it still owns, so
/// nothing started for a session outlives it.
#[derive(Debug, Default)]
pub struct SessionScope {
    tasks: Vec<JoinHandle<()>>,
}

impl SessionScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|handle| !handle.is_finished());
        self.tasks.push(tokio::spawn(task));
    }

    /// Aborts everything; returns how many tasks were still running.
    pub fn release(&mut self) -> usize {
        let mut aborted = 0;
        for handle in self.tasks.drain(..) {
            if !handle.is_finished() {
                handle.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            trace!("🧹 Released {} session tasks", aborted);
        }
        aborted
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        self.release();
    }
}
