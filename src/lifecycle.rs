use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Tracked {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Owns every timer and background task of one page view.
///
/// `cleanup` tears all of it down and leaves the manager ready for reuse, so a
/// hide followed by a show starts from a clean slate.
pub struct Lifecycle {
    tracked: Mutex<Tracked>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            tracked: Mutex::new(Tracked {
                shutdown: CancellationToken::new(),
                tasks: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `task` in the background until it finishes or the view is cleaned up.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, like `tokio::spawn`.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tracked = self.lock();
        let shutdown = tracked.shutdown.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = task => {}
            }
        });
        tracked.tasks.retain(|h| !h.is_finished());
        tracked.tasks.push(handle);
    }

    /// `spawn` after `delay`; cleared like any other tracked task. Same
    /// runtime requirement as `spawn`.
    pub fn set_timeout<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }

    pub fn active_tasks(&self) -> usize {
        self.lock().tasks.iter().filter(|h| !h.is_finished()).count()
    }

    /// Cancel and abort everything still pending. Safe to call repeatedly.
    pub fn cleanup(&self) {
        let tasks = {
            let mut tracked = self.lock();
            tracked.shutdown.cancel();
            tracked.shutdown = CancellationToken::new();
            std::mem::take(&mut tracked.tasks)
        };

        let aborted = tasks.iter().filter(|h| !h.is_finished()).count();
        for handle in tasks {
            handle.abort();
        }
        if aborted > 0 {
            log::debug!("lifecycle cleanup: {} tasks aborted", aborted);
        }
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.cleanup();
    }
}
