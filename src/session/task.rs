//! Join-on-drop wrapper for session loop tasks.
//!
//! A session owns its loops through these guards: `join` gives a task a
//! bounded window to observe the stop signal and exit, and dropping a
//! guard that was never joined aborts the task so a dropped session
//! cannot leak a running loop.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

pub(crate) struct TaskGuard {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl TaskGuard {
    pub(crate) fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            handle: Some(tokio::spawn(future)),
        }
    }

    /// Wait up to `wait` for the task to finish, aborting it on timeout.
    pub(crate) async fn join(mut self, wait: Duration) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        match tokio::time::timeout(wait, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("session task '{}' ended abnormally: {}", self.name, e),
            Err(_) => {
                warn!(
                    "session task '{}' did not stop within {:?}, aborting",
                    self.name, wait
                );
                handle.abort();
            }
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            warn!("session task '{}' dropped without join, aborting", self.name);
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_join_waits_for_completion() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let guard = TaskGuard::spawn("test", async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            flag.store(true, Ordering::SeqCst);
        });
        guard.join(Duration::from_secs(1)).await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_join_aborts_on_timeout() {
        let guard = TaskGuard::spawn("stuck", async {
            std::future::pending::<()>().await;
        });
        // Must return promptly instead of hanging on the stuck task.
        tokio::time::timeout(Duration::from_secs(1), guard.join(Duration::from_millis(20)))
            .await
            .expect("join did not time out");
    }
}
