use std::pin::Pin;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A spawned unit of work. Wraps `JoinHandle` so controller code can read
/// like the single-threaded cooperative model the scheduling contract
/// describes (`spawn`/`done`/`await`/`awaitAny`/`sleep`/`cancel`), while
/// actually running on Tokio's multi-threaded runtime — serialization per
/// ship is enforced by the FRM handing out ownership, not by this wrapper.
#[derive(Debug)]
pub struct Task<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> Task<T> {
    pub fn done(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) -> anyhow::Result<T> {
        self.handle.await.map_err(|e| anyhow::anyhow!("task panicked: {e}"))
    }

    /// Cancellation is cooperative: the task finishes at its next `.await`
    /// suspension point after this call, it is never force-killed mid-step.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TaskRuntime;

impl TaskRuntime {
    pub fn spawn<F, T>(&self, fut: F) -> Task<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Task { handle: tokio::spawn(fut) }
    }

    pub async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Returns the index and result of whichever task finishes first; the
    /// rest are left running, handed back to the caller as `Task`s.
    pub async fn await_any<T: Send + 'static>(&self, tasks: Vec<Task<T>>) -> (usize, anyhow::Result<T>, Vec<Task<T>>) {
        let handles: Vec<JoinHandle<T>> = tasks.into_iter().map(|t| t.handle).collect();
        let pinned: Vec<_> = handles.into_iter().map(Box::pin).collect();
        let (result, index, remaining) = futures::future::select_all(pinned).await;
        let result = result.map_err(|e| anyhow::anyhow!("task panicked: {e}"));
        let remaining = remaining.into_iter().map(|handle| Task { handle: Pin::into_inner(handle) }).collect();
        (index, result, remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_spawned_task_reports_done_after_completion() {
        let rt = TaskRuntime;
        let task = rt.spawn(async { 42 });
        let result = task.join().await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn cancel_aborts_a_pending_task() {
        let rt = TaskRuntime;
        let task = rt.spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            1
        });
        task.cancel();
        assert!(task.join().await.is_err());
    }
}
