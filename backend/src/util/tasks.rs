use tokio_util::task::TaskTracker;

/// Work deferred past the response, such as edge cache writes.
///
/// Spawned tasks are never detached: shutdown drains the tracker so every accepted
/// write finishes before the process exits.
#[derive(Clone, Default)]
pub struct DeferredTasks(TaskTracker);

impl DeferredTasks {
    pub fn new() -> Self {
        Self(TaskTracker::new())
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.0.spawn(async move {
            if let Err(e) = task.await {
                tracing::warn!("Deferred task failed: {e:?}");
            }
        });
    }

    /// Waits until every task spawned so far has completed. Tasks may still be spawned
    /// afterwards.
    pub async fn drain(&self) {
        self.0.close();
        self.0.wait().await;
        self.0.reopen();
    }
}
