//! Task management for the worker lifecycle.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::event::{Event, EventBus};

/// How long shutdown waits for a single worker to return.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracks the spawned workers by name.
///
/// Every worker gets a child of one global cancellation token. A worker that
/// fails is reported on the event bus as [`Event::WorkerFailed`] so the
/// coordinator can bring the daemon down instead of running half-dead.
pub struct TaskManager {
    tasks: HashMap<String, JoinHandle<Result<()>>>,
    event_bus: EventBus,
    pub global_token: CancellationToken,
}

impl TaskManager {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            tasks: HashMap::new(),
            event_bus,
            global_token: CancellationToken::new(),
        }
    }

    /// Spawns and registers a worker under `name`.
    pub async fn spawn_task<F, Fut>(&mut self, name: String, task_fn: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        anyhow::ensure!(
            !self.tasks.contains_key(&name),
            "Task '{name}' is already running"
        );

        let task_token = self.global_token.child_token();
        let task_name = name.clone();
        let event_bus = self.event_bus.clone();

        let handle = tokio::spawn(async move {
            info!("Starting task: {task_name}");
            match task_fn(task_token).await {
                Ok(()) => {
                    info!("Task '{task_name}' completed successfully");
                    Ok(())
                }
                Err(e) => {
                    error!("Task '{task_name}' failed: {e:#}");
                    // Nobody listening means the coordinator is already gone.
                    let _ = event_bus.publish(Event::WorkerFailed {
                        name: task_name,
                        error: format!("{e:#}"),
                    });
                    Err(e)
                }
            }
        });

        self.tasks.insert(name.clone(), handle);
        info!("Task '{name}' spawned");
        Ok(())
    }

    /// Cancels every worker and waits for them to return.
    ///
    /// Returns the first error encountered, if any.
    pub async fn shutdown_all(&mut self) -> Result<()> {
        info!("Stopping all {} tasks", self.tasks.len());

        self.global_token.cancel();

        let mut first_error = None;
        for (name, handle) in self.tasks.drain() {
            let error = match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(Ok(()))) => continue,
                Ok(Ok(Err(e))) => {
                    warn!("Task '{name}' failed during shutdown: {e:#}");
                    e.context(format!("Task '{name}' failed"))
                }
                Ok(Err(e)) => {
                    error!("Task '{name}' panicked: {e}");
                    anyhow::anyhow!("Task '{name}' panicked: {e}")
                }
                Err(_) => {
                    error!("Task '{name}' did not stop within {SHUTDOWN_TIMEOUT:?}");
                    anyhow::anyhow!("Task '{name}' shutdown timeout exceeded")
                }
            };
            first_error.get_or_insert(error);
        }

        match first_error {
            Some(error) => Err(error).context("One or more tasks failed during shutdown"),
            None => {
                info!("All tasks stopped");
                Ok(())
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tasks.get(name).is_some_and(|handle| !handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn cancelled_tasks_shut_down_cleanly() {
        let mut manager = TaskManager::new(EventBus::new());
        for name in ["first", "second"] {
            manager
                .spawn_task(name.to_string(), |token| async move {
                    token.cancelled().await;
                    Ok(())
                })
                .await
                .unwrap();
        }

        assert_eq!(manager.active_count(), 2);
        assert!(manager.is_running("first"));

        manager.shutdown_all().await.unwrap();
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_names_rejected() {
        let mut manager = TaskManager::new(EventBus::new());
        let worker = |token: CancellationToken| async move {
            token.cancelled().await;
            Ok::<(), anyhow::Error>(())
        };

        manager.spawn_task("worker".to_string(), worker).await.unwrap();
        assert!(manager.spawn_task("worker".to_string(), worker).await.is_err());
        manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn failing_task_is_published() {
        let event_bus = EventBus::new();
        let mut events = event_bus.subscribe();
        let mut manager = TaskManager::new(event_bus);

        manager
            .spawn_task("broken".to_string(), |_token| async {
                anyhow::bail!("line 17 vanished")
            })
            .await
            .unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            Event::WorkerFailed {
                name: "broken".to_string(),
                error: "line 17 vanished".to_string(),
            }
        );
        assert!(manager.shutdown_all().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_task_times_out() {
        let mut manager = TaskManager::new(EventBus::new());
        manager
            .spawn_task("stuck".to_string(), |_token| {
                std::future::pending::<Result<()>>()
            })
            .await
            .unwrap();

        let err = manager.shutdown_all().await.unwrap_err();
        assert!(format!("{err:#}").contains("timeout"));
    }
}
