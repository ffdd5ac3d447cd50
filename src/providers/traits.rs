use std::sync::{Mutex, PoisonError};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::task_manager::TaskManager;

/// Trait for services that can be started through TaskManager.
///
/// # Example
///
/// ```no_run
/// use sunrise_clockd::providers::traits::ServiceProvider;
/// use sunrise_clockd::task_manager::TaskManager;
/// use anyhow::Result;
///
/// struct ExampleService;
///
/// #[async_trait::async_trait]
/// impl ServiceProvider for ExampleService {
///     async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
///         task_manager.spawn_task("example".to_string(), |token| async move {
///             token.cancelled().await;
///             Ok(())
///         }).await
///     }
///
///     fn name(&self) -> &'static str { "ExampleService" }
///     fn priority(&self) -> i32 { 5 }
///     fn is_critical(&self) -> bool { false }
/// }
/// ```
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Starts the service in TaskManager.
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()>;

    /// Returns service name for logging and management.
    fn name(&self) -> &'static str;

    /// Returns startup priority (higher numbers start first).
    fn priority(&self) -> i32 {
        0
    }

    /// Indicates if service is critical for system operation.
    fn is_critical(&self) -> bool {
        false
    }
}

/// Holds a worker that runs by value until its service is started.
pub struct WorkerSlot<W>(Mutex<Option<W>>);

impl<W> WorkerSlot<W> {
    pub fn new(worker: W) -> Self {
        Self(Mutex::new(Some(worker)))
    }

    /// Takes the worker out. A service can only be started once.
    pub fn take(&self, service: &str) -> Result<W> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| anyhow!("Service '{service}' was already started"))
    }
}
