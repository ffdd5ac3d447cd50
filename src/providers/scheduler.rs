use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    providers::traits::ServiceProvider, scheduler::AlarmScheduler, task_manager::TaskManager,
};

/// Keeps the alarm window current.
///
/// - **Priority**: 10 (highest)
/// - **Critical**: Yes
pub struct AlarmSchedulerServiceProvider {
    scheduler: Arc<AlarmScheduler>,
}

impl AlarmSchedulerServiceProvider {
    pub fn new(scheduler: Arc<AlarmScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl ServiceProvider for AlarmSchedulerServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let scheduler = self.scheduler.clone();
        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| {
                scheduler.run(cancel_token)
            })
            .await
    }

    fn name(&self) -> &'static str {
        "AlarmScheduler"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_critical(&self) -> bool {
        true
    }
}
