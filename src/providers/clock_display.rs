use anyhow::Result;
use async_trait::async_trait;

use crate::{
    clock_display::ClockDisplayController,
    providers::traits::{ServiceProvider, WorkerSlot},
    task_manager::TaskManager,
};

/// Drives the four-digit display.
///
/// - **Priority**: 4
/// - **Critical**: Yes
pub struct ClockDisplayServiceProvider {
    controller: WorkerSlot<ClockDisplayController>,
}

impl ClockDisplayServiceProvider {
    pub fn new(controller: ClockDisplayController) -> Self {
        Self {
            controller: WorkerSlot::new(controller),
        }
    }
}

#[async_trait]
impl ServiceProvider for ClockDisplayServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let controller = self.controller.take(self.name())?;
        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| {
                controller.run(cancel_token)
            })
            .await
    }

    fn name(&self) -> &'static str {
        "ClockDisplay"
    }

    fn priority(&self) -> i32 {
        4
    }

    fn is_critical(&self) -> bool {
        true
    }
}
