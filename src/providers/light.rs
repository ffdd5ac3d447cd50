use anyhow::Result;
use async_trait::async_trait;

use crate::{
    light::LightController,
    providers::traits::{ServiceProvider, WorkerSlot},
    task_manager::TaskManager,
};

/// Drives the bedside light.
///
/// - **Priority**: 5
/// - **Critical**: Yes
pub struct LightServiceProvider {
    controller: WorkerSlot<LightController>,
}

impl LightServiceProvider {
    pub fn new(controller: LightController) -> Self {
        Self {
            controller: WorkerSlot::new(controller),
        }
    }
}

#[async_trait]
impl ServiceProvider for LightServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let controller = self.controller.take(self.name())?;
        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| {
                controller.run(cancel_token)
            })
            .await
    }

    fn name(&self) -> &'static str {
        "LightController"
    }

    fn priority(&self) -> i32 {
        5
    }

    fn is_critical(&self) -> bool {
        true
    }
}
