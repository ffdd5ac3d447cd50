use anyhow::Result;
use async_trait::async_trait;

use crate::{
    providers::traits::{ServiceProvider, WorkerSlot},
    switch::{SwitchMonitor, SwitchRole},
    task_manager::TaskManager,
};

/// Runs the debounce loop of one front-panel switch.
///
/// - **Priority**: 1 (after the controllers)
/// - **Critical**: Yes
pub struct SwitchMonitorServiceProvider {
    role: SwitchRole,
    monitor: WorkerSlot<SwitchMonitor>,
}

impl SwitchMonitorServiceProvider {
    pub fn new(monitor: SwitchMonitor) -> Self {
        Self {
            role: monitor.switch().role(),
            monitor: WorkerSlot::new(monitor),
        }
    }
}

#[async_trait]
impl ServiceProvider for SwitchMonitorServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let monitor = self.monitor.take(self.name())?;
        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| {
                monitor.run(cancel_token)
            })
            .await
    }

    fn name(&self) -> &'static str {
        match self.role {
            SwitchRole::Light => "LightSwitchMonitor",
            SwitchRole::Alarm => "AlarmSwitchMonitor",
            SwitchRole::Clock => "ClockSwitchMonitor",
        }
    }

    fn priority(&self) -> i32 {
        1
    }

    fn is_critical(&self) -> bool {
        true
    }
}
