//! Service providers that start the daemon's workers.

pub mod clock_display;
pub mod light;
pub mod scheduler;
pub mod switch_monitor;
pub mod traits;

pub use clock_display::ClockDisplayServiceProvider;
pub use light::LightServiceProvider;
pub use scheduler::AlarmSchedulerServiceProvider;
pub use switch_monitor::SwitchMonitorServiceProvider;
pub use traits::{ServiceProvider, WorkerSlot};
