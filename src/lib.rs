//! # sunrise_clockd
//!
//! A Linux daemon for a bedside alarm clock with a sunrise light.
//!
//! ## Features
//!
//! - **Debounced switches**: light, alarm and clock toggles on GPIO lines
//! - **Sunrise fade**: the light ramps up on an exponential curve before the alarm
//! - **Clock display**: four-digit HT16K33 LED display with an alarm indicator
//! - **Single instance**: pidfile guard with `start` and `stop` commands
//!
//! ## Architecture
//!
//! Every component runs as its own tokio task:
//! - [`SwitchMonitor`](switch::SwitchMonitor) - one per switch, debounces the raw line
//! - [`AlarmScheduler`](scheduler::AlarmScheduler) - publishes the next alarm window
//! - [`LightController`](light::LightController) - drives the PWM channel
//! - [`ClockDisplayController`](clock_display::ClockDisplayController) - drives the display
//!
//! The [`SystemCoordinator`](coordinator::SystemCoordinator) wires the switch
//! handlers to the controllers, starts the workers through service providers
//! and stops them on SIGTERM or when one of them fails.
//!
//! ## Example
//!
//! ```no_run
//! use sunrise_clockd::{application::Application, config::Config};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     Application::builder()
//!         .with_config(config)
//!         .build()?
//!         .start()
//! }
//! ```

pub mod app_context;
pub mod application;
pub mod cli;
pub mod clock_display;
pub mod config;
pub mod coordinator;
pub mod display;
pub mod drivers;
pub mod event;
pub mod instance;
pub mod light;
pub mod providers;
pub mod scheduler;
pub mod switch;
pub mod task_manager;
pub mod time_source;
pub mod wake;

#[cfg(test)]
pub(crate) mod testing;
