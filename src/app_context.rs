//! Hardware handles and the components built on top of them.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::{
    clock_display::ClockDisplayController,
    config::Config,
    display::SegmentDisplay,
    drivers::{Ht16k33, LinuxI2c, PwmChannel, RawInput, SysfsGpioInput, SysfsPwm},
    light::LightController,
    scheduler::AlarmScheduler,
    switch::{Switch, SwitchMonitor, SwitchRole},
    time_source::WallClock,
};

/// Opened hardware, one handle per device.
///
/// Opened before daemonizing so a missing line or bus fails the `start`
/// command itself.
pub struct Devices {
    pub light: Box<dyn RawInput>,
    pub alarm: Box<dyn RawInput>,
    pub clock: Box<dyn RawInput>,
    pub pwm: Box<dyn PwmChannel>,
    pub display: Box<dyn SegmentDisplay>,
}

impl Devices {
    /// Opens the sysfs GPIO lines, the PWM channel and the I2C display.
    pub fn open(config: &Config) -> Result<Self> {
        let input = |role: SwitchRole, line: u32| -> Result<Box<dyn RawInput>> {
            let input = SysfsGpioInput::open(line)
                .with_context(|| format!("Failed to open {role} switch on GPIO {line}"))?;
            Ok(Box::new(input))
        };
        let switches = &config.switches;
        let light = input(SwitchRole::Light, switches.light)?;
        let alarm = input(SwitchRole::Alarm, switches.alarm)?;
        let clock = input(SwitchRole::Clock, switches.clock)?;

        let pwm = SysfsPwm::open(config.pwm.chip, config.pwm.channel, config.pwm.period_ns)
            .with_context(|| {
                format!(
                    "Failed to open PWM chip {} channel {}",
                    config.pwm.chip, config.pwm.channel
                )
            })?;

        let display_cfg = &config.display;
        let bus = LinuxI2c::open(display_cfg.bus, display_cfg.address)?;
        let display = Ht16k33::new(bus, display_cfg.brightness, display_cfg.blink_rate)
            .with_context(|| {
                format!(
                    "Failed to initialise display at {:#04x} on i2c-{}",
                    display_cfg.address, display_cfg.bus
                )
            })?;

        info!("Hardware initialised");
        Ok(Self {
            light,
            alarm,
            clock,
            pwm: Box::new(pwm),
            display: Box::new(display),
        })
    }
}

/// The three front-panel switches.
#[derive(Debug, Clone)]
pub struct Switches {
    pub light: Arc<Switch>,
    pub alarm: Arc<Switch>,
    pub clock: Arc<Switch>,
}

/// Every component of the daemon, built and ready to be wired.
pub struct AppState {
    pub switches: Switches,
    pub monitors: Vec<SwitchMonitor>,
    pub scheduler: Arc<AlarmScheduler>,
    pub light: LightController,
    pub clock_display: ClockDisplayController,
}

impl AppState {
    /// Builds the components over `devices`. Each switch starts in the state
    /// its line is in right now.
    pub fn new(config: &Config, devices: Devices, clock: Arc<dyn WallClock>) -> Result<Self> {
        let Devices {
            light: mut light_input,
            alarm: mut alarm_input,
            clock: mut clock_input,
            pwm,
            display,
        } = devices;

        let min_hold = config.min_hold();
        let lines = &config.switches;
        let switch = |role: SwitchRole, line: u32, input: &mut Box<dyn RawInput>| {
            let initially_on = input
                .sample()
                .with_context(|| format!("Failed to read initial {role} switch state"))?;
            info!("{role} switch on line {line} starts {}", on_off(initially_on));
            anyhow::Ok(Arc::new(Switch::new(role, line, initially_on, min_hold)))
        };
        let switches = Switches {
            light: switch(SwitchRole::Light, lines.light, &mut light_input)?,
            alarm: switch(SwitchRole::Alarm, lines.alarm, &mut alarm_input)?,
            clock: switch(SwitchRole::Clock, lines.clock, &mut clock_input)?,
        };

        let timing = config.debounce_timing();
        let monitors = vec![
            SwitchMonitor::new(switches.light.clone(), light_input, timing),
            SwitchMonitor::new(switches.alarm.clone(), alarm_input, timing),
            SwitchMonitor::new(switches.clock.clone(), clock_input, timing),
        ];

        let schedule = config.alarm_schedule()?;
        let scheduler = Arc::new(AlarmScheduler::new(
            schedule,
            switches.alarm.clone(),
            clock.clone(),
        ));
        let light = LightController::new(
            switches.light.clone(),
            scheduler.clone(),
            clock.clone(),
            pwm,
        );
        let clock_display = ClockDisplayController::new(
            switches.clock.clone(),
            switches.alarm.clone(),
            schedule,
            clock,
            display,
        );

        Ok(Self {
            switches,
            monitors,
            scheduler,
            light,
            clock_display,
        })
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}
