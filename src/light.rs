//! Bedside light PWM controller.
//!
//! Priority of the three states: light switch on, then a running sunrise
//! fade, then off. A fade that runs to completion keeps the light at full
//! brightness until the next light or alarm switch transition.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{debug, info, trace};
use tokio_util::sync::CancellationToken;

use crate::{
    drivers::{PwmChannel, pwm::MAX_DUTY},
    scheduler::{AlarmScheduler, AlarmWindow},
    switch::Switch,
    time_source::{WallClock, until},
    wake::{Wait, Waker},
};

/// Re-evaluation interval while a fade is running.
pub const SUNRISE_STEP: Duration = Duration::from_secs(1);

/// Duty for a fade at `fraction` of its length.
///
/// Exponential in the fraction so the ramp looks linear to the eye, and never
/// fully dark once the fade has begun.
pub fn sunrise_duty(fraction: f64) -> u32 {
    let exponent = 14.0 * fraction.clamp(0.0, 1.0);
    let duty = 2f64.powf(exponent).floor() as u32 + 1;
    duty.clamp(1, MAX_DUTY)
}

/// Cheap handle other workers use to poke the light controller.
#[derive(Debug, Clone, Default)]
pub struct LightHandle {
    waker: Waker,
    interrupted: Arc<AtomicBool>,
}

impl LightHandle {
    pub fn wake(&self) {
        self.waker.wake();
    }

    /// Reports a light or alarm switch transition, which ends a post-sunrise hold.
    pub fn switch_changed(&self) {
        self.interrupted.store(true, Ordering::Release);
        self.waker.wake();
    }
}

pub struct LightController {
    light_switch: Arc<Switch>,
    scheduler: Arc<AlarmScheduler>,
    clock: Arc<dyn WallClock>,
    pwm: Box<dyn PwmChannel>,
    handle: LightHandle,
    last_duty: Option<u32>,
    fading: Option<AlarmWindow>,
    holding: bool,
}

impl LightController {
    pub fn new(
        light_switch: Arc<Switch>,
        scheduler: Arc<AlarmScheduler>,
        clock: Arc<dyn WallClock>,
        pwm: Box<dyn PwmChannel>,
    ) -> Self {
        Self {
            light_switch,
            scheduler,
            clock,
            pwm,
            handle: LightHandle::default(),
            last_duty: None,
            fading: None,
            holding: false,
        }
    }

    pub fn handle(&self) -> LightHandle {
        self.handle.clone()
    }

    /// Last duty actually written to the channel.
    pub fn duty(&self) -> Option<u32> {
        self.last_duty
    }

    /// Computes and applies the duty for the current state.
    ///
    /// Returns how long the worker may sleep before evaluating again.
    pub fn evaluate(&mut self) -> Result<Wait> {
        if self.handle.interrupted.swap(false, Ordering::AcqRel) && self.holding {
            info!("Sunrise hold released");
            self.holding = false;
        }

        let now = self.clock.now();

        if self.light_switch.is_on() {
            // A fade overridden by the light switch never ends in a hold.
            if self.fading.take().is_some() {
                info!("Sunrise overridden by light switch");
            }
            self.holding = false;
            self.write(MAX_DUTY)?;
            return Ok(Wait::Indefinitely);
        }

        if let Some(window) = self.scheduler.active_window(now) {
            if self.fading != Some(window) {
                info!("Sunrise started, alarm at {}", window.alarm_at);
                self.fading = Some(window);
            }
            self.write(sunrise_duty(window.sunrise_fraction(now)))?;
            return Ok(Wait::For(SUNRISE_STEP.min(until(now, window.alarm_at))));
        }

        if let Some(window) = self.fading.take() {
            if now >= window.alarm_at {
                info!("Sunrise complete at {}", window.alarm_at);
                self.holding = true;
            } else {
                info!("Sunrise interrupted");
            }
        }

        self.write(if self.holding { MAX_DUTY } else { 0 })?;
        Ok(self.until_next_sunrise(now))
    }

    fn until_next_sunrise(&self, now: NaiveDateTime) -> Wait {
        match self.scheduler.window() {
            Some(window) if self.scheduler.is_armed() && now < window.sunrise_start => {
                Wait::For(until(now, window.sunrise_start))
            }
            _ => Wait::Indefinitely,
        }
    }

    fn write(&mut self, duty: u32) -> Result<()> {
        if self.last_duty == Some(duty) {
            return Ok(());
        }
        self.pwm
            .set_duty(duty)
            .with_context(|| format!("Failed to set light duty to {duty}"))?;
        trace!("Light duty {duty}");
        self.last_duty = Some(duty);
        Ok(())
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut windows = self.scheduler.subscribe();
        loop {
            let wait = self.evaluate()?;
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = self.handle.waker.sleep(wait) => {}
                changed = windows.changed() => {
                    changed.context("Alarm window channel closed")?;
                    debug!("Light controller saw a new alarm window");
                }
            }
        }
        self.pwm.set_duty(0).context("Failed to turn light off")?;
        info!("Light controller stopped, light off");
        Ok(())
    }
}
