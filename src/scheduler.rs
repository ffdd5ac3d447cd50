//! Alarm window arithmetic and the scheduler worker.
//!
//! The scheduler publishes the current [`AlarmWindow`] on a watch channel:
//! `Some` while the alarm switch is armed, `None` otherwise. It recomputes on
//! request (alarm switch transitions) and on its own shortly after each alarm
//! instant so the window rolls over to the next day.

use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use log::info;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    switch::Switch,
    time_source::{WallClock, until},
    wake::{Wait, Waker},
};

/// Delay after an alarm instant before the next day's window is computed.
pub const RESCHEDULE_GRACE: Duration = Duration::from_secs(10);

/// Configured alarm time of day and fade length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmSchedule {
    alarm_time: NaiveTime,
    sunrise_duration: Duration,
}

impl AlarmSchedule {
    pub fn new(hour: u32, minute: u32, sunrise_duration: Duration) -> Result<Self> {
        let alarm_time = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow!("Invalid alarm time {hour:02}:{minute:02}"))?;
        Ok(Self {
            alarm_time,
            sunrise_duration,
        })
    }

    pub fn hour(&self) -> u32 {
        self.alarm_time.hour()
    }

    pub fn minute(&self) -> u32 {
        self.alarm_time.minute()
    }

    pub fn sunrise_duration(&self) -> Duration {
        self.sunrise_duration
    }

    fn sunrise_span(&self) -> TimeDelta {
        TimeDelta::from_std(self.sunrise_duration).unwrap_or(TimeDelta::zero())
    }
}

/// One concrete alarm occurrence and the start of its sunrise fade.
///
/// `sunrise_start <= alarm_at` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmWindow {
    pub alarm_at: NaiveDateTime,
    pub sunrise_start: NaiveDateTime,
}

impl AlarmWindow {
    pub fn is_sunrise_active(&self, now: NaiveDateTime) -> bool {
        self.sunrise_start <= now && now < self.alarm_at
    }

    /// Progress of the fade at `now`, clamped to `0.0..=1.0`.
    pub fn sunrise_fraction(&self, now: NaiveDateTime) -> f64 {
        let total = (self.alarm_at - self.sunrise_start).num_milliseconds();
        if total <= 0 {
            return 1.0;
        }
        let elapsed = (now - self.sunrise_start).num_milliseconds();
        (elapsed as f64 / total as f64).clamp(0.0, 1.0)
    }
}

/// Next alarm window as seen from `now`.
///
/// Uses today's alarm unless its sunrise would already have started, in
/// which case the same time tomorrow is used.
pub fn next_window(now: NaiveDateTime, schedule: &AlarmSchedule) -> AlarmWindow {
    let span = schedule.sunrise_span();
    let today = now.date();
    let candidate = today.and_time(schedule.alarm_time);
    let alarm_at = if candidate - span < now {
        today
            .succ_opt()
            .unwrap_or(today)
            .and_time(schedule.alarm_time)
    } else {
        candidate
    };
    AlarmWindow {
        alarm_at,
        sunrise_start: alarm_at - span,
    }
}

pub struct AlarmScheduler {
    schedule: AlarmSchedule,
    alarm_switch: Arc<Switch>,
    clock: Arc<dyn WallClock>,
    window: watch::Sender<Option<AlarmWindow>>,
    waker: Waker,
}

impl AlarmScheduler {
    pub fn new(
        schedule: AlarmSchedule,
        alarm_switch: Arc<Switch>,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        let (window, _) = watch::channel(None);
        Self {
            schedule,
            alarm_switch,
            clock,
            window,
            waker: Waker::new(),
        }
    }

    /// Waking this makes the worker recompute the window right away.
    pub fn waker(&self) -> Waker {
        self.waker.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AlarmWindow>> {
        self.window.subscribe()
    }

    /// Current window, `None` while disarmed.
    pub fn window(&self) -> Option<AlarmWindow> {
        *self.window.borrow()
    }

    pub fn is_armed(&self) -> bool {
        self.alarm_switch.is_on()
    }

    pub fn is_sunrise_active(&self, now: NaiveDateTime) -> bool {
        self.active_window(now).is_some()
    }

    pub fn sunrise_fraction(&self, now: NaiveDateTime) -> f64 {
        self.window().map_or(0.0, |window| window.sunrise_fraction(now))
    }

    /// The current window if the alarm is armed and its fade is running.
    pub fn active_window(&self, now: NaiveDateTime) -> Option<AlarmWindow> {
        self.window()
            .filter(|window| self.is_armed() && window.is_sunrise_active(now))
    }

    /// Recomputes and publishes the window from the alarm switch state.
    pub fn recompute(&self) -> Option<AlarmWindow> {
        let window = self
            .is_armed()
            .then(|| next_window(self.clock.now(), &self.schedule));

        let changed = self.window.send_if_modified(|current| {
            let changed = *current != window;
            *current = window;
            changed
        });
        if changed {
            match window {
                Some(w) => info!(
                    "Next alarm at {}, sunrise from {}",
                    w.alarm_at, w.sunrise_start
                ),
                None => info!("Alarm disarmed"),
            }
        }
        window
    }

    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        loop {
            let wait = match self.recompute() {
                Some(window) => {
                    Wait::For(until(self.clock.now(), window.alarm_at) + RESCHEDULE_GRACE)
                }
                None => Wait::Indefinitely,
            };
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Alarm scheduler cancelled");
                    break;
                }
                _ = self.waker.sleep(wait) => {}
            }
        }
        Ok(())
    }
}
