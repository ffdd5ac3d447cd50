//! Four-digit clock display controller.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::Timelike;
use log::{debug, info};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    display::SegmentDisplay,
    scheduler::AlarmSchedule,
    switch::Switch,
    time_source::WallClock,
    wake::{Wait, Waker},
};

/// How long the alarm time is shown after the alarm switch goes on.
pub const PREVIEW_DURATION: Duration = Duration::from_secs(2);
pub const CLOCK_TICK: Duration = Duration::from_secs(1);

/// What the display shows. Rendering is skipped while this stays equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayFrame {
    /// `None` blanks all four digits.
    pub digits: Option<[u8; 4]>,
    pub indicator: bool,
}

impl DisplayFrame {
    pub fn time(hour: u32, minute: u32, indicator: bool) -> Self {
        let digit = |value: u32| (value % 10) as u8;
        Self {
            digits: Some([digit(hour / 10), digit(hour), digit(minute / 10), digit(minute)]),
            indicator,
        }
    }

    pub fn blank(indicator: bool) -> Self {
        Self {
            digits: None,
            indicator,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClockDisplayHandle {
    waker: Waker,
    preview_from: Arc<Mutex<Option<Instant>>>,
}

impl ClockDisplayHandle {
    pub fn wake(&self) {
        self.waker.wake();
    }

    /// Starts the alarm time preview now.
    pub fn show_alarm_preview(&self) {
        *self.preview_lock() = Some(Instant::now());
        self.waker.wake();
    }

    fn preview_lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.preview_from.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ClockDisplayController {
    clock_switch: Arc<Switch>,
    alarm_switch: Arc<Switch>,
    schedule: AlarmSchedule,
    clock: Arc<dyn WallClock>,
    display: Box<dyn SegmentDisplay>,
    handle: ClockDisplayHandle,
    last_frame: Option<DisplayFrame>,
}

impl ClockDisplayController {
    pub fn new(
        clock_switch: Arc<Switch>,
        alarm_switch: Arc<Switch>,
        schedule: AlarmSchedule,
        clock: Arc<dyn WallClock>,
        display: Box<dyn SegmentDisplay>,
    ) -> Self {
        Self {
            clock_switch,
            alarm_switch,
            schedule,
            clock,
            display,
            handle: ClockDisplayHandle::default(),
            last_frame: None,
        }
    }

    pub fn handle(&self) -> ClockDisplayHandle {
        self.handle.clone()
    }

    pub fn frame(&self) -> Option<DisplayFrame> {
        self.last_frame
    }

    /// Picks and renders the frame for `now`: alarm preview, then the time
    /// of day, then blank. The colon tracks the alarm switch.
    pub fn evaluate(&mut self, now: Instant) -> Result<Wait> {
        let armed = self.alarm_switch.is_on();

        if let Some(remaining) = self.preview_remaining(now, armed) {
            let frame = DisplayFrame::time(self.schedule.hour(), self.schedule.minute(), true);
            self.render(frame)?;
            return Ok(Wait::For(remaining));
        }

        if self.clock_switch.is_on() {
            let time = self.clock.now();
            self.render(DisplayFrame::time(time.hour(), time.minute(), armed))?;
            Ok(Wait::For(CLOCK_TICK))
        } else {
            self.render(DisplayFrame::blank(armed))?;
            Ok(Wait::Indefinitely)
        }
    }

    fn preview_remaining(&self, now: Instant, armed: bool) -> Option<Duration> {
        let mut preview_from = self.handle.preview_lock();
        let started = (*preview_from)?;
        let elapsed = now.saturating_duration_since(started);
        if armed && elapsed < PREVIEW_DURATION {
            Some(PREVIEW_DURATION - elapsed)
        } else {
            *preview_from = None;
            None
        }
    }

    fn render(&mut self, frame: DisplayFrame) -> Result<()> {
        if self.last_frame == Some(frame) {
            return Ok(());
        }
        match frame.digits {
            Some(digits) => {
                for (position, value) in digits.into_iter().enumerate() {
                    self.display.set_digit(position, value, false)?;
                }
            }
            None => self.display.clear()?,
        }
        self.display.set_indicator(frame.indicator)?;
        self.display.flush().context("Failed to update clock display")?;
        debug!("Display frame {frame:?}");
        self.last_frame = Some(frame);
        Ok(())
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            let wait = self.evaluate(Instant::now())?;
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = self.handle.waker.sleep(wait) => {}
            }
        }
        self.display.clear()?;
        self.display.flush().context("Failed to blank clock display")?;
        info!("Clock display stopped, display blank");
        Ok(())
    }
}
