//! Worker that turns edge notifications from a raw input line into accepted
//! samples for a [`Switch`].

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{info, trace};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::Switch;
use crate::drivers::RawInput;

/// Timing knobs of the debounce loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTiming {
    /// Settle time between an edge notification and the sample taken for it.
    pub poll_interval: Duration,
    /// Upper bound on a single wait for an edge.
    pub wait_timeout: Duration,
}

impl Default for DebounceTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            wait_timeout: Duration::from_secs(1),
        }
    }
}

/// Owns one input line and feeds its switch.
pub struct SwitchMonitor {
    switch: Arc<Switch>,
    input: Box<dyn RawInput>,
    timing: DebounceTiming,
    last_sample: bool,
}

impl SwitchMonitor {
    pub fn new(switch: Arc<Switch>, input: Box<dyn RawInput>, timing: DebounceTiming) -> Self {
        let last_sample = switch.is_on();
        Self {
            switch,
            input,
            timing,
            last_sample,
        }
    }

    pub fn switch(&self) -> &Arc<Switch> {
        &self.switch
    }

    /// Waits until a sample is accepted and returns it.
    ///
    /// After an edge the line is given [`DebounceTiming::poll_interval`] to
    /// settle, then sampled. The sample is accepted if it differs from the
    /// last accepted one, or if the switch was forced since. A wait that
    /// times out resamples the line too, but only a real difference is
    /// accepted then, so a forced state survives until the next edge.
    pub async fn next_sample(&mut self) -> Result<bool> {
        let role = self.switch.role();
        let line = self.switch.line();
        loop {
            let edge = self
                .input
                .wait_for_edge(self.timing.wait_timeout)
                .await
                .with_context(|| format!("Failed waiting on {role} switch (line {line})"))?;

            if edge {
                tokio::time::sleep(self.timing.poll_interval).await;
            } else {
                trace!("{role} switch: no edge within {:?}", self.timing.wait_timeout);
            }

            let sample = self
                .input
                .sample()
                .with_context(|| format!("Failed to sample {role} switch (line {line})"))?;
            let forced = edge && self.switch.take_override();

            if sample != self.last_sample || forced {
                self.last_sample = sample;
                return Ok(sample);
            }
        }
    }

    /// Runs the debounce loop until cancelled or the line fails.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!(
            "Monitoring {} switch on line {}",
            self.switch.role(),
            self.switch.line()
        );
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("{} switch monitor cancelled", self.switch.role());
                    break;
                }
                sample = self.next_sample() => {
                    self.switch.apply_sample(sample?, Instant::now());
                }
            }
        }
        Ok(())
    }
}
