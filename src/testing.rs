//! Recording fakes for the output devices.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::{
    display::{BlinkRate, SegmentDisplay},
    drivers::PwmChannel,
};

/// PWM channel that remembers every duty written to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingPwm(Arc<Mutex<Vec<u32>>>);

impl RecordingPwm {
    pub fn writes(&self) -> Vec<u32> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<u32> {
        self.0.lock().unwrap().last().copied()
    }
}

impl PwmChannel for RecordingPwm {
    fn set_duty(&mut self, duty: u32) -> Result<()> {
        self.0.lock().unwrap().push(duty);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Digit(usize, u8),
    Indicator(bool),
    Clear,
    Flush,
}

/// Display that records the calls made on it, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay(Arc<Mutex<Vec<Op>>>);

impl RecordingDisplay {
    /// Drains the recorded calls.
    pub fn take(&self) -> Vec<Op> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    fn push(&self, op: Op) -> Result<()> {
        self.0.lock().unwrap().push(op);
        Ok(())
    }
}

impl SegmentDisplay for RecordingDisplay {
    fn set_digit(&mut self, position: usize, value: u8, _dot: bool) -> Result<()> {
        self.push(Op::Digit(position, value))
    }

    fn set_indicator(&mut self, on: bool) -> Result<()> {
        self.push(Op::Indicator(on))
    }

    fn clear(&mut self) -> Result<()> {
        self.push(Op::Clear)
    }

    fn set_brightness(&mut self, _level: u8) -> Result<()> {
        Ok(())
    }

    fn set_blink_rate(&mut self, _rate: BlinkRate) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.push(Op::Flush)
    }
}
