//! HT16K33 driven 4-digit seven-segment backpack.

pub mod bus_io;
pub mod protocol;

use anyhow::{Result, bail};
use log::info;

use self::{
    bus_io::I2cBus,
    protocol::{COLON, COLON_ROW, Command, DIGIT_ROWS, ROWS, segments},
};
use crate::display::{BlinkRate, SegmentDisplay};

/// Default I2C address of the backpack.
pub const DEFAULT_ADDRESS: u16 = 0x70;

/// Display RAM shadow plus the bus it is flushed to.
#[derive(Debug)]
pub struct Ht16k33<B: I2cBus> {
    bus: B,
    rows: [u8; ROWS],
}

impl<B: I2cBus> Ht16k33<B> {
    /// Starts the oscillator, applies blink rate and brightness and blanks
    /// the display.
    pub fn new(bus: B, brightness: u8, blink: BlinkRate) -> Result<Self> {
        let mut display = Self {
            bus,
            rows: [0; ROWS],
        };
        display.send(Command::Oscillator { on: true })?;
        display.set_blink_rate(blink)?;
        display.set_brightness(brightness)?;
        display.flush()?;
        info!("HT16K33 initialized (brightness {brightness}, blink {blink:?})");
        Ok(display)
    }

    fn send(&mut self, cmd: Command) -> Result<()> {
        self.bus.write(&cmd.to_bytes())
    }
}

impl<B: I2cBus> SegmentDisplay for Ht16k33<B> {
    fn set_digit(&mut self, position: usize, value: u8, dot: bool) -> Result<()> {
        let Some(&row) = DIGIT_ROWS.get(position) else {
            bail!("Digit position {position} out of range");
        };
        let Some(pattern) = segments(value, dot) else {
            bail!("Digit value {value} out of range");
        };
        self.rows[row] = pattern;
        Ok(())
    }

    fn set_indicator(&mut self, on: bool) -> Result<()> {
        self.rows[COLON_ROW] = if on { COLON } else { 0 };
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.rows = [0; ROWS];
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) -> Result<()> {
        self.send(Command::Dimming { level })
    }

    fn set_blink_rate(&mut self, rate: BlinkRate) -> Result<()> {
        self.send(Command::Display {
            on: true,
            blink: rate,
        })
    }

    fn flush(&mut self) -> Result<()> {
        let rows = self.rows;
        self.send(Command::WriteRows { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturedBus(Arc<Mutex<Vec<Vec<u8>>>>);

    impl I2cBus for CapturedBus {
        fn write(&mut self, bytes: &[u8]) -> Result<()> {
            self.0.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    impl CapturedBus {
        fn writes(&self) -> Vec<Vec<u8>> {
            self.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn init_sequence() {
        let bus = CapturedBus::default();
        Ht16k33::new(bus.clone(), 15, BlinkRate::Off).unwrap();

        assert_eq!(
            bus.writes(),
            vec![
                vec![0x21],
                vec![0x81],
                vec![0xEF],
                vec![0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            ]
        );
    }

    #[test]
    fn digits_and_colon_land_in_their_rows() {
        let bus = CapturedBus::default();
        let mut display = Ht16k33::new(bus.clone(), 8, BlinkRate::Off).unwrap();

        for (position, value) in [0, 7, 3, 0].into_iter().enumerate() {
            display.set_digit(position, value, false).unwrap();
        }
        display.set_indicator(true).unwrap();
        display.flush().unwrap();

        assert_eq!(
            bus.writes().last().unwrap(),
            &vec![0x00, 0x3F, 0x00, 0x07, 0x00, 0x02, 0x00, 0x4F, 0x00, 0x3F, 0x00]
        );
    }

    #[test]
    fn clear_blanks_everything() {
        let bus = CapturedBus::default();
        let mut display = Ht16k33::new(bus.clone(), 8, BlinkRate::Off).unwrap();

        display.set_digit(1, 9, true).unwrap();
        display.set_indicator(true).unwrap();
        display.clear().unwrap();
        display.flush().unwrap();

        assert_eq!(bus.writes().last().unwrap()[1..].to_vec(), vec![0u8; 10]);
    }

    #[test]
    fn out_of_range_digit_is_rejected() {
        let mut display = Ht16k33::new(CapturedBus::default(), 8, BlinkRate::Off).unwrap();

        assert!(display.set_digit(4, 1, false).is_err());
        assert!(display.set_digit(0, 16, false).is_err());
    }
}
