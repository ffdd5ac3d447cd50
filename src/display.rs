//! Segment display abstraction.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Hardware blink rate of the whole display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlinkRate {
    #[default]
    Off,
    TwoHz,
    OneHz,
    HalfHz,
}

impl BlinkRate {
    /// Two-bit blink field of the display setup command.
    pub fn bits(self) -> u8 {
        match self {
            BlinkRate::Off => 0x00,
            BlinkRate::TwoHz => 0x01,
            BlinkRate::OneHz => 0x02,
            BlinkRate::HalfHz => 0x03,
        }
    }
}

/// Four-digit seven-segment display with a colon indicator.
///
/// Digit and indicator changes are buffered until [`flush`](Self::flush).
///
/// # Example
///
/// ```no_run
/// use sunrise_clockd::display::SegmentDisplay;
///
/// fn show_1234(display: &mut dyn SegmentDisplay) -> anyhow::Result<()> {
///     for (position, value) in [1, 2, 3, 4].into_iter().enumerate() {
///         display.set_digit(position, value, false)?;
///     }
///     display.set_indicator(true)?;
///     display.flush()
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait SegmentDisplay: Send {
    /// Sets digit `position` (0..=3) to `value` (0..=15, shown as hex).
    fn set_digit(&mut self, position: usize, value: u8, dot: bool) -> Result<()>;

    /// Lights or clears the colon indicator.
    fn set_indicator(&mut self, on: bool) -> Result<()>;

    /// Blanks all digits and the indicator.
    fn clear(&mut self) -> Result<()>;

    /// Global brightness, 0..=15. Applied immediately.
    fn set_brightness(&mut self, level: u8) -> Result<()>;

    /// Global blink rate. Applied immediately.
    fn set_blink_rate(&mut self, rate: BlinkRate) -> Result<()>;

    /// Pushes buffered digits and indicator to the hardware.
    fn flush(&mut self) -> Result<()>;
}
