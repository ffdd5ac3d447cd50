use crate::display::BlinkRate;

/// Segment patterns for 0-9 and A-F.
pub const DIGITS: [u8; 16] = [
    0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F, 0x77, 0x7C, 0x39, 0x5E, 0x79, 0x71,
];

/// Decimal point segment bit.
pub const DOT: u8 = 0x80;

/// Colon pattern in the colon row.
pub const COLON: u8 = 0x02;

/// Display RAM rows backing digit positions 0..=3. Row 2 is the colon.
pub const DIGIT_ROWS: [usize; 4] = [0, 1, 3, 4];
pub const COLON_ROW: usize = 2;
pub const ROWS: usize = 5;

/// Maximum dimming level.
pub const MAX_BRIGHTNESS: u8 = 15;

const SYSTEM_SETUP: u8 = 0x20;
const DISPLAY_SETUP: u8 = 0x80;
const DIMMING: u8 = 0xE0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Oscillator { on: bool },
    Display { on: bool, blink: BlinkRate },
    Dimming { level: u8 },
    WriteRows { rows: [u8; ROWS] },
}

impl Command {
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            Command::Oscillator { on } => vec![SYSTEM_SETUP | u8::from(on)],
            Command::Display { on, blink } => {
                vec![DISPLAY_SETUP | u8::from(on) | (blink.bits() << 1)]
            }
            Command::Dimming { level } => vec![DIMMING | level.min(MAX_BRIGHTNESS)],
            Command::WriteRows { ref rows } => {
                // Address pointer 0, then each 16-bit row low byte first.
                let mut buf = Vec::with_capacity(1 + 2 * ROWS);
                buf.push(0x00);
                for &row in rows {
                    buf.extend_from_slice(&[row, 0x00]);
                }
                buf
            }
        }
    }
}

/// Segment pattern for `value` with optional decimal point.
pub fn segments(value: u8, dot: bool) -> Option<u8> {
    DIGITS
        .get(usize::from(value))
        .map(|&pattern| if dot { pattern | DOT } else { pattern })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn setup_commands() {
        assert_eq!(Command::Oscillator { on: true }.to_bytes(), vec![0x21]);
        assert_eq!(
            Command::Display {
                on: true,
                blink: BlinkRate::Off
            }
            .to_bytes(),
            vec![0x81]
        );
        assert_eq!(
            Command::Display {
                on: true,
                blink: BlinkRate::HalfHz
            }
            .to_bytes(),
            vec![0x87]
        );
        assert_eq!(Command::Dimming { level: 40 }.to_bytes(), vec![0xEF]);
    }

    #[test]
    fn write_rows_layout() {
        let bytes = Command::WriteRows {
            rows: [0x06, 0x5B, COLON, 0x4F, 0x66],
        }
        .to_bytes();
        assert_eq!(
            bytes,
            vec![0x00, 0x06, 0x00, 0x5B, 0x00, 0x02, 0x00, 0x4F, 0x00, 0x66, 0x00]
        );
    }

    #[test]
    fn segments_with_dot() {
        assert_eq!(segments(8, false), Some(0x7F));
        assert_eq!(segments(8, true), Some(0xFF));
        assert_eq!(segments(0xF, false), Some(0x71));
        assert_eq!(segments(16, false), None);
    }
}
