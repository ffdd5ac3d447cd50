//! Linux hardware collaborators: sysfs GPIO inputs, sysfs PWM output and the
//! HT16K33 LED backpack on I2C.

pub mod gpio;
pub mod ht16k33;
pub mod pwm;

pub use gpio::{RawInput, SysfsGpioInput};
pub use ht16k33::{Ht16k33, bus_io::LinuxI2c};
pub use pwm::{PwmChannel, SysfsPwm};
