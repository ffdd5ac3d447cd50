use std::path::{Path, PathBuf};

use anyhow::Result;
use log::info;

use super::gpio::write_attr;

/// Sysfs PWM class directory.
pub const PWM_ROOT: &str = "/sys/class/pwm";

/// Full-scale duty value accepted by [`PwmChannel::set_duty`].
pub const MAX_DUTY: u32 = 1 << 14;

/// Dimmable output channel.
#[cfg_attr(test, mockall::automock)]
pub trait PwmChannel: Send {
    /// Sets the duty value, `0..=MAX_DUTY`. Larger values are clamped.
    fn set_duty(&mut self, duty: u32) -> Result<()>;
}

/// PWM channel driven through `/sys/class/pwm`.
#[derive(Debug)]
pub struct SysfsPwm {
    channel_dir: PathBuf,
    period_ns: u64,
}

impl SysfsPwm {
    pub fn open(chip: u32, channel: u32, period_ns: u64) -> Result<Self> {
        Self::open_at(Path::new(PWM_ROOT), chip, channel, period_ns)
    }

    /// Exports the channel, programs its period and enables it at zero duty.
    pub fn open_at(root: &Path, chip: u32, channel: u32, period_ns: u64) -> Result<Self> {
        let chip_dir = root.join(format!("pwmchip{chip}"));
        let channel_dir = chip_dir.join(format!("pwm{channel}"));
        if !channel_dir.exists() {
            write_attr(&chip_dir.join("export"), &channel.to_string())?;
        }

        write_attr(&channel_dir.join("duty_cycle"), "0")?;
        write_attr(&channel_dir.join("period"), &period_ns.to_string())?;
        write_attr(&channel_dir.join("enable"), "1")?;

        info!("PWM chip {chip} channel {channel} enabled, period {period_ns} ns");
        Ok(Self {
            channel_dir,
            period_ns,
        })
    }
}

impl PwmChannel for SysfsPwm {
    fn set_duty(&mut self, duty: u32) -> Result<()> {
        let ns = duty_to_ns(duty, self.period_ns);
        write_attr(&self.channel_dir.join("duty_cycle"), &ns.to_string())
    }
}

/// Converts a duty value to the on-time in nanoseconds for `period_ns`.
pub fn duty_to_ns(duty: u32, period_ns: u64) -> u64 {
    period_ns * u64::from(duty.min(MAX_DUTY)) / u64::from(MAX_DUTY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn duty_scales_to_period() {
        assert_eq!(duty_to_ns(0, 1_000_000), 0);
        assert_eq!(duty_to_ns(MAX_DUTY, 1_000_000), 1_000_000);
        assert_eq!(duty_to_ns(MAX_DUTY / 2, 1_000_000), 500_000);
        assert_eq!(duty_to_ns(MAX_DUTY * 4, 1_000_000), 1_000_000);
    }

    #[test]
    fn open_programs_channel_and_writes_duty() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("pwmchip0/pwm0");
        fs::create_dir_all(&dir).unwrap();

        let mut pwm = SysfsPwm::open_at(root.path(), 0, 0, 20_000).unwrap();
        assert_eq!(fs::read_to_string(dir.join("period")).unwrap(), "20000");
        assert_eq!(fs::read_to_string(dir.join("enable")).unwrap(), "1");
        assert_eq!(fs::read_to_string(dir.join("duty_cycle")).unwrap(), "0");

        pwm.set_duty(MAX_DUTY).unwrap();
        assert_eq!(fs::read_to_string(dir.join("duty_cycle")).unwrap(), "20000");
    }
}
