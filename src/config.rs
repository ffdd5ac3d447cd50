//! Configuration for the sunrise_clockd daemon.
//!
//! Loaded once at startup from a YAML file. Every field has a default, so an
//! appliance without any config file runs with the built-in values.

use std::{
    collections::HashSet,
    env,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use log::{LevelFilter, info};
use serde::{Deserialize, Serialize};

use crate::{display::BlinkRate, scheduler::AlarmSchedule, switch::DebounceTiming};

pub const CONFIG_ENV: &str = "SUNRISE_CLOCKD_CONFIG";
const CONFIG_FILE: &str = "sunrise_clockd/config.yml";
const ETC_CONFIG: &str = "/etc/sunrise_clockd/config.yml";

/// Top-level configuration.
///
/// # Example
///
/// ```yaml
/// version: 1
/// alarm:
///   hour: 6
///   minute: 45
/// sunrise_duration: 1200
/// switches:
///   light: 17
///   alarm: 27
///   clock: 22
/// display:
///   brightness: 8
///   blink_rate: off
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    #[serde(default = "defaults::version")]
    pub version: u8,

    #[serde(default)]
    pub alarm: AlarmCfg,

    /// Length of the sunrise fade in seconds.
    #[serde(default = "defaults::sunrise_duration")]
    pub sunrise_duration: u64,

    #[serde(default = "defaults::pidfile")]
    pub pidfile: PathBuf,

    /// Receives stdout and stderr of the daemonized process.
    #[serde(default = "defaults::logfile")]
    pub logfile: PathBuf,

    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(default = "defaults::log_level")]
    pub log_level: String,

    #[serde(default)]
    pub switches: SwitchesCfg,

    #[serde(default)]
    pub debounce: DebounceCfg,

    #[serde(default)]
    pub pwm: PwmCfg,

    #[serde(default)]
    pub display: DisplayCfg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmCfg {
    pub hour: u32,
    pub minute: u32,
}

/// GPIO line numbers of the three front-panel switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchesCfg {
    pub light: u32,
    pub alarm: u32,
    pub clock: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceCfg {
    pub min_hold_ms: u64,
    pub poll_ms: u64,
    pub wait_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmCfg {
    pub chip: u32,
    pub channel: u32,
    pub period_ns: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayCfg {
    /// I2C bus number, as in `/dev/i2c-N`.
    pub bus: u8,
    pub address: u16,
    pub brightness: u8,
    pub blink_rate: BlinkRate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: defaults::version(),
            alarm: AlarmCfg::default(),
            sunrise_duration: defaults::sunrise_duration(),
            pidfile: defaults::pidfile(),
            logfile: defaults::logfile(),
            log_level: defaults::log_level(),
            switches: SwitchesCfg::default(),
            debounce: DebounceCfg::default(),
            pwm: PwmCfg::default(),
            display: DisplayCfg::default(),
        }
    }
}

impl Default for AlarmCfg {
    fn default() -> Self {
        Self { hour: 7, minute: 0 }
    }
}

impl Default for SwitchesCfg {
    fn default() -> Self {
        Self {
            light: 17,
            alarm: 27,
            clock: 22,
        }
    }
}

impl Default for DebounceCfg {
    fn default() -> Self {
        Self {
            min_hold_ms: 500,
            poll_ms: 100,
            wait_timeout_ms: 1000,
        }
    }
}

impl Default for PwmCfg {
    fn default() -> Self {
        Self {
            chip: 0,
            channel: 0,
            period_ns: 1_000_000,
        }
    }
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self {
            bus: 1,
            address: crate::drivers::ht16k33::DEFAULT_ADDRESS,
            brightness: crate::drivers::ht16k33::protocol::MAX_BRIGHTNESS,
            blink_rate: BlinkRate::Off,
        }
    }
}

impl Config {
    /// Loads the configuration from `path`, or from the first standard
    /// location that exists, or falls back to the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let located = match path {
            Some(path) => Some(path.to_path_buf()),
            None => locate_config(),
        };
        match located {
            Some(path) => {
                info!("Loading config from: {}", path.display());
                Self::load_from_path(&path)
            }
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            bail!("Unsupported config version {}", self.version);
        }
        if self.alarm.hour > 23 || self.alarm.minute > 59 {
            bail!(
                "Alarm time {:02}:{:02} is not a valid time of day",
                self.alarm.hour,
                self.alarm.minute
            );
        }
        if self.sunrise_duration == 0 {
            bail!("sunrise_duration must be at least one second");
        }
        if self.sunrise_duration >= 24 * 60 * 60 {
            bail!("sunrise_duration must be shorter than a day");
        }
        if self.display.brightness > crate::drivers::ht16k33::protocol::MAX_BRIGHTNESS {
            bail!(
                "Display brightness {} is out of range 0..=15",
                self.display.brightness
            );
        }
        if self.pwm.period_ns == 0 {
            bail!("PWM period must be non-zero");
        }
        let lines = [self.switches.light, self.switches.alarm, self.switches.clock];
        if lines.iter().collect::<HashSet<_>>().len() != lines.len() {
            bail!("Switch lines must be distinct, got {lines:?}");
        }
        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| anyhow!("Unknown log level '{}'", self.log_level))
    }

    pub fn alarm_schedule(&self) -> Result<AlarmSchedule> {
        AlarmSchedule::new(
            self.alarm.hour,
            self.alarm.minute,
            Duration::from_secs(self.sunrise_duration),
        )
    }

    pub fn min_hold(&self) -> Duration {
        Duration::from_millis(self.debounce.min_hold_ms)
    }

    pub fn debounce_timing(&self) -> DebounceTiming {
        DebounceTiming {
            poll_interval: Duration::from_millis(self.debounce.poll_ms),
            wait_timeout: Duration::from_millis(self.debounce.wait_timeout_ms),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn version() -> u8 {
        1
    }

    pub fn sunrise_duration() -> u64 {
        30 * 60
    }

    pub fn pidfile() -> PathBuf {
        PathBuf::from("/var/run/sunrise_clockd.pid")
    }

    pub fn logfile() -> PathBuf {
        PathBuf::from("/var/tmp/sunrise_clockd.log")
    }

    pub fn log_level() -> String {
        "info".to_string()
    }
}

fn locate_config() -> Option<PathBuf> {
    let config_home = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")));
    locate_config_from(env::var_os(CONFIG_ENV), config_home, Path::new(ETC_CONFIG))
}

/// Search order: explicit env path, user config dir, system path.
fn locate_config_from(
    env_path: Option<OsString>,
    config_home: Option<PathBuf>,
    etc: &Path,
) -> Option<PathBuf> {
    if let Some(env_path) = env_path {
        return Some(PathBuf::from(env_path));
    }

    if let Some(user) = config_home.map(|dir| dir.join(CONFIG_FILE)) {
        if user.exists() {
            return Some(user);
        }
    }

    etc.exists().then(|| etc.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn config_load_full_yaml() {
        let temp_file = create_temp_config(
            r#"
version: 1
alarm:
  hour: 6
  minute: 45
sunrise_duration: 1200
pidfile: /tmp/clockd.pid
logfile: /tmp/clockd.log
log_level: debug
switches:
  light: 5
  alarm: 6
  clock: 13
debounce:
  min_hold_ms: 400
  poll_ms: 50
  wait_timeout_ms: 2000
pwm:
  chip: 1
  channel: 2
  period_ns: 500000
display:
  bus: 0
  address: 0x71
  brightness: 8
  blink_rate: one-hz
"#,
        );

        let config = Config::load(Some(temp_file.path())).unwrap();

        assert_eq!(config.alarm, AlarmCfg { hour: 6, minute: 45 });
        assert_eq!(config.sunrise_duration, 1200);
        assert_eq!(config.pidfile, PathBuf::from("/tmp/clockd.pid"));
        assert_eq!(config.level_filter().unwrap(), LevelFilter::Debug);
        assert_eq!(
            config.switches,
            SwitchesCfg {
                light: 5,
                alarm: 6,
                clock: 13
            }
        );
        assert_eq!(config.min_hold(), Duration::from_millis(400));
        assert_eq!(
            config.debounce_timing(),
            DebounceTiming {
                poll_interval: Duration::from_millis(50),
                wait_timeout: Duration::from_secs(2),
            }
        );
        assert_eq!(config.pwm.period_ns, 500_000);
        assert_eq!(config.display.address, 0x71);
        assert_eq!(config.display.blink_rate, BlinkRate::OneHz);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = Config::parse("version: 1\nalarm:\n  minute: 30\n").unwrap();

        assert_eq!(config.alarm, AlarmCfg { hour: 7, minute: 30 });
        assert_eq!(config.sunrise_duration, 1800);
        assert_eq!(config.switches, SwitchesCfg::default());
        assert_eq!(config.display, DisplayCfg::default());
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();

        let schedule = config.alarm_schedule().unwrap();
        assert_eq!((schedule.hour(), schedule.minute()), (7, 0));
        assert_eq!(schedule.sunrise_duration(), Duration::from_secs(1800));
        assert_eq!(config.debounce_timing(), DebounceTiming::default());
        assert_eq!(config.min_hold(), crate::switch::MIN_HOLD_TIME);
    }

    #[test]
    fn invalid_values_rejected() {
        let cases = [
            "version: 2",
            "version: 1\nalarm: { hour: 24 }",
            "version: 1\nalarm: { minute: 60 }",
            "version: 1\nsunrise_duration: 0",
            "version: 1\nsunrise_duration: 86400",
            "version: 1\ndisplay: { brightness: 16 }",
            "version: 1\npwm: { period_ns: 0 }",
            "version: 1\nswitches: { light: 4, alarm: 4 }",
            "version: 1\nlog_level: loud",
        ];
        for yaml in cases {
            assert!(Config::parse(yaml).is_err(), "accepted: {yaml}");
        }
    }

    #[test]
    fn missing_version_defaults_to_one() {
        let config = Config::parse("alarm: { hour: 6 }").unwrap();

        assert_eq!(config.version, 1);
        assert_eq!(config.alarm, AlarmCfg { hour: 6, minute: 0 });
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.yml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn locate_prefers_env_path() {
        let dir = TempDir::new().unwrap();
        let found = locate_config_from(
            Some(OsString::from("/custom/config.yml")),
            Some(dir.path().to_path_buf()),
            Path::new("/nonexistent/etc.yml"),
        );
        assert_eq!(found, Some(PathBuf::from("/custom/config.yml")));
    }

    #[test]
    fn locate_user_then_etc() {
        let home = TempDir::new().unwrap();
        let etc = create_temp_config("version: 1\n");

        assert_eq!(
            locate_config_from(None, Some(home.path().to_path_buf()), etc.path()),
            Some(etc.path().to_path_buf())
        );

        let user = home.path().join(CONFIG_FILE);
        fs::create_dir_all(user.parent().unwrap()).unwrap();
        fs::write(&user, "version: 1\n").unwrap();
        assert_eq!(
            locate_config_from(None, Some(home.path().to_path_buf()), etc.path()),
            Some(user)
        );
    }

    #[test]
    fn locate_nothing_found() {
        let home = TempDir::new().unwrap();
        assert_eq!(
            locate_config_from(
                None,
                Some(home.path().to_path_buf()),
                Path::new("/nonexistent/etc.yml")
            ),
            None
        );
    }
}
