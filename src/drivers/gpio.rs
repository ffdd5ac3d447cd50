use std::{
    fs::{self, File},
    os::unix::fs::FileExt,
    path::Path,
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use log::info;
use tokio::io::{Interest, unix::AsyncFd};

/// Sysfs GPIO class directory.
pub const GPIO_ROOT: &str = "/sys/class/gpio";

/// A raw digital input line with change notification.
#[async_trait]
pub trait RawInput: Send {
    /// Reads the current level without blocking. `true` is active.
    fn sample(&mut self) -> Result<bool>;

    /// Waits for a level change for at most `timeout`.
    ///
    /// Returns `false` when the wait timed out.
    async fn wait_for_edge(&mut self, timeout: Duration) -> Result<bool>;
}

/// Input line exported through the legacy sysfs GPIO interface with edge
/// interrupts on both edges.
#[derive(Debug)]
pub struct SysfsGpioInput {
    line: u32,
    value: File,
    watcher: Option<AsyncFd<File>>,
}

impl SysfsGpioInput {
    /// Exports `line` and configures it as an edge-triggered input.
    pub fn open(line: u32) -> Result<Self> {
        Self::open_at(Path::new(GPIO_ROOT), line)
    }

    pub fn open_at(root: &Path, line: u32) -> Result<Self> {
        let dir = root.join(format!("gpio{line}"));
        if !dir.exists() {
            write_attr(&root.join("export"), &line.to_string())?;
        }
        write_attr(&dir.join("direction"), "in")?;
        write_attr(&dir.join("edge"), "both")?;

        let value_path = dir.join("value");
        let value = File::open(&value_path)
            .with_context(|| format!("Failed to open {}", value_path.display()))?;

        info!("GPIO line {line} configured as edge-triggered input");
        Ok(Self {
            line,
            value,
            watcher: None,
        })
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    // Registered lazily: the line is opened before the runtime exists.
    fn watcher(&mut self) -> Result<&AsyncFd<File>> {
        if self.watcher.is_none() {
            let file = self
                .value
                .try_clone()
                .with_context(|| format!("Failed to clone gpio{} value handle", self.line))?;
            let watcher = AsyncFd::with_interest(file, Interest::PRIORITY)
                .with_context(|| format!("Failed to watch gpio{} for edges", self.line))?;
            self.watcher = Some(watcher);
        }
        self.watcher
            .as_ref()
            .ok_or_else(|| anyhow!("gpio{} watcher missing", self.line))
    }
}

#[async_trait]
impl RawInput for SysfsGpioInput {
    fn sample(&mut self) -> Result<bool> {
        let mut buf = [0u8; 1];
        let read = self
            .value
            .read_at(&mut buf, 0)
            .with_context(|| format!("Failed to read gpio{}", self.line))?;
        if read == 0 {
            bail!("Empty read from gpio{}", self.line);
        }
        parse_level(buf[0]).ok_or_else(|| {
            anyhow!(
                "Unexpected value {:?} read from gpio{}",
                char::from(buf[0]),
                self.line
            )
        })
    }

    async fn wait_for_edge(&mut self, timeout: Duration) -> Result<bool> {
        let line = self.line;
        let watcher = self.watcher()?;
        match tokio::time::timeout(timeout, watcher.ready(Interest::PRIORITY)).await {
            Ok(ready) => {
                let mut guard = ready.with_context(|| format!("Edge wait failed on gpio{line}"))?;
                guard.clear_ready();
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }
}

fn parse_level(byte: u8) -> Option<bool> {
    match byte {
        b'0' => Some(false),
        b'1' => Some(true),
        _ => None,
    }
}

pub(crate) fn write_attr(path: &Path, value: &str) -> Result<()> {
    fs::write(path, value).with_context(|| format!("Failed to write {value:?} to {}", path.display()))
}
