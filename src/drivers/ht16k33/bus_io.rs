use std::{
    fs::{File, OpenOptions},
    io::Write,
    os::fd::AsRawFd,
};

use anyhow::{Context, Result};

// I2C_SLAVE from <linux/i2c-dev.h>
nix::ioctl_write_int_bad!(i2c_set_slave_address, 0x0703);

/// Byte-oriented write access to one I2C device.
pub trait I2cBus: Send + 'static {
    /// Sends `bytes` as a single write transaction.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;
}

/// `/dev/i2c-N` character device bound to one slave address.
#[derive(Debug)]
pub struct LinuxI2c {
    file: File,
}

impl LinuxI2c {
    pub fn open(bus: u8, address: u16) -> Result<Self> {
        let path = format!("/dev/i2c-{bus}");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open {path}"))?;

        // SAFETY: the descriptor belongs to `file`, which outlives the call,
        // and I2C_SLAVE takes the address by value.
        unsafe { i2c_set_slave_address(file.as_raw_fd(), i32::from(address)) }
            .with_context(|| format!("Failed to select I2C address {address:#04x} on {path}"))?;

        Ok(Self { file })
    }
}

impl I2cBus for LinuxI2c {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes).context("I2C write failed")
    }
}
