//! Grove ADC channel over Linux I2C.
//!
//! Both analog sensors sit behind the same Grove I2C ADC chip, one chip per
//! bus, at the same slave address. The chip exposes the 10-bit conversion as
//! a high register (bits 9..2) and a low register (bits 1..0).

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use log::info;
use tokio::sync::Mutex;

use crate::devices::RegisterPairChannel;
use crate::error::ControlError;

/// Control register enabling continuous conversion.
const REG_INIT: u8 = 0x42;
/// Value written to [`REG_INIT`] at startup.
const CMD_START: u8 = 0x01;
/// Upper eight bits of the conversion.
const REG_HIGH: u8 = 0x44;
/// Lower two bits of the conversion.
const REG_LOW: u8 = 0x45;

/// One ADC channel on one I2C bus.
#[derive(Debug)]
pub struct GroveChannel {
    dev: Arc<Mutex<LinuxI2CDevice>>,
    bus: String,
}

impl GroveChannel {
    /// Opens the bus device and starts the ADC's conversion cycle.
    pub fn open(bus: &Path, address: u16) -> Result<Self> {
        let mut dev = LinuxI2CDevice::new(bus, address)
            .with_context(|| format!("Failed to open I2C bus {}", bus.display()))?;

        dev.smbus_write_byte_data(REG_INIT, CMD_START)
            .with_context(|| format!("Failed to start ADC on {}", bus.display()))?;

        info!(
            "ADC ready on {} at address {:#04x}",
            bus.display(),
            address
        );

        Ok(Self {
            dev: Arc::new(Mutex::new(dev)),
            bus: bus.display().to_string(),
        })
    }
}

#[async_trait]
impl RegisterPairChannel for GroveChannel {
    async fn read_pair(&self) -> Result<(u8, u8), ControlError> {
        let mut dev = self.dev.lock().await;

        let high = dev
            .smbus_read_byte_data(REG_HIGH)
            .map_err(|e| ControlError::SensorRead(format!("{}: {e}", self.bus)))?;
        let low = dev
            .smbus_read_byte_data(REG_LOW)
            .map_err(|e| ControlError::SensorRead(format!("{}: {e}", self.bus)))?;

        Ok((high, low))
    }
}
