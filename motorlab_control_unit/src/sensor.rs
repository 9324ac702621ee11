//! Gyro rate reader over an `embedded-hal` I2C bus.
//!
//! ## Init sequence
//! 1. `WHO_AM_I` must read back 0x68.
//! 2. `PWR_MGMT_1 ← 0x00` clears SLEEP.
//! 3. `CONFIG ← DLPF_CFG` selects the filter bandwidth.
//! 4. `GYRO_CONFIG ← FS_SEL << 3` selects the range.
//!
//! A failed transaction is reported as `SensorUnavailable` and never retried
//! here; the loop decides whether to hold or halt.

use embedded_hal::i2c::{Error as _, I2c};
use motorlab_common::error::ControlFault;
use motorlab_common::sensor::{MPU6050_WHO_AM_I, MpuRegister, SensorCalibration};
use tracing::{debug, info, warn};

/// MPU6050 gyro on an `embedded-hal` I2C bus.
pub struct SensorReader<I> {
    bus: I,
    cal: SensorCalibration,
    /// Cached `cal.rate_per_lsb()`.
    scale: f64,
    initialized: bool,
}

impl<I: I2c> SensorReader<I> {
    /// Reader for the device described by `cal`. Call `init` before reading.
    pub fn new(bus: I, cal: SensorCalibration) -> Self {
        Self {
            bus,
            scale: cal.rate_per_lsb(),
            cal,
            initialized: false,
        }
    }

    /// Calibration in use.
    #[inline]
    pub fn calibration(&self) -> &SensorCalibration {
        &self.cal
    }

    /// Init sequence has completed.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Wake the device and program bandwidth and range. Idempotent.
    pub fn init(&mut self) -> Result<(), ControlFault> {
        let mut who = [0u8; 1];
        self.bus
            .write_read(self.cal.address, &[MpuRegister::WhoAmI.addr()], &mut who)
            .map_err(|e| self.bus_fault("WHO_AM_I", e))?;
        if who[0] != MPU6050_WHO_AM_I {
            return Err(ControlFault::SensorMismatch { found: who[0] });
        }

        self.write_register(MpuRegister::PwrMgmt1, 0x00)?;
        self.write_register(MpuRegister::Config, self.cal.bandwidth.register_value())?;
        self.write_register(MpuRegister::GyroConfig, self.cal.range.register_value())?;

        self.initialized = true;
        info!(
            address = format_args!("{:#04x}", self.cal.address),
            range = ?self.cal.range,
            bandwidth = ?self.cal.bandwidth,
            axis = ?self.cal.axis,
            "gyro initialized"
        );
        Ok(())
    }

    /// Read the configured axis and convert to rad/s.
    pub fn read_angular_rate(&mut self) -> Result<f64, ControlFault> {
        let mut buf = [0u8; 2];
        self.bus
            .write_read(
                self.cal.address,
                &[self.cal.output_register().addr()],
                &mut buf,
            )
            .map_err(|e| self.bus_fault("rate", e))?;
        let raw = i16::from_be_bytes(buf);
        Ok(f64::from(raw) * self.scale)
    }

    fn write_register(&mut self, reg: MpuRegister, value: u8) -> Result<(), ControlFault> {
        debug!(reg = ?reg, value, "mpu write");
        self.bus
            .write(self.cal.address, &[reg.addr(), value])
            .map_err(|e| self.bus_fault("config write", e))
    }

    fn bus_fault(&self, op: &'static str, e: I::Error) -> ControlFault {
        warn!(op, kind = ?e.kind(), "gyro bus transaction failed");
        ControlFault::SensorUnavailable {
            address: self.cal.address,
        }
    }

    /// Give the bus back (tests, shutdown).
    pub fn release(self) -> I {
        self.bus
    }
}
