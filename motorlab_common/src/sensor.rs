//! MPU6050 register map and gyro calibration.
//!
//! Register addresses and bit patterns follow the InvenSense MPU-6000/6050
//! register map (rev 4.2). The raw→physical conversion is derived from the
//! selected full-scale range so the two can never disagree.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::consts::{MPU6050_ADDRESS, MPU6050_ADDRESS_ALT};

/// Value of `WHO_AM_I` on a genuine MPU6050 (independent of AD0).
pub const MPU6050_WHO_AM_I: u8 = 0x68;

/// Registers touched by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MpuRegister {
    /// Digital low-pass filter configuration (DLPF_CFG in bits 2:0).
    Config = 0x1A,
    /// Gyro full-scale select (FS_SEL in bits 4:3).
    GyroConfig = 0x1B,
    GyroXoutH = 0x43,
    GyroYoutH = 0x45,
    GyroZoutH = 0x47,
    /// Power management; writing 0 clears SLEEP.
    PwrMgmt1 = 0x6B,
    WhoAmI = 0x75,
}

impl MpuRegister {
    /// Register address on the device.
    #[inline]
    pub const fn addr(self) -> u8 {
        self as u8
    }

    /// Reverse lookup from a raw register address.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x1A => Some(Self::Config),
            0x1B => Some(Self::GyroConfig),
            0x43 => Some(Self::GyroXoutH),
            0x45 => Some(Self::GyroYoutH),
            0x47 => Some(Self::GyroZoutH),
            0x6B => Some(Self::PwrMgmt1),
            0x75 => Some(Self::WhoAmI),
            _ => None,
        }
    }
}

/// Gyro full-scale range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GyroRange {
    Dps250,
    Dps500,
    #[default]
    Dps1000,
    Dps2000,
}

impl GyroRange {
    /// FS_SEL field value.
    #[inline]
    pub const fn fs_sel(self) -> u8 {
        match self {
            Self::Dps250 => 0,
            Self::Dps500 => 1,
            Self::Dps1000 => 2,
            Self::Dps2000 => 3,
        }
    }

    /// Byte written to `GYRO_CONFIG`.
    #[inline]
    pub const fn register_value(self) -> u8 {
        self.fs_sel() << 3
    }

    /// Datasheet sensitivity [LSB / (°/s)].
    #[inline]
    pub const fn lsb_per_dps(self) -> f64 {
        match self {
            Self::Dps250 => 131.0,
            Self::Dps500 => 65.5,
            Self::Dps1000 => 32.8,
            Self::Dps2000 => 16.4,
        }
    }

    /// Full-scale magnitude [°/s].
    #[inline]
    pub const fn full_scale_dps(self) -> f64 {
        match self {
            Self::Dps250 => 250.0,
            Self::Dps500 => 500.0,
            Self::Dps1000 => 1000.0,
            Self::Dps2000 => 2000.0,
        }
    }
}

/// Gyro digital low-pass filter bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DlpfBandwidth {
    Hz256,
    Hz188,
    Hz98,
    #[default]
    Hz42,
    Hz20,
    Hz10,
    Hz5,
}

impl DlpfBandwidth {
    /// DLPF_CFG value written to `CONFIG`.
    #[inline]
    pub const fn register_value(self) -> u8 {
        match self {
            Self::Hz256 => 0,
            Self::Hz188 => 1,
            Self::Hz98 => 2,
            Self::Hz42 => 3,
            Self::Hz20 => 4,
            Self::Hz10 => 5,
            Self::Hz5 => 6,
        }
    }
}

/// Which gyro axis is aligned with the motor shaft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GyroAxis {
    X,
    #[default]
    Y,
    Z,
}

impl GyroAxis {
    /// High byte of the 16-bit rate output for this axis.
    #[inline]
    pub const fn output_register(self) -> MpuRegister {
        match self {
            Self::X => MpuRegister::GyroXoutH,
            Self::Y => MpuRegister::GyroYoutH,
            Self::Z => MpuRegister::GyroZoutH,
        }
    }
}

/// Complete sensor configuration consumed by the sensor reader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorCalibration {
    /// 7-bit I2C address (0x68, or 0x69 with AD0 high).
    #[serde(default = "default_address")]
    pub address: u8,
    /// Axis read as the shaft rate.
    #[serde(default)]
    pub axis: GyroAxis,
    /// Full-scale range programmed into `GYRO_CONFIG`.
    #[serde(default)]
    pub range: GyroRange,
    /// Low-pass bandwidth programmed into `CONFIG`.
    #[serde(default)]
    pub bandwidth: DlpfBandwidth,
    /// Extra multiplier on the datasheet scale (mounting sign, board quirks).
    #[serde(default = "default_scale_trim")]
    pub scale_trim: f64,
}

fn default_address() -> u8 {
    MPU6050_ADDRESS
}
fn default_scale_trim() -> f64 {
    1.0
}

impl Default for SensorCalibration {
    fn default() -> Self {
        Self {
            address: MPU6050_ADDRESS,
            axis: GyroAxis::default(),
            range: GyroRange::default(),
            bandwidth: DlpfBandwidth::default(),
            scale_trim: 1.0,
        }
    }
}

impl SensorCalibration {
    /// Conversion factor [rad/s per LSB].
    #[inline]
    pub fn rate_per_lsb(&self) -> f64 {
        self.scale_trim * (1.0 / self.range.lsb_per_dps()).to_radians()
    }

    /// Raw register value → angular rate [rad/s].
    #[inline]
    pub fn to_rate(&self, raw: i16) -> f64 {
        f64::from(raw) * self.rate_per_lsb()
    }

    /// Register holding the high byte of the measured axis.
    #[inline]
    pub fn output_register(&self) -> MpuRegister {
        self.axis.output_register()
    }

    /// Check the address and the trim factor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address != MPU6050_ADDRESS && self.address != MPU6050_ADDRESS_ALT {
            return Err(ConfigError::ValidationError(format!(
                "sensor.address {:#04x} is not an MPU6050 address ({:#04x} or {:#04x})",
                self.address, MPU6050_ADDRESS, MPU6050_ADDRESS_ALT
            )));
        }
        if !(self.scale_trim.is_finite() && self.scale_trim.abs() > 0.0 && self.scale_trim.abs() <= 4.0)
        {
            return Err(ConfigError::ValidationError(format!(
                "sensor.scale_trim {} must satisfy 0 < |trim| <= 4",
                self.scale_trim
            )));
        }
        Ok(())
    }
}
