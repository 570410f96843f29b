//! Cooling actuators: a sysfs attribute write or an `ipmitool raw` command.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::types::CoolingLevel;
use crate::platform::CoolingActuator;
use crate::system::{executor, sysfs, template};

#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("cooling level {level} exceeds the platform maximum {max}")]
    OutOfRange { level: CoolingLevel, max: CoolingLevel },
    #[error("failed to write cooling level to {path:?}: {message}")]
    Write { path: PathBuf, message: String },
    #[error("cooling command failed: {0}")]
    Command(String),
}

/// How a 0-100 duty percentage is encoded in the BMC command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpeedTranslation {
    /// Scale into `[output_min, output_max]`, hex encoded.
    ByteScale {
        #[serde(default)]
        output_min: u8,
        #[serde(default = "default_output_max")]
        output_max: u8,
    },
    /// The percentage itself, hex encoded.
    #[default]
    DecimalHex,
    /// The percentage as a decimal integer.
    Integer,
}

fn default_output_max() -> u8 {
    255
}

impl SpeedTranslation {
    pub fn translate(&self, percent: u8) -> String {
        let percent = percent.min(100);
        match self {
            SpeedTranslation::ByteScale { output_min, output_max } => {
                // 50% of 0..255 -> 127 -> "0x7f"
                let range = output_max.saturating_sub(*output_min) as f64;
                let value = ((percent as f64 / 100.0) * range) as u8 + output_min;
                format!("0x{:02x}", value)
            }
            SpeedTranslation::DecimalHex => format!("0x{:02x}", percent),
            SpeedTranslation::Integer => percent.to_string(),
        }
    }
}

/// Actuator selection as it appears in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActuatorSettings {
    Sysfs {
        path: String,
    },
    Ipmitool {
        /// e.g. "0x3c 0x30 0x00 0xff {{SPEED_HEX}}"
        bytes: String,
        #[serde(default)]
        speed_translation: SpeedTranslation,
    },
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        ActuatorSettings::Sysfs {
            path: "/run/hw-management/thermal/cooling_cur_state".to_string(),
        }
    }
}

pub fn build_actuator(settings: &ActuatorSettings, dry_run: bool) -> Arc<dyn CoolingActuator> {
    match settings {
        ActuatorSettings::Sysfs { path } => Arc::new(SysfsCoolingActuator {
            path: PathBuf::from(path),
            dry_run,
        }),
        ActuatorSettings::Ipmitool { bytes, speed_translation } => Arc::new(IpmiCoolingActuator {
            bytes_template: bytes.clone(),
            translation: speed_translation.clone(),
            dry_run,
        }),
    }
}

pub struct SysfsCoolingActuator {
    path: PathBuf,
    dry_run: bool,
}

impl SysfsCoolingActuator {
    pub fn new(path: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self { path: path.into(), dry_run }
    }
}

#[async_trait]
impl CoolingActuator for SysfsCoolingActuator {
    async fn apply(&self, level: CoolingLevel) -> Result<(), ActuationError> {
        if self.dry_run {
            info!("[DRY RUN] Would write cooling level {} to {:?}", level, self.path);
            return Ok(());
        }

        sysfs::write_attr(&self.path, &level.to_string())
            .await
            .map_err(|e| ActuationError::Write { path: self.path.clone(), message: format!("{:#}", e) })?;
        debug!("Wrote cooling level {} to {:?}", level, self.path);
        Ok(())
    }
}

pub struct IpmiCoolingActuator {
    bytes_template: String,
    translation: SpeedTranslation,
    dry_run: bool,
}

impl IpmiCoolingActuator {
    /// Raw command bytes for a level, with the speed placeholders filled in.
    pub fn command_bytes(&self, level: CoolingLevel) -> String {
        let speed = self.translation.translate(level.as_percent());
        template::render(&self.bytes_template, &[("SPEED_HEX", &speed), ("SPEED", &speed)])
    }
}

#[async_trait]
impl CoolingActuator for IpmiCoolingActuator {
    async fn apply(&self, level: CoolingLevel) -> Result<(), ActuationError> {
        let bytes = self.command_bytes(level);
        info!("Setting cooling level {} ({}%) -> ipmitool raw {}", level, level.as_percent(), bytes);

        if self.dry_run {
            info!("[DRY RUN] Would execute: ipmitool raw {}", bytes);
            return Ok(());
        }

        executor::run_ipmitool_raw(&bytes)
            .await
            .map(|_| ())
            .map_err(|e| ActuationError::Command(format!("{:#}", e)))
    }
}
