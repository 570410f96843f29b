//! Capability traits for platform devices and the collaborators the
//! presence poller and cooling controller depend on.

use anyhow::Result;
use async_trait::async_trait;

pub mod chassis;
pub mod component;
pub mod fan;
pub mod sfp;
pub mod types;

pub use chassis::Chassis;

use crate::thermal::actuator::ActuationError;
use crate::thermal::types::CoolingLevel;
use types::FanDirection;

/// A device carrying a firmware image whose version can be read.
#[async_trait]
pub trait FirmwareReadable: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Current firmware version, or `None` when it cannot be determined.
    async fn firmware_version(&self) -> Option<String>;
}

/// A pluggable device that can report whether it is seated.
#[async_trait]
pub trait PresenceReadable: Send + Sync {
    async fn presence(&self) -> Result<bool>;
}

/// A fan that reports its speed.
#[async_trait]
pub trait SpeedReadable: Send + Sync {
    /// Speed as a percentage of the fan's maximum (0-100).
    async fn speed_percent(&self) -> u8;

    async fn speed_rpm(&self) -> u32;

    fn direction(&self) -> FanDirection;
}

/// Everything the presence poller and the cooling evaluator read from hardware.
#[async_trait]
pub trait DeviceReader: Send + Sync {
    /// Whether a transceiver is seated in the 0-based port `index`.
    async fn presence(&self, index: usize) -> Result<bool>;

    /// Lowest ambient temperature across the ambient sensors, in milli-degrees C.
    async fn ambient_temperature(&self) -> Result<i32>;

    /// Minimum cooling level demanded by the thermal zones, or `None` while
    /// the zones cannot provide one.
    async fn zone_floor(&self) -> Option<CoolingLevel>;

    /// Whether ambient temperature readings can currently be trusted.
    async fn is_trustworthy(&self) -> bool;
}

/// Sink for cooling level decisions.
#[async_trait]
pub trait CoolingActuator: Send + Sync {
    async fn apply(&self, level: CoolingLevel) -> Result<(), ActuationError>;
}
