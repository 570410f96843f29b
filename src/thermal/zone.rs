//! Thermal-zone floor.
//!
//! Every `thermal_zone*` directory exposes `temp` plus `temp_trip_norm` and
//! `temp_trip_high` trip points, all in milli-degrees. A zone reading `0` is
//! disabled. A zone within the hysteresis band of its normal trip point asks
//! for at least `min_level_for_high`; a zone at or past its high trip point is
//! under the kernel thermal algorithm's control, and no floor is reported
//! until it cools down.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{trace, warn};

use super::types::{CoolingLevel, CoolingLimits};
use crate::system::sysfs;

pub const DEFAULT_ZONE_PATTERN: &str = "/sys/class/thermal/thermal_zone*";
pub const DEFAULT_HYSTERESIS: i64 = 5000;

const ZONE_TEMP: &str = "temp";
const ZONE_NORMAL_TRIP: &str = "temp_trip_norm";
const ZONE_HIGH_TRIP: &str = "temp_trip_high";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoneDemand {
    Disabled,
    Normal,
    High,
    Overheated,
}

#[derive(Debug, Clone)]
pub struct ThermalZoneScanner {
    pattern: String,
    hysteresis: i64,
    limits: CoolingLimits,
}

impl ThermalZoneScanner {
    pub fn new(pattern: impl Into<String>, hysteresis: i64, limits: CoolingLimits) -> Self {
        Self {
            pattern: pattern.into(),
            hysteresis,
            limits,
        }
    }

    /// Minimum cooling level across all zones; `None` when a zone is
    /// overheated or the zones cannot be read.
    pub async fn floor(&self) -> Option<CoolingLevel> {
        match self.scan().await {
            Ok(floor) => floor,
            Err(e) => {
                warn!("Failed to read thermal zones: {:#}", e);
                None
            }
        }
    }

    async fn scan(&self) -> Result<Option<CoolingLevel>> {
        let zones: Vec<PathBuf> = glob::glob(&self.pattern)
            .with_context(|| format!("Invalid thermal zone pattern '{}'", self.pattern))?
            .filter_map(Result::ok)
            .filter(|path| path.is_dir())
            .collect();

        let mut floor = self.limits.min_level_for_normal;
        for zone in &zones {
            match self.zone_demand(zone).await? {
                ZoneDemand::Overheated => {
                    trace!("Thermal zone {:?} at or above its high trip point", zone);
                    return Ok(None);
                }
                ZoneDemand::High => floor = floor.max(self.limits.min_level_for_high),
                ZoneDemand::Normal | ZoneDemand::Disabled => {}
            }
        }
        Ok(Some(floor))
    }

    async fn zone_demand(&self, zone: &Path) -> Result<ZoneDemand> {
        let current = sysfs::read_int(&zone.join(ZONE_TEMP)).await?;
        if current == 0 {
            return Ok(ZoneDemand::Disabled);
        }

        let normal = sysfs::read_int(&zone.join(ZONE_NORMAL_TRIP)).await?;
        if current < normal - self.hysteresis {
            return Ok(ZoneDemand::Normal);
        }

        let high = sysfs::read_int(&zone.join(ZONE_HIGH_TRIP)).await?;
        if current < high - self.hysteresis {
            return Ok(ZoneDemand::High);
        }

        Ok(ZoneDemand::Overheated)
    }
}
