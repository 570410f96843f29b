//! Thermal recovery evaluation.
//!
//! The dynamic minimum comes from the platform's minimum table for the current
//! ambient temperature. When it clearly raises cooling above the last applied
//! level (and reaches the high-confidence floor) it is used directly.
//! Otherwise the thermal zones are consulted and the higher of the two wins;
//! if the zones cannot provide a floor yet, nothing is applied this cycle.
//!
//! A platform without a minimum table gets the fixed unknown-SKU level; no
//! table, sensor or zone is consulted for it.

use tracing::{debug, error};

use super::table::{MinimumTables, PlatformTables};
use super::types::{CoolingLevel, CoolingLimits};
use crate::platform::DeviceReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    Apply(CoolingLevel),
    /// Zone floor unavailable; retry on the next cycle.
    Skip,
}

#[derive(Debug, Clone)]
pub struct RecoveryEvaluator {
    tables: MinimumTables,
    limits: CoolingLimits,
}

impl RecoveryEvaluator {
    pub fn new(tables: MinimumTables, limits: CoolingLimits) -> Self {
        Self { tables, limits }
    }

    pub fn limits(&self) -> &CoolingLimits {
        &self.limits
    }

    /// Pure evaluation over already-read inputs. `zone_floor` is only called
    /// when the fast path does not apply.
    pub fn decide(
        &self,
        platform: &str,
        trusted: bool,
        ambient_milli: i32,
        last_applied: Option<CoolingLevel>,
        zone_floor: impl FnOnce() -> Option<CoolingLevel>,
    ) -> RecoveryDecision {
        let Some(tables) = self.tables.platform(platform) else {
            return RecoveryDecision::Apply(self.limits.unknown_sku_level);
        };
        let dynamic_min = self.table_minimum(tables, trusted, ambient_milli);

        if self.takes_fast_path(dynamic_min, last_applied) {
            return RecoveryDecision::Apply(dynamic_min);
        }
        merge_floor(dynamic_min, zone_floor())
    }

    /// Evaluate against live hardware. Trust and ambient temperature are only
    /// read for platforms that have a minimum table.
    pub async fn evaluate(
        &self,
        platform: &str,
        reader: &dyn DeviceReader,
        last_applied: Option<CoolingLevel>,
    ) -> anyhow::Result<RecoveryDecision> {
        let Some(tables) = self.tables.platform(platform) else {
            debug!("No minimum table for platform '{}', using {}", platform, self.limits.unknown_sku_level);
            return Ok(RecoveryDecision::Apply(self.limits.unknown_sku_level));
        };
        let trusted = reader.is_trustworthy().await;
        let ambient = reader.ambient_temperature().await?;
        let dynamic_min = self.table_minimum(tables, trusted, ambient);

        if self.takes_fast_path(dynamic_min, last_applied) {
            debug!("Dynamic minimum {} raises cooling above {:?}, skipping zone scan", dynamic_min, last_applied);
            return Ok(RecoveryDecision::Apply(dynamic_min));
        }

        Ok(merge_floor(dynamic_min, reader.zone_floor().await))
    }

    fn table_minimum(&self, tables: &PlatformTables, trusted: bool, ambient_milli: i32) -> CoolingLevel {
        let temperature = ambient_milli / 1000;
        match tables.select(trusted).dynamic_minimum(temperature) {
            Some(level) => level,
            None => {
                error!(
                    "Failed to get dynamic minimum cooling level: {}C not covered by the {} table",
                    temperature,
                    if trusted { "trusted" } else { "untrusted" }
                );
                self.limits.max_level
            }
        }
    }

    /// Strictly above the last applied level and at least the high floor.
    fn takes_fast_path(&self, dynamic_min: CoolingLevel, last_applied: Option<CoolingLevel>) -> bool {
        matches!(last_applied, Some(last) if dynamic_min > last)
            && dynamic_min >= self.limits.min_level_for_high
    }
}

fn merge_floor(dynamic_min: CoolingLevel, floor: Option<CoolingLevel>) -> RecoveryDecision {
    match floor {
        Some(floor) => RecoveryDecision::Apply(dynamic_min.max(floor)),
        None => {
            debug!("Thermal zone floor not available, skipping this cycle");
            RecoveryDecision::Skip
        }
    }
}
