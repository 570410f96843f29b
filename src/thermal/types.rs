//! Cooling level and the limits shared by the evaluator, zone scanner and actuators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete fan-speed step. Higher means more cooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoolingLevel(pub u8);

impl CoolingLevel {
    pub fn value(self) -> u8 {
        self.0
    }

    /// Fan duty percentage for this level (level 10 = 100%).
    pub fn as_percent(self) -> u8 {
        self.0.saturating_mul(10).min(100)
    }

    /// Level for a 0-100 fan speed percentage; fractional levels truncate.
    pub fn from_percent(percent: f64) -> Self {
        Self((percent.clamp(0.0, 100.0) / 10.0) as u8)
    }
}

impl fmt::Display for CoolingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform cooling limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoolingLimits {
    pub max_level: CoolingLevel,
    /// Floor used once any thermal zone runs above its normal trip point.
    pub min_level_for_high: CoolingLevel,
    /// Floor used when every thermal zone is cool or disabled.
    pub min_level_for_normal: CoolingLevel,
    /// Level applied on platforms without a minimum table.
    pub unknown_sku_level: CoolingLevel,
}

impl Default for CoolingLimits {
    fn default() -> Self {
        Self {
            max_level: CoolingLevel(10),
            min_level_for_high: CoolingLevel(4),
            min_level_for_normal: CoolingLevel(2),
            unknown_sku_level: CoolingLevel(6),
        }
    }
}

impl CoolingLimits {
    pub fn validate(&self) -> anyhow::Result<()> {
        let levels = [
            ("min_level_for_high", self.min_level_for_high),
            ("min_level_for_normal", self.min_level_for_normal),
            ("unknown_sku_level", self.unknown_sku_level),
        ];
        for (name, level) in levels {
            if level > self.max_level {
                anyhow::bail!("{} ({}) exceeds max_level ({})", name, level, self.max_level);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_conversion_truncates() {
        assert_eq!(CoolingLevel::from_percent(55.0), CoolingLevel(5));
        assert_eq!(CoolingLevel::from_percent(100.0), CoolingLevel(10));
        assert_eq!(CoolingLevel(7).as_percent(), 70);
    }

    #[test]
    fn limits_above_max_are_rejected() {
        let limits = CoolingLimits {
            unknown_sku_level: CoolingLevel(11),
            ..CoolingLimits::default()
        };
        assert!(limits.validate().is_err());
        assert!(CoolingLimits::default().validate().is_ok());
    }
}
