//! Ambient temperature → minimum cooling level tables.
//!
//! Tables are written the way platform data files ship them: an ordered JSON
//! object whose keys are inclusive `"min:max"` degree ranges and whose values
//! are tenths-scaled cooling levels (`13` means level 3). Order matters, the
//! first matching range wins, so `serde_json` runs with `preserve_order`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{CoolingLevel, CoolingLimits};

/// Raw table values carry this offset on top of the cooling level.
pub const RAW_LEVEL_OFFSET: i64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("range key '{0}' is not of the form 'min:max'")]
    MalformedRange(String),
    #[error("range '{key}' has min {min} above max {max}")]
    InvertedRange { key: String, min: i32, max: i32 },
    #[error("range '{key}' has non-integer level {value}")]
    NonIntegerLevel { key: String, value: String },
    #[error("range '{key}' level {raw} is outside [{low}, {high}]")]
    LevelOutOfRange { key: String, raw: i64, low: i64, high: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemperatureRange {
    pub min: i32,
    pub max: i32,
    pub raw_level: i64,
}

impl TemperatureRange {
    pub fn contains(&self, temperature: i32) -> bool {
        self.min <= temperature && temperature <= self.max
    }

    fn key(&self) -> String {
        format!("{}:{}", self.min, self.max)
    }
}

/// Ordered list of temperature ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct MinimumTable {
    ranges: Vec<TemperatureRange>,
}

impl MinimumTable {
    pub fn new(ranges: Vec<TemperatureRange>) -> Result<Self, TableError> {
        for range in &ranges {
            if range.min > range.max {
                return Err(TableError::InvertedRange { key: range.key(), min: range.min, max: range.max });
            }
            let high = RAW_LEVEL_OFFSET + i64::from(u8::MAX);
            if range.raw_level < RAW_LEVEL_OFFSET || range.raw_level > high {
                return Err(TableError::LevelOutOfRange {
                    key: range.key(),
                    raw: range.raw_level,
                    low: RAW_LEVEL_OFFSET,
                    high,
                });
            }
        }
        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[TemperatureRange] {
        &self.ranges
    }

    /// Dynamic minimum for a whole-degree temperature: the first range that
    /// contains it, minus the raw offset.
    pub fn dynamic_minimum(&self, temperature: i32) -> Option<CoolingLevel> {
        self.ranges
            .iter()
            .find(|range| range.contains(temperature))
            .map(|range| CoolingLevel((range.raw_level - RAW_LEVEL_OFFSET) as u8))
    }

    /// Reject tables whose levels exceed the platform maximum.
    pub fn validate(&self, limits: &CoolingLimits) -> Result<(), TableError> {
        let high = RAW_LEVEL_OFFSET + i64::from(limits.max_level.value());
        match self.ranges.iter().find(|range| range.raw_level > high) {
            Some(range) => Err(TableError::LevelOutOfRange {
                key: range.key(),
                raw: range.raw_level,
                low: RAW_LEVEL_OFFSET,
                high,
            }),
            None => Ok(()),
        }
    }
}

fn parse_range_key(key: &str) -> Result<(i32, i32), TableError> {
    let (min, max) = key
        .split_once(':')
        .ok_or_else(|| TableError::MalformedRange(key.to_string()))?;
    let min = min.trim().parse().map_err(|_| TableError::MalformedRange(key.to_string()))?;
    let max = max.trim().parse().map_err(|_| TableError::MalformedRange(key.to_string()))?;
    Ok((min, max))
}

impl TryFrom<Map<String, Value>> for MinimumTable {
    type Error = TableError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut ranges = Vec::with_capacity(map.len());
        for (key, value) in map {
            let (min, max) = parse_range_key(&key)?;
            let raw_level = value.as_i64().ok_or_else(|| TableError::NonIntegerLevel {
                key: key.clone(),
                value: value.to_string(),
            })?;
            ranges.push(TemperatureRange { min, max, raw_level });
        }
        MinimumTable::new(ranges)
    }
}

impl From<MinimumTable> for Map<String, Value> {
    fn from(table: MinimumTable) -> Self {
        table
            .ranges
            .into_iter()
            .map(|range| (range.key(), Value::from(range.raw_level)))
            .collect()
    }
}

/// A platform's pair of tables, selected by whether ambient sensors are trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTables {
    #[serde(rename = "unk_true")]
    pub trusted: MinimumTable,
    #[serde(rename = "unk_false")]
    pub untrusted: MinimumTable,
}

impl PlatformTables {
    pub fn select(&self, trusted: bool) -> &MinimumTable {
        if trusted {
            &self.trusted
        } else {
            &self.untrusted
        }
    }
}

/// Minimum tables for every known platform, keyed by platform name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinimumTables(HashMap<String, PlatformTables>);

impl MinimumTables {
    pub fn insert(&mut self, platform: impl Into<String>, tables: PlatformTables) {
        self.0.insert(platform.into(), tables);
    }

    pub fn platform(&self, platform: &str) -> Option<&PlatformTables> {
        self.0.get(platform)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn validate(&self, limits: &CoolingLimits) -> anyhow::Result<()> {
        for (platform, tables) in &self.0 {
            for table in [&tables.trusted, &tables.untrusted] {
                table
                    .validate(limits)
                    .map_err(|e| anyhow::anyhow!("minimum table for '{}': {}", platform, e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(value: Value) -> MinimumTable {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn first_matching_range_wins() {
        let t = table(json!({ "-127:20": 12, "21:30": 13, "25:40": 15 }));
        assert_eq!(t.dynamic_minimum(27), Some(CoolingLevel(3)));
        assert_eq!(t.dynamic_minimum(-5), Some(CoolingLevel(2)));
    }

    #[test]
    fn upper_bound_is_inclusive() {
        let t = table(json!({ "0:10": 14, "11:20": 16 }));
        assert_eq!(t.dynamic_minimum(10), Some(CoolingLevel(4)));
        assert_eq!(t.dynamic_minimum(0), Some(CoolingLevel(4)));
        assert_eq!(t.dynamic_minimum(11), Some(CoolingLevel(6)));
    }

    #[test]
    fn uncovered_temperature_has_no_minimum() {
        let t = table(json!({ "0:10": 14 }));
        assert_eq!(t.dynamic_minimum(11), None);
        assert_eq!(t.dynamic_minimum(-1), None);
    }

    #[test]
    fn key_order_survives_round_trip() {
        let t = table(json!({ "30:40": 15, "0:29": 12 }));
        assert_eq!(t.ranges()[0].min, 30);
        let back: Map<String, Value> = t.into();
        assert_eq!(back.keys().next().map(String::as_str), Some("30:40"));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        let err = serde_json::from_value::<MinimumTable>(json!({ "10-20": 12 })).unwrap_err();
        assert!(err.to_string().contains("min:max"));
        let err = serde_json::from_value::<MinimumTable>(json!({ "20:10": 12 })).unwrap_err();
        assert!(err.to_string().contains("above max"));
    }

    #[test]
    fn levels_below_offset_are_rejected() {
        let err = MinimumTable::new(vec![TemperatureRange { min: 0, max: 5, raw_level: 9 }]).unwrap_err();
        assert!(matches!(err, TableError::LevelOutOfRange { raw: 9, .. }));
    }

    #[test]
    fn validate_checks_platform_maximum() {
        let t = table(json!({ "0:50": 21 }));
        assert!(t.validate(&CoolingLimits::default()).is_err());
        let t = table(json!({ "0:50": 20 }));
        assert!(t.validate(&CoolingLimits::default()).is_ok());
    }

    #[test]
    fn platform_tables_select_by_trust() {
        let tables: PlatformTables = serde_json::from_value(json!({
            "unk_true": { "-127:120": 11 },
            "unk_false": { "-127:120": 15 }
        }))
        .unwrap();
        assert_eq!(tables.select(true).dynamic_minimum(30), Some(CoolingLevel(1)));
        assert_eq!(tables.select(false).dynamic_minimum(30), Some(CoolingLevel(5)));
    }
}
