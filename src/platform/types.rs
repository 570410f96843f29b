//! Platform device enums and the inventory report structures.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanDirection {
    Intake,
    Exhaust,
}

/// Transceiver form factor seated in a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SfpType {
    #[serde(rename = "SFP")]
    Sfp,
    #[serde(rename = "SFP28")]
    Sfp28,
    #[serde(rename = "QSFP")]
    Qsfp,
    #[serde(rename = "QSFP28")]
    Qsfp28,
    #[serde(rename = "QSFP_DD")]
    QsfpDd,
}

impl SfpType {
    /// Low-power mode and reset pins are only wired for QSFP28 cages.
    pub fn has_control_pins(self) -> bool {
        matches!(self, SfpType::Qsfp28)
    }
}

impl fmt::Display for SfpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SfpType::Sfp => "SFP",
            SfpType::Sfp28 => "SFP28",
            SfpType::Qsfp => "QSFP",
            SfpType::Qsfp28 => "QSFP28",
            SfpType::QsfpDd => "QSFP_DD",
        };
        f.write_str(name)
    }
}

// ============================================================================
// INVENTORY REPORT (`--test` output)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReport {
    pub metadata: InventoryMetadata,
    pub components: Vec<ComponentReport>,
    pub fans: Vec<FanReport>,
    pub sfps: Vec<SfpReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryMetadata {
    pub agent_version: String,
    pub platform: String,
    pub is_elevated: bool,
    pub timestamp: String,
    /// System status LED color; `None` when not configured or unreadable.
    pub status_led: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub name: String,
    pub description: String,
    pub firmware_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanReport {
    pub name: String,
    pub speed_rpm: u32,
    pub speed_percent: u8,
    pub direction: FanDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SfpReport {
    pub port: usize,
    #[serde(rename = "type")]
    pub sfp_type: SfpType,
    /// `None` when the presence attribute could not be read.
    pub present: Option<bool>,
    pub lpmode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sfp_type_names_round_trip_config_spelling() {
        let parsed: SfpType = serde_json::from_str("\"QSFP_DD\"").unwrap();
        assert_eq!(parsed, SfpType::QsfpDd);
        assert_eq!(parsed.to_string(), "QSFP_DD");
    }

    #[test]
    fn only_qsfp28_has_control_pins() {
        assert!(SfpType::Qsfp28.has_control_pins());
        assert!(!SfpType::Sfp28.has_control_pins());
        assert!(!SfpType::QsfpDd.has_control_pins());
    }

    #[test]
    fn direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FanDirection::Exhaust).unwrap(), "\"exhaust\"");
    }
}
