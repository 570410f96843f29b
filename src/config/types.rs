//! Agent configuration structs and defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::platform::types::{FanDirection, SfpType};
use crate::thermal::actuator::ActuatorSettings;
use crate::thermal::table::MinimumTables;
use crate::thermal::types::CoolingLimits;
use crate::thermal::zone::{DEFAULT_HYSTERESIS, DEFAULT_ZONE_PATTERN};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent: AgentSettings,
    pub platform: PlatformSettings,
    #[serde(default)]
    pub cooling: CoolingSettings,
    /// Platform name -> `{"unk_true": {...}, "unk_false": {...}}`
    #[serde(default)]
    pub minimum_tables: MinimumTables,
    /// Policy actions run on every thermal cycle, in order.
    #[serde(default = "default_thermal_actions")]
    pub thermal_actions: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub name: String,
    pub update_interval: f64,
    pub log_level: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    pub platform_name: String,
    pub num_ports: usize,
    pub sfp: SfpSettings,
    pub fans: FanSettings,
    #[serde(default)]
    pub components: Vec<ComponentSettings>,
    pub thermal: ThermalSensorSettings,
    /// System status LED attribute, holding the LED color name.
    #[serde(default)]
    pub status_led_path: Option<String>,
}

/// Path templates take `{{PORT}}`, the 1-based front-panel port number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfpSettings {
    pub default_type: SfpType,
    /// 1-based port number -> module type, for ports that differ from the default
    #[serde(default)]
    pub port_types: BTreeMap<usize, SfpType>,
    pub presence_path: String,
    pub lpmode_path: String,
    pub reset_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanSettings {
    pub num_trays: usize,
    pub fans_per_tray: usize,
    pub max_rpm: u32,
    /// Takes `{{FAN}}`, the 1-based fan number across all trays.
    pub rpm_path: String,
    #[serde(default = "default_fan_direction")]
    pub direction: FanDirection,
    #[serde(default)]
    pub psu: Option<PsuFanSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsuFanSettings {
    pub num_psus: usize,
    pub fans_per_psu: usize,
    pub max_rpm: u32,
    /// Takes `{{PSU}}` and `{{FAN}}`, both 1-based.
    pub rpm_path: String,
    /// PSU airflow cannot be read back, so it is configured.
    #[serde(default = "default_fan_direction")]
    pub direction: FanDirection,
}

fn default_fan_direction() -> FanDirection {
    FanDirection::Exhaust
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSettings {
    pub name: String,
    pub description: String,
    pub source: ComponentSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentSource {
    /// Version string read verbatim from a sysfs attribute.
    Sysfs { path: String },
    /// `Firmware Revision` reported by `ipmitool mc info`.
    BmcRevision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalSensorSettings {
    /// Ambient sensors (milli-degrees); the lowest reading is used.
    pub ambient_sensors: Vec<String>,
    /// Attribute holding 1 while module temperatures are trustworthy.
    #[serde(default)]
    pub trust_path: Option<String>,
    #[serde(default = "default_zone_pattern")]
    pub zone_pattern: String,
    #[serde(default = "default_zone_hysteresis")]
    pub zone_hysteresis: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoolingSettings {
    #[serde(default)]
    pub limits: CoolingLimits,
    #[serde(default)]
    pub actuator: ActuatorSettings,
}

fn default_zone_pattern() -> String {
    DEFAULT_ZONE_PATTERN.to_string()
}

fn default_zone_hysteresis() -> i64 {
    DEFAULT_HYSTERESIS
}

pub fn default_thermal_actions() -> Vec<Value> {
    vec![serde_json::json!({ "type": crate::thermal::actions::THERMAL_RECOVER })]
}

impl AgentConfig {
    /// Reject configurations the agent cannot run safely with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.platform.num_ports == 0 {
            anyhow::bail!("platform.num_ports must be greater than 0");
        }
        if !(self.agent.update_interval > 0.0) {
            anyhow::bail!("agent.update_interval must be positive, got {}", self.agent.update_interval);
        }
        if let Some(port) = self.platform.sfp.port_types.keys().find(|p| **p == 0 || **p > self.platform.num_ports) {
            anyhow::bail!("sfp.port_types references port {} outside 1..={}", port, self.platform.num_ports);
        }
        self.cooling.limits.validate()?;
        self.minimum_tables.validate(&self.cooling.limits)?;
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        let hostname = hostname::get()
            .unwrap_or_else(|_| std::ffi::OsString::from("unknown"))
            .to_string_lossy()
            .to_string();

        let pddf = "/sys/kernel/pddf/devices";

        Self {
            agent: AgentSettings {
                name: hostname,
                update_interval: 60.0,
                log_level: "INFO".to_string(),
                dry_run: false,
            },
            platform: PlatformSettings {
                platform_name: "x86_64-ufispace_s9300_32d-r0".to_string(),
                num_ports: 32,
                sfp: SfpSettings {
                    default_type: SfpType::Qsfp28,
                    port_types: BTreeMap::new(),
                    presence_path: format!("{}/xcvr/port{{{{PORT}}}}/xcvr_present", pddf),
                    lpmode_path: format!("{}/xcvr/port{{{{PORT}}}}/xcvr_lpmode", pddf),
                    reset_path: format!("{}/xcvr/port{{{{PORT}}}}/xcvr_reset", pddf),
                },
                fans: FanSettings {
                    num_trays: 6,
                    fans_per_tray: 2,
                    max_rpm: 32_000,
                    rpm_path: format!("{}/fan/fan{{{{FAN}}}}_speed_rpm", pddf),
                    direction: FanDirection::Exhaust,
                    psu: Some(PsuFanSettings {
                        num_psus: 2,
                        fans_per_psu: 1,
                        max_rpm: 27_000,
                        rpm_path: format!("{}/psu/psu{{{{PSU}}}}/psu_fan{{{{FAN}}}}_speed_rpm", pddf),
                        direction: FanDirection::Exhaust,
                    }),
                },
                components: vec![
                    ComponentSettings {
                        name: "CPLD1".to_string(),
                        description: "CPLD 1".to_string(),
                        source: ComponentSource::Sysfs {
                            path: format!("{}/sysstatus/sysstatus_data/cpld1_version", pddf),
                        },
                    },
                    ComponentSettings {
                        name: "CPLD2".to_string(),
                        description: "CPLD 2".to_string(),
                        source: ComponentSource::Sysfs {
                            path: format!("{}/sysstatus/sysstatus_data/cpld2_version", pddf),
                        },
                    },
                    ComponentSettings {
                        name: "BIOS".to_string(),
                        description: "Basic Input/Output System".to_string(),
                        source: ComponentSource::Sysfs {
                            path: "/sys/class/dmi/id/bios_version".to_string(),
                        },
                    },
                    ComponentSettings {
                        name: "BMC".to_string(),
                        description: "BMC".to_string(),
                        source: ComponentSource::BmcRevision,
                    },
                ],
                thermal: ThermalSensorSettings {
                    ambient_sensors: vec![
                        "/run/hw-management/thermal/port_amb".to_string(),
                        "/run/hw-management/thermal/fan_amb".to_string(),
                    ],
                    trust_path: None,
                    zone_pattern: default_zone_pattern(),
                    zone_hysteresis: DEFAULT_HYSTERESIS,
                },
                status_led_path: Some(format!("{}/led/sys_led", pddf)),
            },
            cooling: CoolingSettings::default(),
            minimum_tables: MinimumTables::default(),
            thermal_actions: default_thermal_actions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        AgentConfig::default().validate().unwrap();
    }

    #[test]
    fn default_templates_carry_placeholders() {
        let config = AgentConfig::default();
        assert!(config.platform.sfp.presence_path.ends_with("/xcvr/port{{PORT}}/xcvr_present"));
        assert!(config.platform.fans.rpm_path.contains("fan{{FAN}}_speed_rpm"));
    }

    #[test]
    fn zero_ports_rejected() {
        let mut config = AgentConfig::default();
        config.platform.num_ports = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn port_type_overrides_must_exist() {
        let mut config = AgentConfig::default();
        config.platform.sfp.port_types.insert(33, SfpType::Sfp28);
        assert!(config.validate().is_err());
        config.platform.sfp.port_types.clear();
        config.platform.sfp.port_types.insert(32, SfpType::Sfp28);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tables_above_platform_max_rejected() {
        let mut config = AgentConfig::default();
        config.minimum_tables = serde_json::from_value(json!({
            "x86_64-ufispace_s9300_32d-r0": {
                "unk_true": { "-127:120": 21 },
                "unk_false": { "-127:120": 15 }
            }
        }))
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("x86_64-ufispace_s9300_32d-r0"));
    }

    #[test]
    fn omitted_sections_take_defaults() {
        let mut value = serde_json::to_value(AgentConfig::default()).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("cooling");
        object.remove("minimum_tables");
        object.remove("thermal_actions");

        let config: AgentConfig = serde_json::from_value(value).unwrap();
        assert_eq!(config.cooling.limits, CoolingLimits::default());
        assert_eq!(config.thermal_actions, default_thermal_actions());
    }

    #[test]
    fn fan_direction_defaults_to_exhaust() {
        let mut value = serde_json::to_value(AgentConfig::default()).unwrap();
        let fans = &mut value["platform"]["fans"];
        fans.as_object_mut().unwrap().remove("direction");
        fans["psu"]["direction"] = json!("intake");

        let config: AgentConfig = serde_json::from_value(value).unwrap();
        assert_eq!(config.platform.fans.direction, FanDirection::Exhaust);
        assert_eq!(config.platform.fans.psu.unwrap().direction, FanDirection::Intake);
    }
}
