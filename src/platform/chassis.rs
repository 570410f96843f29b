//! Chassis: owns every platform device and serves the [`DeviceReader`] reads.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::component::Component;
use super::fan::Fan;
use super::sfp::Sfp;
use super::types::{InventoryMetadata, InventoryReport};
use super::{DeviceReader, PresenceReadable};
use crate::config::types::PlatformSettings;
use crate::system::sysfs;
use crate::thermal::types::{CoolingLevel, CoolingLimits};
use crate::thermal::zone::ThermalZoneScanner;

pub struct Chassis {
    platform_name: String,
    sfps: Vec<Sfp>,
    fans: Vec<Fan>,
    components: Vec<Component>,
    ambient_sensors: Vec<PathBuf>,
    trust_path: Option<PathBuf>,
    status_led_path: Option<PathBuf>,
    zones: ThermalZoneScanner,
}

impl Chassis {
    pub fn from_settings(settings: &PlatformSettings, limits: CoolingLimits) -> Self {
        let sfps = (0..settings.num_ports)
            .map(|index| Sfp::from_settings(index, &settings.sfp))
            .collect();
        let thermal = &settings.thermal;

        Self {
            platform_name: settings.platform_name.clone(),
            sfps,
            fans: Fan::all_from_settings(&settings.fans),
            components: settings.components.iter().map(Component::from_settings).collect(),
            ambient_sensors: thermal.ambient_sensors.iter().map(PathBuf::from).collect(),
            trust_path: thermal.trust_path.as_ref().map(PathBuf::from),
            status_led_path: settings.status_led_path.as_ref().map(PathBuf::from),
            zones: ThermalZoneScanner::new(thermal.zone_pattern.clone(), thermal.zone_hysteresis, limits),
        }
    }

    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    pub fn num_ports(&self) -> usize {
        self.sfps.len()
    }

    /// Transceiver in the 0-based port `index`.
    pub fn get_sfp(&self, index: usize) -> Option<&Sfp> {
        let sfp = self.sfps.get(index);
        if sfp.is_none() {
            warn!("SFP index {} out of range (0-{})", index, self.sfps.len().saturating_sub(1));
        }
        sfp
    }

    /// Transceiver in the 1-based front-panel `port`.
    fn port(&self, port: usize) -> Result<&Sfp> {
        port.checked_sub(1)
            .and_then(|index| self.get_sfp(index))
            .ok_or_else(|| anyhow!("port {} out of range (1-{})", port, self.sfps.len()))
    }

    /// Put the module in a 1-based `port` into or out of low-power mode.
    pub async fn set_port_lpmode(&self, port: usize, lpmode: bool) -> Result<()> {
        let sfp = self.port(port)?;
        if !sfp.set_lpmode(lpmode).await {
            bail!("Port {} ({}): low-power mode not changed", port, sfp.sfp_type());
        }
        info!(
            "Port {} ({}): lpmode {}",
            sfp.index() + 1,
            sfp.sfp_type(),
            if sfp.lpmode().await { "on" } else { "off" }
        );
        Ok(())
    }

    /// Pulse the reset pin of the module in a 1-based `port`.
    pub async fn reset_port(&self, port: usize) -> Result<()> {
        let sfp = self.port(port)?;
        if !sfp.reset().await {
            bail!("Port {} ({}): reset not carried out", port, sfp.sfp_type());
        }
        info!("Port {} ({}): reset", sfp.index() + 1, sfp.sfp_type());
        Ok(())
    }

    /// Color of the system status LED.
    pub async fn status_led(&self) -> Option<String> {
        let path = self.status_led_path.as_ref()?;
        match sysfs::read_attr(path).await {
            Ok(color) if !color.is_empty() => Some(color),
            Ok(_) => None,
            Err(e) => {
                debug!("Status LED unreadable: {:#}", e);
                None
            }
        }
    }

    /// Point-in-time dump of every device, for `--test`.
    pub async fn inventory(&self) -> InventoryReport {
        let mut components = Vec::with_capacity(self.components.len());
        for component in &self.components {
            components.push(component.report().await);
        }
        let mut fans = Vec::with_capacity(self.fans.len());
        for fan in &self.fans {
            fans.push(fan.report().await);
        }
        let mut sfps = Vec::with_capacity(self.sfps.len());
        for sfp in &self.sfps {
            sfps.push(sfp.report().await);
        }

        InventoryReport {
            metadata: InventoryMetadata {
                agent_version: env!("CARGO_PKG_VERSION").to_string(),
                platform: self.platform_name.clone(),
                is_elevated: is_elevated(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                status_led: self.status_led().await,
            },
            components,
            fans,
            sfps,
        }
    }
}

#[cfg(target_os = "linux")]
fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(target_os = "linux"))]
fn is_elevated() -> bool {
    false
}

#[async_trait]
impl DeviceReader for Chassis {
    async fn presence(&self, index: usize) -> Result<bool> {
        let sfp = self
            .sfps
            .get(index)
            .ok_or_else(|| anyhow!("port index {} out of range (0-{})", index, self.sfps.len().saturating_sub(1)))?;
        sfp.presence().await
    }

    async fn ambient_temperature(&self) -> Result<i32> {
        let mut lowest: Option<i64> = None;
        for sensor in &self.ambient_sensors {
            let value = sysfs::read_int(sensor).await?;
            lowest = Some(lowest.map_or(value, |current| current.min(value)));
        }
        let lowest = lowest.ok_or_else(|| anyhow!("no ambient sensors configured"))?;
        i32::try_from(lowest).with_context(|| format!("Ambient reading {} out of range", lowest))
    }

    async fn zone_floor(&self) -> Option<CoolingLevel> {
        self.zones.floor().await
    }

    async fn is_trustworthy(&self) -> bool {
        let Some(path) = &self.trust_path else {
            return true;
        };
        match sysfs::read_attr(path).await {
            Ok(value) => value == "1",
            Err(e) => {
                debug!("Trust flag unreadable, treating temperatures as untrusted: {:#}", e);
                false
            }
        }
    }
}
