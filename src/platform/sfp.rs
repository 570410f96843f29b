//! Front-panel transceiver cage.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::types::{SfpReport, SfpType};
use super::PresenceReadable;
use crate::config::types::SfpSettings;
use crate::system::{sysfs, template};

/// How long the reset pin is held asserted.
const RESET_HOLD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Sfp {
    index: usize,
    sfp_type: SfpType,
    presence_path: PathBuf,
    lpmode_path: PathBuf,
    reset_path: PathBuf,
}

impl Sfp {
    /// `index` is 0-based; the path templates see the 1-based port number.
    pub fn from_settings(index: usize, settings: &SfpSettings) -> Self {
        let port = (index + 1).to_string();
        let vars = [("PORT", port.as_str())];
        let sfp_type = settings
            .port_types
            .get(&(index + 1))
            .copied()
            .unwrap_or(settings.default_type);

        Self {
            index,
            sfp_type,
            presence_path: PathBuf::from(template::render(&settings.presence_path, &vars)),
            lpmode_path: PathBuf::from(template::render(&settings.lpmode_path, &vars)),
            reset_path: PathBuf::from(template::render(&settings.reset_path, &vars)),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn sfp_type(&self) -> SfpType {
        self.sfp_type
    }

    /// Whether the module is held in low-power mode. Always `false` on cages
    /// without a low-power pin.
    pub async fn lpmode(&self) -> bool {
        if !self.sfp_type.has_control_pins() {
            return false;
        }
        match sysfs::read_attr(&self.lpmode_path).await {
            Ok(value) => value == "1",
            Err(e) => {
                debug!("Port {}: lpmode unreadable: {:#}", self.index + 1, e);
                false
            }
        }
    }

    /// Returns whether the request was carried out.
    pub async fn set_lpmode(&self, lpmode: bool) -> bool {
        if !self.sfp_type.has_control_pins() {
            return false;
        }
        let value = if lpmode { "1" } else { "0" };
        match sysfs::write_attr(&self.lpmode_path, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Port {}: failed to set lpmode: {:#}", self.index + 1, e);
                false
            }
        }
    }

    /// Pulse the reset pin. Returns whether the reset was carried out.
    pub async fn reset(&self) -> bool {
        if !self.sfp_type.has_control_pins() {
            return false;
        }
        if let Err(e) = sysfs::write_attr(&self.reset_path, "1").await {
            warn!("Port {}: failed to assert reset: {:#}", self.index + 1, e);
            return false;
        }
        tokio::time::sleep(RESET_HOLD).await;
        match sysfs::write_attr(&self.reset_path, "0").await {
            Ok(()) => true,
            Err(e) => {
                warn!("Port {}: failed to release reset: {:#}", self.index + 1, e);
                false
            }
        }
    }

    pub async fn report(&self) -> SfpReport {
        SfpReport {
            port: self.index + 1,
            sfp_type: self.sfp_type,
            present: self.presence().await.ok(),
            lpmode: self.lpmode().await,
        }
    }
}

#[async_trait]
impl PresenceReadable for Sfp {
    async fn presence(&self) -> Result<bool> {
        Ok(sysfs::read_attr(&self.presence_path).await? == "1")
    }
}
