//! Fan tray and PSU fans.
//!
//! Speed attributes hold RPM. A reading that is missing, alphabetic (e.g.
//! "N/A" while a tray is pulled) or otherwise unparsable counts as a stopped
//! fan.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::trace;

use super::types::{FanDirection, FanReport};
use super::SpeedReadable;
use crate::config::types::{FanSettings, PsuFanSettings};
use crate::system::{sysfs, template};

#[derive(Debug, Clone)]
pub struct Fan {
    name: String,
    rpm_path: PathBuf,
    max_rpm: u32,
    direction: FanDirection,
}

impl Fan {
    /// `tray` and `fan` are 1-based. Fans are numbered across trays:
    /// `(tray - 1) * fans_per_tray + fan`.
    pub fn tray_fan(tray: usize, fan: usize, settings: &FanSettings) -> Self {
        let number = (tray - 1) * settings.fans_per_tray + fan;
        let number = number.to_string();
        Self {
            name: format!("FAN{}_{}", tray, fan),
            rpm_path: PathBuf::from(template::render(&settings.rpm_path, &[("FAN", &number)])),
            max_rpm: settings.max_rpm,
            direction: settings.direction,
        }
    }

    /// `psu` and `fan` are 1-based.
    pub fn psu_fan(psu: usize, fan: usize, settings: &PsuFanSettings) -> Self {
        let psu_number = psu.to_string();
        let fan_number = fan.to_string();
        Self {
            name: format!("PSU{}_FAN{}", psu, fan),
            rpm_path: PathBuf::from(template::render(
                &settings.rpm_path,
                &[("PSU", &psu_number), ("FAN", &fan_number)],
            )),
            max_rpm: settings.max_rpm,
            direction: settings.direction,
        }
    }

    /// Every tray fan followed by every PSU fan.
    pub fn all_from_settings(settings: &FanSettings) -> Vec<Fan> {
        let mut fans = Vec::new();
        for tray in 1..=settings.num_trays {
            for fan in 1..=settings.fans_per_tray {
                fans.push(Fan::tray_fan(tray, fan, settings));
            }
        }
        if let Some(psu) = &settings.psu {
            for index in 1..=psu.num_psus {
                for fan in 1..=psu.fans_per_psu {
                    fans.push(Fan::psu_fan(index, fan, psu));
                }
            }
        }
        fans
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn report(&self) -> FanReport {
        FanReport {
            name: self.name().to_string(),
            speed_rpm: self.speed_rpm().await,
            speed_percent: self.speed_percent().await,
            direction: self.direction(),
        }
    }
}

fn parse_rpm(raw: &str) -> u32 {
    // Some drivers report "12000.0"; fractions truncate.
    raw.parse::<f64>()
        .ok()
        .filter(|rpm| rpm.is_finite() && *rpm > 0.0)
        .map(|rpm| rpm as u32)
        .unwrap_or(0)
}

fn rpm_to_percent(rpm: u32, max_rpm: u32) -> u8 {
    if max_rpm == 0 {
        return 0;
    }
    (rpm as u64 * 100 / max_rpm as u64).min(100) as u8
}

#[async_trait]
impl SpeedReadable for Fan {
    async fn speed_percent(&self) -> u8 {
        rpm_to_percent(self.speed_rpm().await, self.max_rpm)
    }

    async fn speed_rpm(&self) -> u32 {
        match sysfs::read_attr(&self.rpm_path).await {
            Ok(raw) => parse_rpm(&raw),
            Err(e) => {
                trace!("{}: {:#}", self.name, e);
                0
            }
        }
    }

    fn direction(&self) -> FanDirection {
        self.direction
    }
}
