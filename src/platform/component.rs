//! Firmware-carrying components (CPLDs, BIOS, BMC).
//!
//! Versions are reported exactly as the source presents them.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::types::ComponentReport;
use super::FirmwareReadable;
use crate::config::types::{ComponentSettings, ComponentSource};
use crate::system::{executor, sysfs};

#[derive(Debug, Clone)]
enum VersionSource {
    Sysfs(PathBuf),
    BmcRevision,
}

#[derive(Debug, Clone)]
pub struct Component {
    name: String,
    description: String,
    source: VersionSource,
}

impl Component {
    pub fn from_settings(settings: &ComponentSettings) -> Self {
        let source = match &settings.source {
            ComponentSource::Sysfs { path } => VersionSource::Sysfs(PathBuf::from(path)),
            ComponentSource::BmcRevision => VersionSource::BmcRevision,
        };
        Self {
            name: settings.name.clone(),
            description: settings.description.clone(),
            source,
        }
    }

    pub async fn report(&self) -> ComponentReport {
        ComponentReport {
            name: self.name().to_string(),
            description: self.description().to_string(),
            firmware_version: self.firmware_version().await,
        }
    }

    async fn read_version(&self) -> Result<String> {
        match &self.source {
            VersionSource::Sysfs(path) => sysfs::read_attr(path).await,
            VersionSource::BmcRevision => {
                let output = executor::run_ipmitool_mc_info().await?;
                executor::parse_mc_field(&output, "Firmware Revision")
                    .ok_or_else(|| anyhow::anyhow!("no Firmware Revision in mc info output"))
            }
        }
    }
}

#[async_trait]
impl FirmwareReadable for Component {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn firmware_version(&self) -> Option<String> {
        match self.read_version().await {
            Ok(version) if !version.is_empty() => Some(version),
            Ok(_) => None,
            Err(e) => {
                debug!("{}: firmware version unavailable: {:#}", self.name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn sysfs_component(name: &str, path: &Path) -> Component {
        Component::from_settings(&ComponentSettings {
            name: name.to_string(),
            description: format!("{} description", name),
            source: ComponentSource::Sysfs {
                path: path.to_string_lossy().to_string(),
            },
        })
    }

    #[tokio::test]
    async fn sysfs_version_is_returned_raw() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpld1_version"), "0x47\n").unwrap();
        let cpld = sysfs_component("CPLD1", &dir.path().join("cpld1_version"));

        assert_eq!(cpld.name(), "CPLD1");
        assert_eq!(cpld.firmware_version().await.as_deref(), Some("0x47"));
        assert_eq!(cpld.report().await.description, "CPLD1 description");
    }

    #[tokio::test]
    async fn unreadable_or_empty_version_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bios_version"), "\n").unwrap();

        assert_eq!(sysfs_component("BIOS", &dir.path().join("bios_version")).firmware_version().await, None);
        assert_eq!(sysfs_component("CPLD2", &dir.path().join("missing")).firmware_version().await, None);
    }

    #[test]
    fn default_inventory_matches_platform_list() {
        let config = crate::config::types::AgentConfig::default();
        let names: Vec<_> = config
            .platform
            .components
            .iter()
            .map(Component::from_settings)
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["CPLD1", "CPLD2", "BIOS", "BMC"]);
    }
}
