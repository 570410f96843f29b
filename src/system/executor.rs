//! ipmitool subprocess executor.
//!
//! Commands go to the local BMC (`-I open`) unless `SWITCH_IPMI_HOST` points
//! them at a remote BMC or emulator over `lanplus`.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, trace};

/// A BMC that does not answer within this window is treated as failed.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BmcTarget {
    Local,
    Lan {
        host: String,
        port: String,
        user: String,
        password: String,
    },
}

impl BmcTarget {
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());
        match std::env::var("SWITCH_IPMI_HOST") {
            Ok(host) => BmcTarget::Lan {
                host,
                port: var("SWITCH_IPMI_PORT", "623"),
                user: var("SWITCH_IPMI_USER", "admin"),
                password: var("SWITCH_IPMI_PASS", "password"),
            },
            Err(_) => BmcTarget::Local,
        }
    }

    /// Interface flags placed before the ipmitool subcommand.
    pub fn interface_args(&self) -> Vec<&str> {
        match self {
            BmcTarget::Local => vec!["-I", "open"],
            BmcTarget::Lan { host, port, user, password } => {
                vec![
                    "-I",
                    "lanplus",
                    "-H",
                    host.as_str(),
                    "-p",
                    port.as_str(),
                    "-U",
                    user.as_str(),
                    "-P",
                    password.as_str(),
                ]
            }
        }
    }
}

async fn run_ipmitool(subcommand: &[&str]) -> Result<String> {
    let target = BmcTarget::from_env();
    if let BmcTarget::Lan { host, port, .. } = &target {
        debug!("IPMI routed over LAN to {}:{}", host, port);
    }

    let mut cmd = tokio::process::Command::new("ipmitool");
    cmd.args(target.interface_args()).args(subcommand).kill_on_drop(true);
    let what = subcommand.join(" ");
    trace!("Executing: ipmitool {}", what);

    let output = tokio::time::timeout(COMMAND_TIMEOUT, cmd.output())
        .await
        .map_err(|_| anyhow!("ipmitool {} timed out after {:?}", what, COMMAND_TIMEOUT))?
        .with_context(|| format!("Failed to execute ipmitool {}", what))?;

    if !output.status.success() {
        return Err(anyhow!(
            "ipmitool {} failed: {}",
            what,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// `ipmitool raw <bytes>`, used for OEM fan commands.
pub async fn run_ipmitool_raw(bytes: &str) -> Result<String> {
    debug!("Executing: ipmitool raw {}", bytes);
    let mut subcommand = vec!["raw"];
    subcommand.extend(bytes.split_whitespace());
    run_ipmitool(&subcommand).await
}

/// `ipmitool mc info`: BMC identity and firmware revision.
pub async fn run_ipmitool_mc_info() -> Result<String> {
    run_ipmitool(&["mc", "info"]).await
}

/// Value of a `Field : value` line from `ipmitool mc info` output.
pub fn parse_mc_field(output: &str, field: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.trim_start().starts_with(field))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MC_INFO: &str = "Device ID                 : 32\n\
        Device Revision           : 1\n\
        Firmware Revision         : 3.17\n\
        IPMI Version              : 2.0\n\
        Aux Firmware Rev Info     : \n    0x05\n";

    #[test]
    fn extracts_firmware_revision() {
        assert_eq!(parse_mc_field(MC_INFO, "Firmware Revision"), Some("3.17".to_string()));
        assert_eq!(parse_mc_field(MC_INFO, "IPMI Version"), Some("2.0".to_string()));
    }

    #[test]
    fn empty_or_missing_field_is_none() {
        assert_eq!(parse_mc_field(MC_INFO, "Aux Firmware Rev Info"), None);
        assert_eq!(parse_mc_field(MC_INFO, "Manufacturer ID"), None);
    }

    #[test]
    fn local_target_uses_open_interface() {
        assert_eq!(BmcTarget::Local.interface_args(), vec!["-I", "open"]);
    }

    #[test]
    fn lan_target_passes_credentials() {
        let target = BmcTarget::Lan {
            host: "10.0.0.5".to_string(),
            port: "6230".to_string(),
            user: "root".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(
            target.interface_args(),
            vec!["-I", "lanplus", "-H", "10.0.0.5", "-p", "6230", "-U", "root", "-P", "secret"]
        );
    }
}
