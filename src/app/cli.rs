//! Command-line argument definitions (clap) and help text.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;

pub const HELP_TEXT: &str = "
Switch Platform Agent
Usage: switch-platform-agent [OPTIONS]

Options:
  -h, --help                    Print help
  -V, --version                 Print version
Operation:
  -r, --run                     Run the agent loop (transceiver watcher + thermal policy)
  -w, --watch-sfp               Wait for one transceiver change event and print it
      --timeout-ms <MS>         Timeout for --watch-sfp (0 waits forever) [default: 0]
      --recover                 Run one thermal recovery evaluation
      --sfp-lpmode <PORT> <MODE>
                                Set low-power mode (on|off) on a QSFP28 port
      --sfp-reset <PORT>        Pulse the reset pin of a QSFP28 port
Config & Debug:
  -c, --show-config             Show current configuration
      --config-path <PATH>      Configuration file (default: <exe dir>/config.json)
      --test                    Test mode (print platform inventory only)
      --dry-run                 Log cooling writes instead of performing them
      --log-level <LOG_LEVEL>   Set log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
";

#[derive(Parser, Debug)]
#[command(name = "switch-platform-agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Switch Platform Agent", long_about = None)]
pub struct Args {
    // === Operation ===
    /// Run the agent loop (transceiver watcher + thermal policy)
    #[arg(short = 'r', long, help_heading = "Operation")]
    pub run: bool,

    /// Wait for one transceiver change event and print it
    #[arg(short = 'w', long = "watch-sfp", help_heading = "Operation")]
    pub watch_sfp: bool,

    /// Timeout for --watch-sfp in milliseconds (0 waits forever)
    #[arg(long = "timeout-ms", default_value_t = 0, allow_negative_numbers = true, help_heading = "Operation")]
    pub timeout_ms: i64,

    /// Run one thermal recovery evaluation
    #[arg(long, help_heading = "Operation")]
    pub recover: bool,

    /// Set low-power mode (on|off) on a QSFP28 port
    #[arg(long = "sfp-lpmode", num_args = 2, value_names = ["PORT", "MODE"], help_heading = "Operation")]
    pub sfp_lpmode: Option<Vec<String>>,

    /// Pulse the reset pin of a QSFP28 port
    #[arg(long = "sfp-reset", value_name = "PORT", help_heading = "Operation")]
    pub sfp_reset: Option<usize>,

    // === Config & Debug ===
    /// Show current configuration
    #[arg(short = 'c', long = "show-config", help_heading = "Config & Debug")]
    pub show_config: bool,

    /// Configuration file (default: <exe dir>/config.json)
    #[arg(long = "config-path", help_heading = "Config & Debug")]
    pub config_path: Option<PathBuf>,

    /// Test mode (print platform inventory only)
    #[arg(long, help_heading = "Config & Debug")]
    pub test: bool,

    /// Log cooling writes instead of performing them
    #[arg(long = "dry-run", help_heading = "Config & Debug")]
    pub dry_run: bool,

    /// Set log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
    #[arg(long = "log-level", help_heading = "Config & Debug")]
    pub log_level: Option<String>,
}

impl Args {
    pub fn has_command(&self) -> bool {
        self.run
            || self.watch_sfp
            || self.recover
            || self.sfp_lpmode.is_some()
            || self.sfp_reset.is_some()
            || self.show_config
            || self.test
    }

    /// `--sfp-lpmode <PORT> <on|off>` as a 1-based port and the requested mode.
    pub fn lpmode_request(&self) -> Result<Option<(usize, bool)>> {
        let Some(values) = &self.sfp_lpmode else {
            return Ok(None);
        };
        let [port, mode] = values.as_slice() else {
            return Err(anyhow!("--sfp-lpmode takes <PORT> <on|off>"));
        };
        let port = port
            .parse::<usize>()
            .map_err(|_| anyhow!("Invalid port '{}'", port))?;
        let lpmode = match mode.to_lowercase().as_str() {
            "on" | "1" | "true" => true,
            "off" | "0" | "false" => false,
            _ => return Err(anyhow!("Invalid lpmode '{}', expected on or off", mode)),
        };
        Ok(Some((port, lpmode)))
    }
}
