//! Switch platform agent entry point: CLI dispatch, signal handlers, async runtime.

mod app;
mod config;
mod daemon;
mod platform;
mod presence;
mod system;
mod thermal;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use app::cli::{Args, HELP_TEXT};
use app::logging::{filter_for_level, init_tracing, reload_level};
use config::persistence::load_config;
use config::types::AgentConfig;
use daemon::Agent;
use platform::Chassis;
use presence::PresencePoller;
use thermal::actions::ActionRegistry;
use thermal::actuator::build_actuator;
use thermal::{CoolingController, RecoveryEvaluator};

#[tokio::main]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            if err.kind() == clap::error::ErrorKind::DisplayHelp {
                print!("{}", HELP_TEXT);
                std::process::exit(0);
            }
            if err.kind() == clap::error::ErrorKind::DisplayVersion {
                println!("\x1b[32mswitch-platform-agent {} ({})\x1b[0m", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
                std::process::exit(0);
            }

            eprintln!("{}", err);
            eprintln!();
            print!("{}", HELP_TEXT);
            eprintln!("\nFor more information, try '--help'.");
            std::process::exit(1);
        }
    };

    if !args.has_command() {
        eprintln!("ERROR: No command specified. You must specify a command.");
        eprintln!();
        let _ = Args::command().print_help();
        eprintln!();
        eprintln!("Common commands:");
        eprintln!("  ./switch-platform-agent --run         Run the agent");
        eprintln!("  ./switch-platform-agent --test        Print platform inventory");
        eprintln!("  ./switch-platform-agent --watch-sfp   Wait for a transceiver change");
        eprintln!("  ./switch-platform-agent --sfp-reset 1 Reset the module in port 1");
        std::process::exit(1);
    }

    // Priority: 1. --log-level flag, 2. LOG_LEVEL env, 3. config file, 4. default (info)
    let explicit_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok());
    let filter = match explicit_level.as_deref() {
        Some(level) => filter_for_level(level).unwrap_or_else(|| {
            eprintln!("Invalid log level '{}'. Using INFO. Valid levels: TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL", level);
            "info"
        }),
        None => "info",
    };
    init_tracing(filter);

    let config = load_config(args.config_path.as_deref()).await?;
    if explicit_level.is_none() {
        if let Err(e) = reload_level(&config.agent.log_level) {
            warn!("Ignoring config log level: {:#}", e);
        }
    }

    if args.show_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let dry_run = args.dry_run || config.agent.dry_run;
    if dry_run {
        info!("Dry run: cooling levels will be logged, not applied");
    }

    let limits = config.cooling.limits;
    let chassis = Arc::new(Chassis::from_settings(&config.platform, limits));

    if args.test {
        info!("Running in test mode");
        let inventory = chassis.inventory().await;
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        info!(
            "Discovered {} components, {} fans and {} ports",
            inventory.components.len(),
            inventory.fans.len(),
            inventory.sfps.len()
        );
        return Ok(());
    }

    if let Some((port, lpmode)) = args.lpmode_request()? {
        return chassis.set_port_lpmode(port, lpmode).await;
    }
    if let Some(port) = args.sfp_reset {
        return chassis.reset_port(port).await;
    }

    let cancel = CancellationToken::new();
    spawn_shutdown_handler(cancel.clone());

    if args.watch_sfp {
        let mut poller = PresencePoller::new(chassis.num_ports());
        match poller.change_event(chassis.as_ref(), args.timeout_ms, &cancel).await? {
            Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
            None => info!("No transceiver change within {} ms", args.timeout_ms),
        }
        return Ok(());
    }

    let controller = Arc::new(build_controller(&config, dry_run));

    if args.recover {
        match controller.recover(chassis.platform_name(), chassis.as_ref()).await? {
            Some(level) => info!("Cooling level {} applied", level),
            None => info!("Recovery skipped: no cooling floor available"),
        }
        return Ok(());
    }

    let actions = ActionRegistry::default().resolve_all(&config.thermal_actions)?;

    #[cfg(target_os = "linux")]
    spawn_reload_handler(args.config_path.clone(), explicit_level.is_some());

    let agent = Agent::new(
        chassis.platform_name(),
        chassis.num_ports(),
        Duration::from_secs_f64(config.agent.update_interval),
        Arc::clone(&chassis),
        controller,
        actions,
    );
    agent.run(cancel).await;

    info!("Agent shutdown complete");
    Ok(())
}

fn build_controller(config: &AgentConfig, dry_run: bool) -> CoolingController {
    let limits = config.cooling.limits;
    if config.minimum_tables.platform(&config.platform.platform_name).is_none() {
        warn!(
            "No minimum table for platform '{}' ({} table(s) configured); recovery will use level {}",
            config.platform.platform_name,
            config.minimum_tables.len(),
            limits.unknown_sku_level
        );
    }
    let evaluator = RecoveryEvaluator::new(config.minimum_tables.clone(), limits);
    CoolingController::new(evaluator, build_actuator(&config.cooling.actuator, dry_run))
}

fn spawn_shutdown_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Shutdown signal received (Ctrl+C)");
        cancel.cancel();
    });
}

/// SIGHUP re-reads the config file and applies its log level, unless the
/// level was pinned by flag or environment.
#[cfg(target_os = "linux")]
fn spawn_reload_handler(config_path: Option<std::path::PathBuf>, level_pinned: bool) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(sighup) => sighup,
        Err(e) => {
            warn!("Failed to set up SIGHUP handler: {}", e);
            return;
        }
    };

    tokio::spawn(async move {
        while sighup.recv().await.is_some() {
            if level_pinned {
                info!("SIGHUP received; log level pinned by --log-level or LOG_LEVEL, not reloading");
                continue;
            }
            info!("SIGHUP received, reloading log level configuration");
            match load_config(config_path.as_deref()).await {
                Ok(new_config) => match reload_level(&new_config.agent.log_level) {
                    Ok(()) => info!("Log level reloaded: {}", new_config.agent.log_level.to_uppercase()),
                    Err(e) => error!("Failed to reload log level: {:#}", e),
                },
                Err(e) => error!("Failed to reload config: {:#}", e),
            }
        }
    });
}
