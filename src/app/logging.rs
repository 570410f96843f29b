//! Tracing subscriber setup and runtime log level changes.
//!
//! Lines look like `2026-03-02 14:05:09 [INFO] poller: Port 3: transceiver inserted`.
//! The module tag tells the transceiver watcher and the thermal loop apart
//! when both run in one process.

use std::fmt::Write as _;
use std::sync::OnceLock;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{reload, EnvFilter, Registry};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

/// Map a user-facing level name onto a tracing filter directive.
/// CRITICAL has no tracing equivalent and is folded into ERROR.
pub fn filter_for_level(level: &str) -> Option<&'static str> {
    match level.to_lowercase().as_str() {
        "critical" | "error" => Some("error"),
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        _ => None,
    }
}

/// Local wall-clock time, second resolution.
pub struct AgentTimer;

impl FormatTime for AgentTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let (date, time) = local_now();
        write!(w, "{}", format_stamp(date, time))
    }
}

#[cfg(target_os = "linux")]
fn local_now() -> ((i32, i32, i32), (i32, i32, i32)) {
    // SAFETY: localtime_r only writes into the zeroed tm we own.
    unsafe {
        let now = libc::time(std::ptr::null_mut());
        let mut tm: libc::tm = std::mem::zeroed();
        libc::localtime_r(&now, &mut tm);
        (
            (tm.tm_year + 1900, tm.tm_mon + 1, tm.tm_mday),
            (tm.tm_hour, tm.tm_min, tm.tm_sec),
        )
    }
}

#[cfg(not(target_os = "linux"))]
fn local_now() -> ((i32, i32, i32), (i32, i32, i32)) {
    use chrono::{Datelike, Timelike};

    let now = chrono::Local::now();
    (
        (now.year(), now.month() as i32, now.day() as i32),
        (now.hour() as i32, now.minute() as i32, now.second() as i32),
    )
}

fn format_stamp((year, month, day): (i32, i32, i32), (hour, minute, second): (i32, i32, i32)) -> String {
    format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", year, month, day, hour, minute, second)
}

/// Last path segment of an event target: `switch_platform_agent::presence::poller` -> `poller`.
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "\x1b[2m",
        Level::DEBUG => "\x1b[34m",
        Level::INFO => "\x1b[32m",
        Level::WARN => "\x1b[33m",
        Level::ERROR => "\x1b[31m",
    }
}

/// `<timestamp> [LEVEL] <module>: <message>`
pub struct AgentEventFormat;

impl<S, N> FormatEvent<S, N> for AgentEventFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        AgentTimer.format_time(&mut writer)?;

        let metadata = event.metadata();
        let level = metadata.level();
        let mut tag = String::new();
        if writer.has_ansi_escapes() {
            write!(tag, "{}[{}]\x1b[0m", level_color(level), level)?;
        } else {
            write!(tag, "[{}]", level)?;
        }
        write!(writer, " {} {}: ", tag, short_target(metadata.target()))?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber. The filter stays swappable through
/// [`reload_level`].
pub fn init_tracing(filter: &str) {
    use tracing_subscriber::prelude::*;

    let (filter_layer, handle) = reload::Layer::new(EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .fmt_fields(DefaultFields::new())
                .event_format(AgentEventFormat),
        )
        .init();

    let _ = FILTER_HANDLE.set(handle);
}

/// Swap the active filter; used after config load and on SIGHUP.
pub fn reload_level(level: &str) -> anyhow::Result<()> {
    let filter = filter_for_level(level).ok_or_else(|| anyhow::anyhow!("Invalid log level '{}'", level))?;
    let handle = FILTER_HANDLE
        .get()
        .ok_or_else(|| anyhow::anyhow!("Tracing was not initialized with a reload layer"))?;
    handle.reload(EnvFilter::new(filter))?;
    Ok(())
}
