//! Presence change poller.
//!
//! Reads every port through a [`DeviceReader`], compares the result with the
//! snapshot retained from the previous call, and reports the full snapshot
//! whenever anything differs. Polling runs at one-second granularity until a
//! change, the deadline, or cancellation.
//!
//! A poller is owned by one caller. `poll` takes `&mut self`, so two polls on
//! the same instance can never interleave.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::types::{ChangeEvent, PollDeadline, PollError, PollOutcome, PresenceSnapshot};
use crate::platform::DeviceReader;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct PresencePoller {
    num_ports: usize,
    retained: PresenceSnapshot,
}

impl PresencePoller {
    /// The retained snapshot starts empty, so the first poll always reports.
    pub fn new(num_ports: usize) -> Self {
        Self {
            num_ports,
            retained: PresenceSnapshot::default(),
        }
    }

    pub fn retained(&self) -> &PresenceSnapshot {
        &self.retained
    }

    pub async fn poll(
        &mut self,
        reader: &dyn DeviceReader,
        deadline: PollDeadline,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, PollError> {
        let start = Instant::now();
        if let PollDeadline::BoundedUntil(end) = deadline {
            if end < start {
                return Err(PollError::InvalidDeadline);
            }
        }

        loop {
            let current = self.read_snapshot(reader).await?;

            if current != self.retained {
                debug!(
                    "Presence changed on {} port(s)",
                    current.changes_since(&self.retained).len()
                );
                self.retained = current.clone();
                return Ok(PollOutcome::Changed(current));
            }

            let pause = match deadline {
                PollDeadline::Unbounded => POLL_INTERVAL,
                PollDeadline::BoundedUntil(end) => {
                    let remaining = end.saturating_duration_since(Instant::now());
                    if remaining >= POLL_INTERVAL {
                        POLL_INTERVAL
                    } else {
                        if !remaining.is_zero() {
                            sleep_or_cancel(remaining, cancel).await?;
                        }
                        trace!("No presence change before deadline");
                        return Ok(PollOutcome::NoChange);
                    }
                }
            };

            sleep_or_cancel(pause, cancel).await?;
        }
    }

    /// Host-framework style entry point: millisecond timeout (`0` waits
    /// forever), `None` when nothing changed.
    pub async fn change_event(
        &mut self,
        reader: &dyn DeviceReader,
        timeout_ms: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<ChangeEvent>, PollError> {
        let deadline = PollDeadline::from_timeout_ms(timeout_ms, Instant::now())?;
        match self.poll(reader, deadline, cancel).await? {
            PollOutcome::Changed(sfp) => Ok(Some(ChangeEvent { sfp, ..ChangeEvent::default() })),
            PollOutcome::NoChange => Ok(None),
        }
    }

    async fn read_snapshot(&self, reader: &dyn DeviceReader) -> Result<PresenceSnapshot, PollError> {
        let mut snapshot = PresenceSnapshot::default();
        for index in 0..self.num_ports {
            let present = reader
                .presence(index)
                .await
                .map_err(|e| PollError::Device { index, message: format!("{:#}", e) })?;
            snapshot.insert(index, present.into());
        }
        Ok(snapshot)
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<(), PollError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PollError::Cancelled),
        _ = sleep(duration) => Ok(()),
    }
}
