//! Agent loop: transceiver watcher and thermal policy, side by side until
//! cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::platform::DeviceReader;
use crate::presence::poller::POLL_INTERVAL;
use crate::presence::{PollDeadline, PollError, PollOutcome, PresencePoller, PresenceSnapshot, PresenceState};
use crate::thermal::actions::PolicyAction;
use crate::thermal::CoolingController;

/// What the loops did before shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaemonStats {
    pub presence_events: usize,
    pub thermal_cycles: usize,
}

pub struct Agent<R: DeviceReader + 'static> {
    platform: String,
    num_ports: usize,
    update_interval: Duration,
    reader: Arc<R>,
    controller: Arc<CoolingController>,
    actions: Arc<Vec<PolicyAction>>,
}

impl<R: DeviceReader + 'static> Agent<R> {
    pub fn new(
        platform: impl Into<String>,
        num_ports: usize,
        update_interval: Duration,
        reader: Arc<R>,
        controller: Arc<CoolingController>,
        actions: Vec<PolicyAction>,
    ) -> Self {
        Self {
            platform: platform.into(),
            num_ports,
            update_interval,
            reader,
            controller,
            actions: Arc::new(actions),
        }
    }

    /// Run both loops until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> DaemonStats {
        info!(
            "Agent started: platform {}, {} ports, thermal cycle every {:?}",
            self.platform, self.num_ports, self.update_interval
        );

        let (presence_events, thermal_cycles) = tokio::join!(
            watch_transceivers(self.reader.as_ref(), self.num_ports, &cancel),
            run_thermal_policy(
                &self.platform,
                self.reader.as_ref(),
                &self.controller,
                &self.actions,
                self.update_interval,
                &cancel,
            ),
        );

        let stats = DaemonStats { presence_events, thermal_cycles };
        info!(
            "Agent stopped after {} presence event(s) and {} thermal cycle(s)",
            stats.presence_events, stats.thermal_cycles
        );
        stats
    }
}

async fn watch_transceivers(reader: &dyn DeviceReader, num_ports: usize, cancel: &CancellationToken) -> usize {
    let mut poller = PresencePoller::new(num_ports);
    let mut events = 0;

    loop {
        let previous = poller.retained().clone();
        match poller.poll(reader, PollDeadline::Unbounded, cancel).await {
            Ok(PollOutcome::Changed(snapshot)) => {
                events += 1;
                log_presence_changes(&snapshot, &previous);
            }
            Ok(PollOutcome::NoChange) => {}
            Err(PollError::Cancelled) => break,
            Err(e) => {
                warn!("Transceiver poll failed: {}", e);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = time::sleep(POLL_INTERVAL) => {}
                }
            }
        }
    }

    debug!("Transceiver watcher stopped");
    events
}

fn log_presence_changes(snapshot: &PresenceSnapshot, previous: &PresenceSnapshot) {
    if previous.is_empty() {
        let present = snapshot
            .iter()
            .filter(|(_, state)| *state == PresenceState::Inserted)
            .count();
        info!("Transceiver baseline: {} of {} ports populated", present, snapshot.len());
        return;
    }
    for (index, state) in snapshot.changes_since(previous) {
        info!("Port {}: transceiver {}", index + 1, state);
    }
}

async fn run_thermal_policy(
    platform: &str,
    reader: &dyn DeviceReader,
    controller: &CoolingController,
    actions: &[PolicyAction],
    update_interval: Duration,
    cancel: &CancellationToken,
) -> usize {
    let mut ticker = time::interval(update_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cycles = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        for action in actions {
            match action.execute(controller, platform, reader).await {
                Ok(Some(level)) => debug!("{} applied cooling level {}", action.name(), level),
                Ok(None) => debug!("{} skipped this cycle", action.name()),
                Err(e) => error!("{} failed: {}", action.name(), e),
            }
        }

        cycles += 1;
        if cycles % 20 == 0 {
            debug!("Thermal cycles: {} completed", cycles);
        }
    }

    debug!("Thermal policy loop stopped");
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::{MockDeviceReader, RecordingActuator};
    use crate::thermal::table::MinimumTables;
    use crate::thermal::types::{CoolingLevel, CoolingLimits};
    use crate::thermal::RecoveryEvaluator;

    fn agent(
        reader: Arc<MockDeviceReader>,
        actuator: Arc<RecordingActuator>,
        actions: Vec<PolicyAction>,
    ) -> Agent<MockDeviceReader> {
        let controller = CoolingController::new(
            RecoveryEvaluator::new(MinimumTables::default(), CoolingLimits::default()),
            actuator,
        );
        Agent::new("unknown-platform", 2, Duration::from_secs(10), reader, Arc::new(controller), actions)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_until_cancelled() {
        let reader = Arc::new(MockDeviceReader::new(2));
        reader.set_floor(Some(CoolingLevel(2)));
        let actuator = Arc::new(RecordingActuator::default());
        let agent = agent(reader.clone(), actuator.clone(), vec![PolicyAction::ThermalRecover]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let flipper = reader.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(3500)).await;
            flipper.set_presence(1, true);
            time::sleep(Duration::from_secs(22)).await;
            trigger.cancel();
        });

        let stats = agent.run(cancel).await;

        // Baseline plus the insertion on port 2.
        assert_eq!(stats.presence_events, 2);
        // Ticks at 0s, 10s and 20s.
        assert_eq!(stats.thermal_cycles, 3);
        assert_eq!(actuator.applied(), vec![CoolingLevel(6); 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn action_failures_do_not_stop_the_loop() {
        let reader = Arc::new(MockDeviceReader::new(1));
        let actuator = Arc::new(RecordingActuator::default());
        actuator.set_failing(true);
        let agent = agent(
            reader,
            actuator.clone(),
            vec![PolicyAction::SetAllFanSpeed { speed: 100.0 }],
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(15)).await;
            trigger.cancel();
        });

        let stats = agent.run(cancel).await;

        assert_eq!(stats.thermal_cycles, 2);
        assert_eq!(actuator.attempts(), 2);
        assert!(actuator.applied().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn presence_errors_are_retried() {
        // Reader knows one port, the agent watches two: every poll fails.
        let reader = Arc::new(MockDeviceReader::new(1));
        let actuator = Arc::new(RecordingActuator::default());
        let agent = agent(reader.clone(), actuator, Vec::new());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(2500)).await;
            trigger.cancel();
        });

        let stats = agent.run(cancel).await;

        assert_eq!(stats.presence_events, 0);
        // Attempts at 0s, 1s and 2s, each reading port 0 before failing on port 1.
        assert_eq!(reader.presence_reads(), 6);
    }
}
