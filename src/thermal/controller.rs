//! Cooling controller: owns the last applied level and serializes every
//! evaluate-then-actuate sequence behind one lock.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::actuator::ActuationError;
use super::recovery::{RecoveryDecision, RecoveryEvaluator};
use super::types::CoolingLevel;
use crate::platform::{CoolingActuator, DeviceReader};

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("device read failed: {0}")]
    Device(String),
    #[error(transparent)]
    Actuation(#[from] ActuationError),
}

/// Mutable cooling state. Unset until the first successful actuation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoolingState {
    pub last_applied: Option<CoolingLevel>,
}

pub struct CoolingController {
    evaluator: RecoveryEvaluator,
    actuator: Arc<dyn CoolingActuator>,
    state: Mutex<CoolingState>,
}

impl CoolingController {
    pub fn new(evaluator: RecoveryEvaluator, actuator: Arc<dyn CoolingActuator>) -> Self {
        Self {
            evaluator,
            actuator,
            state: Mutex::new(CoolingState::default()),
        }
    }

    pub async fn last_applied(&self) -> Option<CoolingLevel> {
        self.state.lock().await.last_applied
    }

    /// Run one recovery evaluation and apply the result.
    /// Returns the applied level, or `None` when this cycle was skipped.
    pub async fn recover(
        &self,
        platform: &str,
        reader: &dyn DeviceReader,
    ) -> Result<Option<CoolingLevel>, RecoveryError> {
        let mut state = self.state.lock().await;

        let decision = self
            .evaluator
            .evaluate(platform, reader, state.last_applied)
            .await
            .map_err(|e| RecoveryError::Device(format!("{:#}", e)))?;

        match decision {
            RecoveryDecision::Apply(level) => {
                self.apply_locked(&mut state, level).await?;
                Ok(Some(level))
            }
            RecoveryDecision::Skip => Ok(None),
        }
    }

    /// Apply a fixed level, bypassing evaluation.
    pub async fn set_level(&self, level: CoolingLevel) -> Result<(), ActuationError> {
        let mut state = self.state.lock().await;
        self.apply_locked(&mut state, level).await
    }

    async fn apply_locked(&self, state: &mut CoolingState, level: CoolingLevel) -> Result<(), ActuationError> {
        let max = self.evaluator.limits().max_level;
        if level > max {
            return Err(ActuationError::OutOfRange { level, max });
        }

        self.actuator.apply(level).await?;

        match state.last_applied {
            Some(previous) if previous == level => debug!("Cooling level unchanged at {}", level),
            previous => info!("Cooling level set to {} (previous: {:?})", level, previous.map(|l| l.value())),
        }
        state.last_applied = Some(level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::platform::testing::{MockDeviceReader, RecordingActuator};
    use crate::thermal::table::{MinimumTables, PlatformTables};
    use crate::thermal::types::CoolingLimits;

    const PLATFORM: &str = "x86_64-ufispace_s8901_54xc-r0";

    fn controller(actuator: Arc<RecordingActuator>) -> CoolingController {
        let tables: PlatformTables = serde_json::from_value(json!({
            "unk_true": { "-127:25": 13, "26:120": 18 },
            "unk_false": { "-127:120": 20 }
        }))
        .unwrap();
        let mut all = MinimumTables::default();
        all.insert(PLATFORM, tables);
        let limits = CoolingLimits {
            min_level_for_high: CoolingLevel(6),
            ..CoolingLimits::default()
        };
        CoolingController::new(RecoveryEvaluator::new(all, limits), actuator)
    }

    #[tokio::test]
    async fn successful_recovery_records_level() {
        let actuator = Arc::new(RecordingActuator::default());
        let controller = controller(Arc::clone(&actuator));
        let reader = MockDeviceReader::new(0);
        reader.set_ambient(20_000);
        reader.set_floor(Some(CoolingLevel(2)));

        let applied = controller.recover(PLATFORM, &reader).await.unwrap();

        assert_eq!(applied, Some(CoolingLevel(3)));
        assert_eq!(controller.last_applied().await, Some(CoolingLevel(3)));
        assert_eq!(actuator.applied(), vec![CoolingLevel(3)]);
    }

    #[tokio::test]
    async fn missing_zone_floor_skips_actuation() {
        let actuator = Arc::new(RecordingActuator::default());
        let controller = controller(Arc::clone(&actuator));
        let reader = MockDeviceReader::new(0);
        reader.set_ambient(20_000);

        let applied = controller.recover(PLATFORM, &reader).await.unwrap();

        assert_eq!(applied, None);
        assert_eq!(actuator.attempts(), 0);
        assert_eq!(controller.last_applied().await, None);
    }

    #[tokio::test]
    async fn failed_actuation_keeps_state_and_retry_is_identical() {
        let actuator = Arc::new(RecordingActuator::default());
        let controller = controller(Arc::clone(&actuator));
        let reader = MockDeviceReader::new(0);
        reader.set_ambient(20_000);
        reader.set_floor(Some(CoolingLevel(2)));
        controller.recover(PLATFORM, &reader).await.unwrap();

        reader.set_ambient(30_000);
        actuator.set_failing(true);
        let err = controller.recover(PLATFORM, &reader).await.unwrap_err();
        assert!(matches!(err, RecoveryError::Actuation(ActuationError::Command(_))));
        assert_eq!(controller.last_applied().await, Some(CoolingLevel(3)));

        actuator.set_failing(false);
        let retried = controller.recover(PLATFORM, &reader).await.unwrap();
        assert_eq!(retried, Some(CoolingLevel(8)));
        assert_eq!(actuator.applied(), vec![CoolingLevel(3), CoolingLevel(8)]);
        // Both attempts at 8 took the fast path.
        assert_eq!(reader.zone_queries(), 1);
    }

    #[tokio::test]
    async fn set_level_rejects_levels_above_max() {
        let actuator = Arc::new(RecordingActuator::default());
        let controller = controller(Arc::clone(&actuator));

        let err = controller.set_level(CoolingLevel(11)).await.unwrap_err();
        assert!(matches!(err, ActuationError::OutOfRange { .. }));
        assert_eq!(actuator.attempts(), 0);

        controller.set_level(CoolingLevel(10)).await.unwrap();
        assert_eq!(controller.last_applied().await, Some(CoolingLevel(10)));
    }

    #[tokio::test]
    async fn concurrent_recoveries_are_serialized() {
        let actuator = Arc::new(RecordingActuator::default());
        let controller = Arc::new(controller(Arc::clone(&actuator)));
        let reader = Arc::new(MockDeviceReader::new(0));
        reader.set_ambient(20_000);
        reader.set_floor(Some(CoolingLevel(5)));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let controller = Arc::clone(&controller);
            let reader = Arc::clone(&reader);
            tasks.push(tokio::spawn(async move {
                controller.recover(PLATFORM, reader.as_ref()).await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), Some(CoolingLevel(5)));
        }
        assert_eq!(actuator.attempts(), 8);
        assert_eq!(controller.last_applied().await, Some(CoolingLevel(5)));
    }
}
