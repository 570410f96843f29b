//! Thermal policy actions.
//!
//! Policy files describe actions as JSON objects tagged by `type`. The
//! registry maps each type name to a constructor; it is filled once at
//! startup and every configured action is resolved before the agent loop
//! starts, so an unknown or malformed action fails at load time.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use super::controller::{CoolingController, RecoveryError};
use super::types::CoolingLevel;
use crate::platform::DeviceReader;

pub const SET_ALL_FAN_SPEED: &str = "fan.all.set_speed";
pub const THERMAL_RECOVER: &str = "thermal.recover";

#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("policy action must be a JSON object, got {0}")]
    NotAnObject(String),
    #[error("policy action is missing its 'type' field")]
    MissingType,
    #[error("unknown policy action type '{0}'")]
    UnknownType(String),
    #[error("{action} is missing mandatory field '{field}'")]
    MissingField { action: &'static str, field: &'static str },
    #[error("{action} has invalid {field} value {value}")]
    InvalidValue { action: &'static str, field: &'static str, value: String },
    #[error("fan.all.set_speed speed {0} is outside [0, 100]")]
    SpeedOutOfRange(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyAction {
    /// Drive every fan to `speed` percent.
    SetAllFanSpeed { speed: f64 },
    /// Recompute the minimum cooling level and apply it.
    ThermalRecover,
}

impl PolicyAction {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyAction::SetAllFanSpeed { .. } => SET_ALL_FAN_SPEED,
            PolicyAction::ThermalRecover => THERMAL_RECOVER,
        }
    }

    /// Run the action. Returns the cooling level that was applied, if any.
    pub async fn execute(
        &self,
        controller: &CoolingController,
        platform: &str,
        reader: &dyn DeviceReader,
    ) -> Result<Option<CoolingLevel>, RecoveryError> {
        match self {
            PolicyAction::SetAllFanSpeed { speed } => {
                let level = CoolingLevel::from_percent(*speed);
                controller.set_level(level).await?;
                Ok(Some(level))
            }
            PolicyAction::ThermalRecover => controller.recover(platform, reader).await,
        }
    }
}

pub type ActionConstructor = fn(&Map<String, Value>) -> Result<PolicyAction, ActionError>;

pub struct ActionRegistry {
    constructors: BTreeMap<&'static str, ActionConstructor>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(SET_ALL_FAN_SPEED, set_all_fan_speed);
        registry.register(THERMAL_RECOVER, |_| Ok(PolicyAction::ThermalRecover));
        registry
    }
}

impl ActionRegistry {
    pub fn empty() -> Self {
        Self { constructors: BTreeMap::new() }
    }

    pub fn register(&mut self, name: &'static str, constructor: ActionConstructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    pub fn resolve(&self, value: &Value) -> Result<PolicyAction, ActionError> {
        let object = value
            .as_object()
            .ok_or_else(|| ActionError::NotAnObject(value.to_string()))?;
        let type_name = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ActionError::MissingType)?;
        let Some(constructor) = self.constructors.get(type_name) else {
            warn!(
                "Policy action '{}' is not registered; known types: {}",
                type_name,
                self.names().collect::<Vec<_>>().join(", ")
            );
            return Err(ActionError::UnknownType(type_name.to_string()));
        };
        constructor(object)
    }

    pub fn resolve_all(&self, values: &[Value]) -> Result<Vec<PolicyAction>, ActionError> {
        let actions = values
            .iter()
            .map(|value| self.resolve(value))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "Resolved {} policy action(s): {}",
            actions.len(),
            actions.iter().map(PolicyAction::name).collect::<Vec<_>>().join(", ")
        );
        Ok(actions)
    }
}

/// `{"type": "fan.all.set_speed", "speed": "100"}`; speed may be a number or
/// a numeric string.
fn set_all_fan_speed(object: &Map<String, Value>) -> Result<PolicyAction, ActionError> {
    let raw = object.get("speed").ok_or(ActionError::MissingField {
        action: SET_ALL_FAN_SPEED,
        field: "speed",
    })?;

    let speed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|speed| speed.is_finite())
    .ok_or_else(|| ActionError::InvalidValue {
        action: SET_ALL_FAN_SPEED,
        field: "speed",
        value: raw.to_string(),
    })?;

    if !(0.0..=100.0).contains(&speed) {
        return Err(ActionError::SpeedOutOfRange(speed));
    }
    Ok(PolicyAction::SetAllFanSpeed { speed })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::platform::testing::{MockDeviceReader, RecordingActuator};
    use crate::thermal::recovery::RecoveryEvaluator;
    use crate::thermal::table::MinimumTables;
    use crate::thermal::types::CoolingLimits;

    #[test]
    fn resolves_registered_actions() {
        let registry = ActionRegistry::default();
        assert_eq!(
            registry.resolve(&json!({ "type": "fan.all.set_speed", "speed": "100" })).unwrap(),
            PolicyAction::SetAllFanSpeed { speed: 100.0 }
        );
        assert_eq!(
            registry.resolve(&json!({ "type": "thermal.recover" })).unwrap(),
            PolicyAction::ThermalRecover
        );
        assert_eq!(registry.names().collect::<Vec<_>>(), vec![SET_ALL_FAN_SPEED, THERMAL_RECOVER]);
    }

    #[test]
    fn rejects_unknown_and_untyped_actions() {
        let registry = ActionRegistry::default();
        assert_eq!(
            registry.resolve(&json!({ "type": "psu.all.off" })),
            Err(ActionError::UnknownType("psu.all.off".to_string()))
        );
        assert_eq!(registry.resolve(&json!({ "speed": 10 })), Err(ActionError::MissingType));
        assert!(matches!(registry.resolve(&json!([1, 2])), Err(ActionError::NotAnObject(_))));
    }

    #[test]
    fn validates_fan_speed() {
        let registry = ActionRegistry::default();
        assert_eq!(
            registry.resolve(&json!({ "type": "fan.all.set_speed", "speed": 120 })),
            Err(ActionError::SpeedOutOfRange(120.0))
        );
        assert!(matches!(
            registry.resolve(&json!({ "type": "fan.all.set_speed" })),
            Err(ActionError::MissingField { field: "speed", .. })
        ));
        assert!(matches!(
            registry.resolve(&json!({ "type": "fan.all.set_speed", "speed": "fast" })),
            Err(ActionError::InvalidValue { .. })
        ));
    }

    #[test]
    fn custom_constructors_can_be_registered() {
        let mut registry = ActionRegistry::empty();
        registry.register("thermal.recover.always", |_| Ok(PolicyAction::ThermalRecover));
        assert_eq!(
            registry.resolve(&json!({ "type": "thermal.recover.always" })).unwrap(),
            PolicyAction::ThermalRecover
        );
        assert!(registry.resolve(&json!({ "type": "thermal.recover" })).is_err());
    }

    #[tokio::test]
    async fn set_speed_applies_truncated_level() {
        let actuator = Arc::new(RecordingActuator::default());
        let controller = CoolingController::new(
            RecoveryEvaluator::new(MinimumTables::default(), CoolingLimits::default()),
            actuator.clone(),
        );
        let reader = MockDeviceReader::new(0);

        let action = PolicyAction::SetAllFanSpeed { speed: 65.0 };
        let applied = action.execute(&controller, "any", &reader).await.unwrap();

        assert_eq!(applied, Some(CoolingLevel(6)));
        assert_eq!(actuator.applied(), vec![CoolingLevel(6)]);
        assert_eq!(reader.zone_queries(), 0);
    }

    #[tokio::test]
    async fn recover_runs_through_controller() {
        let actuator = Arc::new(RecordingActuator::default());
        let controller = CoolingController::new(
            RecoveryEvaluator::new(MinimumTables::default(), CoolingLimits::default()),
            actuator.clone(),
        );
        let reader = MockDeviceReader::new(0);
        reader.set_floor(Some(CoolingLevel(2)));

        let applied = PolicyAction::ThermalRecover.execute(&controller, "unknown", &reader).await.unwrap();

        assert_eq!(applied, Some(CoolingLevel(6)));
        assert_eq!(controller.last_applied().await, Some(CoolingLevel(6)));
    }
}
