//! Presence snapshot, poll deadline, and poll result types.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

/// Whether a module is seated in a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresenceState {
    #[serde(rename = "1")]
    Inserted,
    #[serde(rename = "0")]
    Removed,
}

impl From<bool> for PresenceState {
    fn from(present: bool) -> Self {
        if present {
            PresenceState::Inserted
        } else {
            PresenceState::Removed
        }
    }
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceState::Inserted => write!(f, "inserted"),
            PresenceState::Removed => write!(f, "removed"),
        }
    }
}

/// Presence of every port, keyed by 0-based port index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresenceSnapshot(BTreeMap<usize, PresenceState>);

impl PresenceSnapshot {
    pub fn insert(&mut self, index: usize, state: PresenceState) {
        self.0.insert(index, state);
    }

    pub fn get(&self, index: usize) -> Option<PresenceState> {
        self.0.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, PresenceState)> + '_ {
        self.0.iter().map(|(index, state)| (*index, *state))
    }

    /// Ports whose state differs from `previous`, including ports `previous` lacks.
    pub fn changes_since(&self, previous: &PresenceSnapshot) -> Vec<(usize, PresenceState)> {
        self.iter()
            .filter(|(index, state)| previous.get(*index) != Some(*state))
            .collect()
    }
}

impl FromIterator<(usize, PresenceState)> for PresenceSnapshot {
    fn from_iter<I: IntoIterator<Item = (usize, PresenceState)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How long a poll may wait for a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDeadline {
    Unbounded,
    BoundedUntil(Instant),
}

impl PollDeadline {
    /// Deadline from a millisecond timeout: `0` waits forever, a positive
    /// value waits that long from `now`, a negative value is invalid.
    pub fn from_timeout_ms(timeout_ms: i64, now: Instant) -> Result<Self, PollError> {
        match timeout_ms {
            0 => Ok(PollDeadline::Unbounded),
            ms if ms > 0 => Ok(PollDeadline::BoundedUntil(now + Duration::from_millis(ms as u64))),
            _ => Err(PollError::InvalidDeadline),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Presence changed; carries the full fresh snapshot.
    Changed(PresenceSnapshot),
    NoChange,
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("poll deadline lies before the poll start")]
    InvalidDeadline,
    #[error("poll cancelled")]
    Cancelled,
    #[error("presence read failed for port {index}: {message}")]
    Device { index: usize, message: String },
}

/// Change event in the shape the host framework's `get_change_event` reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub fan: BTreeMap<usize, String>,
    pub sfp: PresenceSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_zero_waits_forever() {
        let now = Instant::now();
        assert_eq!(PollDeadline::from_timeout_ms(0, now).unwrap(), PollDeadline::Unbounded);
    }

    #[test]
    fn positive_timeout_is_relative_to_now() {
        let now = Instant::now();
        assert_eq!(
            PollDeadline::from_timeout_ms(2500, now).unwrap(),
            PollDeadline::BoundedUntil(now + Duration::from_millis(2500))
        );
    }

    #[test]
    fn negative_timeout_is_invalid() {
        let err = PollDeadline::from_timeout_ms(-1, Instant::now()).unwrap_err();
        assert!(matches!(err, PollError::InvalidDeadline));
    }

    #[test]
    fn snapshot_serializes_with_host_state_strings() {
        let snapshot: PresenceSnapshot =
            [(0, PresenceState::Inserted), (1, PresenceState::Removed)].into_iter().collect();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"0":"1","1":"0"}"#);
    }

    #[test]
    fn changes_since_lists_only_differences() {
        let before: PresenceSnapshot =
            [(0, PresenceState::Inserted), (1, PresenceState::Removed)].into_iter().collect();
        let after: PresenceSnapshot =
            [(0, PresenceState::Inserted), (1, PresenceState::Inserted)].into_iter().collect();
        assert_eq!(after.changes_since(&before), vec![(1, PresenceState::Inserted)]);
        assert_eq!(after.changes_since(&PresenceSnapshot::default()).len(), 2);
    }
}
