//! Transceiver presence change polling.

pub mod poller;
pub mod types;

pub use poller::PresencePoller;
pub use types::{PollDeadline, PollError, PollOutcome, PresenceSnapshot, PresenceState};
