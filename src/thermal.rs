//! Cooling level policy: minimum tables, recovery evaluation, actuation.

pub mod actions;
pub mod actuator;
pub mod controller;
pub mod recovery;
pub mod table;
pub mod types;
pub mod zone;

pub use controller::CoolingController;
pub use recovery::RecoveryEvaluator;
