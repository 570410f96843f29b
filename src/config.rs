//! Agent configuration: types, defaults, load and save.

pub mod persistence;
pub mod types;
