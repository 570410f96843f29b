//! Command-line surface and tracing setup.

pub mod cli;
pub mod logging;
