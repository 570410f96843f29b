//! Process and filesystem glue: ipmitool, sysfs attributes, path templates.

pub mod executor;
pub mod sysfs;
pub mod template;
