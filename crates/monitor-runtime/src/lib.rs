//! Runtime orchestration for the GenAI usage monitor.
//!
//! Owns the driver tick loop and the snapshot types it publishes to the
//! presentation layer.

pub mod driver;
pub mod state;

pub use monitor_core as core;
pub use monitor_data as data;
