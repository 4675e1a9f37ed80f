//! Terminal dashboard for the GenAI usage monitor.
//!
//! Themes, usage-bar widgets, the multi-provider dashboard view, and the
//! event loop that polls the runtime's snapshot channel. This crate only
//! ever reads published snapshots; all mutation lives in the driver.

pub mod app;
pub mod dashboard;
pub mod themes;
pub mod widgets;

pub use monitor_core as core;
