//! Command-line entry: parse flags, set up tracing, and hand back the
//! [`actions::Action`] the binary executes.

pub mod actions;
pub mod commands;
pub mod dispatch;
mod start;
pub mod telemetry;

pub use start::start;
