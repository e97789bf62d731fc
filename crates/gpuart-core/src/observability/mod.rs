//! Observability Infrastructure
//!
//! Logging for the GPUart runtime. Lifecycle transitions, layer calls and
//! failures are emitted as `tracing` events with `layer`, `operation` and
//! `phase` fields; this module installs the subscriber that renders them.

pub mod logging;

pub use logging::{LogConfig, LogLevel};
