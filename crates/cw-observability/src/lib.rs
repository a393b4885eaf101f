//! # cw-observability
//!
//! Logging infrastructure for Checkward.
//!
//! This crate provides structured logging with tracing. Output always goes to
//! stderr so that checks can keep stdout for metric lines.

pub mod logging;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
