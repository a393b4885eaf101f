//! # cw-core
//!
//! Core notification pipeline for Checkward.
//!
//! This crate provides the dispatch orchestrator, event and severity models,
//! transition tracking against per-plugin state files, suppression lookups,
//! and the delivery sinks (pager, email, webhook, raw TCP) that monitoring
//! check scripts drive.

pub mod dispatch;
pub mod event;
pub mod metric;
pub mod sinks;
pub mod state;
pub mod suppress;
pub mod transition;

pub use dispatch::{
    AlertOptions, DispatchConfig, DispatchError, DispatchOutcome, Dispatcher,
};
pub use event::{Event, ParseSeverityError, ProcessIdentity, Severity};
pub use metric::metric_line;
pub use sinks::{
    EmailSink, PagerSink, Sink, SinkError, SinkFanout, SmtpConfig, TcpSink, WebhookSink,
};
pub use state::{FileStateStore, StateError, StateStore};
pub use suppress::{SuppressionConfig, SuppressionError, SuppressionOracle, SuppressionPolicy};
pub use transition::{classify, severity_matches, Classification};
