//! Alert event model.
//!
//! An [`Event`] is the wire-visible unit of alerting: which host and check
//! produced it, how bad it is, and a human-readable message. Events are built
//! from a [`ProcessIdentity`] resolved once per process, the same way the
//! collectd plugin environment identifies a running check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a severity string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid severity: {0:?} (expected okay, warning, or failure)")]
pub struct ParseSeverityError(pub String);

/// Severity of a check result.
///
/// The wire strings are `"okay"`, `"warning"`, and `"failure"`. Downstream
/// consumers of the JSON payload have always received the long form `"okay"`,
/// so the short variant never appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(rename = "okay")]
    Ok,
    Warning,
    Failure,
}

impl Severity {
    /// Returns the wire string for this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "okay",
            Severity::Warning => "warning",
            Severity::Failure => "failure",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ok" | "okay" => Ok(Severity::Ok),
            "warning" => Ok(Severity::Warning),
            "failure" => Ok(Severity::Failure),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Identity of the reporting process, resolved once at startup.
///
/// Mirrors the collectd plugin environment: `COLLECTD_HOSTNAME` and
/// `COLLECTD_INTERVAL` when set, with the plugin name taken from the
/// executable's basename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    /// Fully qualified hostname, used verbatim in metric output.
    pub fqdn: String,
    /// First DNS label of the fqdn, used in alert payloads.
    pub short_host: String,
    /// Collection interval in seconds.
    pub interval_secs: u64,
    /// Name of the reporting check.
    pub plugin: String,
}

impl ProcessIdentity {
    /// Creates an identity from explicit values.
    pub fn new(fqdn: impl Into<String>, interval_secs: u64, plugin: impl Into<String>) -> Self {
        let fqdn = fqdn.into();
        let short_host = fqdn.split('.').next().unwrap_or_default().to_string();
        Self {
            fqdn,
            short_host,
            interval_secs,
            plugin: plugin.into(),
        }
    }

    /// Resolves the identity from the process environment.
    ///
    /// Hostname comes from `COLLECTD_HOSTNAME`, falling back to the local
    /// hostname; interval from `COLLECTD_INTERVAL`, falling back to 60;
    /// plugin name from the executable's basename.
    pub fn resolve() -> Self {
        let fqdn = std::env::var("COLLECTD_HOSTNAME").unwrap_or_else(|_| {
            hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string())
        });

        let interval_secs = std::env::var("COLLECTD_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let plugin = std::env::args()
            .next()
            .and_then(|argv0| {
                std::path::Path::new(&argv0)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "unknown".to_string());

        Self::new(fqdn, interval_secs, plugin)
    }

    /// Overrides the plugin name, for library consumers that report on
    /// behalf of a differently-named check.
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = plugin.into();
        self
    }
}

/// An alert event as delivered to every sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Short hostname of the machine the check ran on.
    pub host: String,
    /// Name of the reporting check.
    pub plugin: String,
    /// Severity of the result.
    pub severity: Severity,
    /// Human-readable status message.
    pub message: String,
    /// When the event was built.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Builds an event for the given identity, stamped with the current time.
    pub fn new(identity: &ProcessIdentity, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            host: identity.short_host.clone(),
            plugin: identity.plugin.clone(),
            severity,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
