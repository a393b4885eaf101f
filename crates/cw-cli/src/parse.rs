//! Parsing of collector notification text.
//!
//! The collector hands `exec`-style notifiers a block of `Header: value`
//! lines followed by the free-form message. Matching is deliberately loose:
//! any line containing `Severity`, `Time`, or `Host` claims that field, and
//! every other non-empty line overwrites the message, so the last free-form
//! line wins.

use serde::{Deserialize, Serialize};

/// The JSON record forwarded downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Severity header, verbatim.
    #[serde(rename = "Severity", skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// Time header, verbatim.
    #[serde(rename = "Time", skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Host header, verbatim.
    #[serde(rename = "Host", skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Free-form message body.
    #[serde(rename = "Message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Everything after the first colon, with leading spaces stripped.
fn value_after_colon(line: &str) -> String {
    line.splitn(2, ':')
        .nth(1)
        .unwrap_or("")
        .trim_start_matches(' ')
        .to_string()
}

/// Converts a notification text block into a record.
pub fn parse_notification(input: &str) -> NotificationRecord {
    let mut record = NotificationRecord::default();

    for line in input.lines() {
        if line.contains("Severity") {
            record.severity = Some(value_after_colon(line));
        } else if line.contains("Time") {
            record.time = Some(value_after_colon(line));
        } else if line.contains("Host") {
            record.host = Some(value_after_colon(line));
        } else if !line.is_empty() {
            record.message = Some(line.to_string());
        }
    }

    record
}
