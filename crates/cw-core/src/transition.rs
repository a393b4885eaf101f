//! Severity transition classification.
//!
//! Pure logic over the previously recorded severity and the current one.
//! Paging and email decisions key off [`Classification::Transitioned`].

use crate::event::Severity;

/// Relationship between the current severity and the last recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No previous state on record. First run of a check never alerts.
    FirstObservation,
    /// Previous state matches the current severity.
    Unchanged,
    /// Severity changed since last run.
    Transitioned,
}

/// Classifies the current severity against the previously recorded state.
pub fn classify(previous: Option<&str>, current: &Severity) -> Classification {
    match previous {
        None => Classification::FirstObservation,
        Some(prev) if severity_matches(prev, current) => Classification::Unchanged,
        Some(_) => Classification::Transitioned,
    }
}

/// Returns true when a recorded state matches the current severity.
///
/// Matching is deliberately loose: the recorded text matches when it is a
/// case-insensitive substring of the current wire string. State files written
/// by older deployments recorded severities in varying forms ("ok" vs
/// "okay"), and those must not be misread as transitions.
pub fn severity_matches(previous: &str, current: &Severity) -> bool {
    current.as_str().contains(&previous.to_lowercase())
}
