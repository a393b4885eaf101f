//! PUTVAL metric lines.
//!
//! Checks that report numbers alongside their status emit them on stdout in
//! the collector's plain-text protocol. The collector parses these lines
//! itself, so the format is exact: one line, no quoting, `N:` for "now".

use crate::event::ProcessIdentity;
use std::fmt::Display;

/// Formats a metric line for the collector's plain-text protocol.
///
/// The identifier uses the full FQDN, not the short host name that events
/// carry. `path` is the `plugin/type-instance` part of the identifier and
/// `value` is any displayable number.
pub fn metric_line(identity: &ProcessIdentity, path: &str, value: impl Display) -> String {
    format!(
        "PUTVAL {}/{} interval={} N:{}",
        identity.fqdn, path, identity.interval_secs, value
    )
}
