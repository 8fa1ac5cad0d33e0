//! Post-hoc audit of translated output.
//!
//! The translation boundary may only surface state, never its internal
//! reasoning. The audit is a case-insensitive substring scan for the
//! configured markers; hits are logged and delivery proceeds unchanged.

use tracing::warn;

/// Return every configured marker found in `text`, case-insensitively.
pub fn audit_markers(text: &str, markers: &[String]) -> Vec<String> {
    let lower = text.to_lowercase();
    markers
        .iter()
        .filter(|m| !m.is_empty() && lower.contains(&m.to_lowercase()))
        .cloned()
        .collect()
}

/// Scan and log. Never blocks delivery.
pub fn audit_and_log(text: &str, markers: &[String]) {
    for marker in audit_markers(text, markers) {
        warn!(%marker, "disallowed reasoning marker in verbalized output");
    }
}
