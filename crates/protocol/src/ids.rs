//! Best-effort id extraction from segment documents.
//!
//! Used only to label log lines for segments the service refused. A loose
//! regex over the raw document is deliberate: full JSON parsing is not
//! worth it for a diagnostic, and a misfire on escaped quotes costs
//! nothing but a slightly odd log line.

use once_cell::sync::Lazy;
use regex::Regex;

static SEGMENT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#""id":"(.*?)""#).unwrap());
static TRACE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#""trace_id":"(.*?)""#).unwrap());

/// Extract the `id` field from a raw segment document.
pub fn segment_id(document: &str) -> Option<&str> {
    SEGMENT_ID
        .captures(document)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Extract the `trace_id` field from a raw segment document.
pub fn trace_id(document: &str) -> Option<&str> {
    TRACE_ID
        .captures(document)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
