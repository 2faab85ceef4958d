//! Known-benign crash signatures.
//!
//! These are failures the fuzzer provokes on purpose (memory exhaustion) or
//! failures of its own infrastructure; they look like kernel crashes but
//! are not kernel bugs.

use crate::report::Report;
use regex::bytes::Regex;

/// True when the report's title or body matches a benign signature.
pub fn is_suppressed(patterns: &[Regex], report: &Report<'_>) -> bool {
    patterns
        .iter()
        .any(|p| p.is_match(report.title.as_bytes()) || p.is_match(report.body))
}

/// Whole-buffer check used when parsing found nothing, to tell a clean log
/// from one whose only crash-like content is benign.
pub fn buffer_matches_suppression(patterns: &[Regex], buf: &[u8]) -> bool {
    !buf.is_empty() && patterns.iter().any(|p| p.is_match(buf))
}
