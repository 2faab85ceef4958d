//! Locates the next crash start marker in a log buffer.
//!
//! The anchor index only nominates lines; whether a line really opens a
//! section is decided on its cleaned content, so markers quoted in the
//! middle of other text never start a report.

use crate::registry::Registry;
use crate::rule::CompiledRule;
use aho_corasick::Input;
use tracing::trace;

/// A line that opens a crash section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Byte offset of the first byte of the line, console prefix included.
    pub line_start: usize,
    /// Index into [`Registry::rules`].
    pub rule: usize,
}

/// Finds the earliest line in `[from, to)` whose cleaned content begins
/// with an anchor of a rule accepted by `filter`.
///
/// `from` is treated as a line start even when it is not preceded by a
/// newline, so parsing a suffix of a buffer behaves like parsing the
/// original at the same offset.
pub fn find_next<F>(
    registry: &Registry,
    buf: &[u8],
    from: usize,
    to: usize,
    filter: F,
) -> Option<Candidate>
where
    F: Fn(&CompiledRule) -> bool,
{
    let to = to.min(buf.len());
    let mut pos = from;
    while pos < to {
        let hit = registry.anchors().find(Input::new(buf).range(pos..to))?;
        let start = line_start(buf, from, hit.start());
        let end = line_end(buf, start);
        if let Some(rule) = best_rule_at(registry, clean_line(registry, &buf[start..end]), &filter)
        {
            trace!(line_start = start, rule = registry.rule(rule).name(), "crash marker");
            return Some(Candidate {
                line_start: start,
                rule,
            });
        }
        pos = next_line(buf, end);
    }
    None
}

/// Highest-priority rule anchored at the start of `content`; ties go to
/// the rule declared first.
fn best_rule_at<F>(registry: &Registry, content: &[u8], filter: &F) -> Option<usize>
where
    F: Fn(&CompiledRule) -> bool,
{
    let mut best: Option<(usize, u8)> = None;
    for (idx, rule) in registry.rules().iter().enumerate() {
        if !rule
            .def
            .anchors
            .iter()
            .any(|a| content.starts_with(a.as_bytes()))
        {
            continue;
        }
        if !filter(rule) {
            continue;
        }
        if best.is_none_or(|(_, priority)| rule.def.priority > priority) {
            best = Some((idx, rule.def.priority));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Start of the line containing `pos`, never before `floor`.
pub fn line_start(buf: &[u8], floor: usize, pos: usize) -> usize {
    buf[floor..pos]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(floor, |i| floor + i + 1)
}

/// Offset of the newline ending the line that begins at `start`, or the
/// buffer length for an unterminated last line.
pub fn line_end(buf: &[u8], start: usize) -> usize {
    buf[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(buf.len(), |i| start + i)
}

/// Start of the line after the one ending at `end`.
pub fn next_line(buf: &[u8], end: usize) -> usize {
    if end < buf.len() { end + 1 } else { buf.len() }
}

/// Strips the console prefix, leading whitespace, and a trailing `\r`.
pub fn clean_line<'a>(registry: &Registry, line: &'a [u8]) -> &'a [u8] {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let line = &line[registry.console_prefix_len(line)..];
    let ws = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    &line[ws..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{self, Target};

    fn linux() -> Registry {
        Registry::build(&Target::get(target::LINUX, target::AMD64).expect("linux/amd64"))
            .expect("linux registry")
    }

    fn rule_name(registry: &Registry, candidate: Option<Candidate>) -> Option<&'static str> {
        candidate.map(|c| registry.rule(c.rule).name())
    }

    #[test]
    fn no_marker_means_no_candidate() {
        let registry = linux();
        let buf = b"[    0.000000] Linux version 6.1\n[    1.0] all good\n";
        assert_eq!(find_next(&registry, buf, 0, buf.len(), |_| true), None);
        assert_eq!(find_next(&registry, b"", 0, 0, |_| true), None);
    }

    #[test]
    fn marker_after_console_prefix_is_found_at_line_start() {
        let registry = linux();
        let buf = b"boot ok\n[   10.1][ T42] BUG: KASAN: use-after-free in foo+0x1/0x2\n";
        let candidate = find_next(&registry, buf, 0, buf.len(), |_| true).expect("candidate");
        assert_eq!(candidate.line_start, 8, "candidate should point at the line start");
        assert_eq!(rule_name(&registry, Some(candidate)), Some("kasan"));
    }

    #[test]
    fn marker_inside_a_line_is_ignored() {
        let registry = linux();
        let buf = b"the fuzzer printed BUG: KASAN: nothing\n---[ end Kernel panic - not syncing: x ]---\n";
        assert_eq!(
            find_next(&registry, buf, 0, buf.len(), |_| true),
            None,
            "markers not at the start of the line content must not open a section"
        );
    }

    #[test]
    fn highest_priority_rule_wins_on_shared_anchor() {
        let registry = linux();
        let buf = b"BUG: KASAN: slab-out-of-bounds in bar+0x10/0x20\n";
        let candidate = find_next(&registry, buf, 0, buf.len(), |_| true);
        assert_eq!(
            rule_name(&registry, candidate),
            Some("kasan"),
            "kasan outranks the generic BUG rule"
        );
        let generic = find_next(&registry, buf, 0, buf.len(), |r| r.name() != "kasan");
        assert_eq!(rule_name(&registry, generic), Some("bug"));
    }

    #[test]
    fn search_respects_range_bounds() {
        let registry = linux();
        let buf = b"BUG: soft lockup - CPU#0 stuck\nline\nBUG: memory leak\n";
        let second = b"BUG: soft lockup - CPU#0 stuck\nline\n".len();
        let candidate = find_next(&registry, buf, 1, buf.len(), |_| true).expect("second marker");
        assert_eq!(candidate.line_start, second);
        assert_eq!(find_next(&registry, buf, 1, second, |_| true), None);
    }

    #[test]
    fn clean_line_strips_decorations() {
        let registry = linux();
        assert_eq!(
            clean_line(&registry, b"<6>[  123.456789][    C1]   Call Trace:\r"),
            b"Call Trace:"
        );
        assert_eq!(clean_line(&registry, b"   \r"), b"");
    }

    #[test]
    fn line_helpers_handle_unterminated_tail() {
        let buf = b"one\ntwo";
        assert_eq!(line_end(buf, 0), 3);
        assert_eq!(line_end(buf, 4), 7);
        assert_eq!(next_line(buf, 3), 4);
        assert_eq!(next_line(buf, 7), 7);
        assert_eq!(line_start(buf, 0, 6), 4);
        assert_eq!(line_start(buf, 5, 6), 5, "floor bounds the backwards search");
    }
}
