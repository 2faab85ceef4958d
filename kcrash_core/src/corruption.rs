//! Flags reports whose section looks interleaved or cut off.
//!
//! Corruption is advisory: the report keeps every field it was classified
//! with and only gains a reason.

use crate::classifier::Section;
use crate::registry::Registry;

pub const OVERLAPPING_REPORT: &str = "overlapping report";
pub const TRUNCATED_OUTPUT: &str = "truncated output";

/// Returns the corruption reason for `section`, if any.
///
/// Another crash's start marker cutting the section off before it reached
/// the rule's `min_lines` means two dumps were printed concurrently. A
/// marker after that point is simply the next report. Markers of rules
/// that routinely follow other reports (a panic after a KASAN splat) never
/// close a section.
pub fn detect_corruption(registry: &Registry, section: &Section) -> Option<&'static str> {
    let min_lines = registry.rule(section.rule).def.min_lines;
    if section.interrupted && section.lines < min_lines {
        return Some(OVERLAPPING_REPORT);
    }
    if section.hit_eof && section.lines < min_lines {
        return Some(TRUNCATED_OUTPUT);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::find_section;
    use crate::scanner;
    use crate::target::{self, Target};

    fn linux() -> Registry {
        Registry::build(&Target::get(target::LINUX, target::AMD64).expect("linux/amd64"))
            .expect("registry")
    }

    fn section_of(registry: &Registry, buf: &[u8]) -> Section {
        let candidate =
            scanner::find_next(registry, buf, 0, buf.len(), |_| true).expect("crash marker");
        find_section(registry, buf, candidate, 1000)
    }

    #[test]
    fn interleaved_markers_are_overlapping() {
        let registry = linux();
        let buf = b"BUG: KASAN: use-after-free in foo+0x1/0x2
Read of size 8 at addr ffff888000000000 by task a/1
WARNING: CPU: 1 PID: 2 at mm/slub.c:10 bar+0x3/0x4
Call Trace:
 foo+0x1/0x2
";
        let section = section_of(&registry, buf);
        assert_eq!(detect_corruption(&registry, &section), Some(OVERLAPPING_REPORT));
    }

    #[test]
    fn marker_after_complete_section_is_next_report() {
        let registry = linux();
        let buf = b"BUG: KASAN: use-after-free in foo+0x1/0x2
Read of size 8 at addr ffff888000000000 by task a/1
CPU: 0 PID: 1 Comm: a
Call Trace:
 foo+0x1/0x2
WARNING: CPU: 1 PID: 2 at mm/slub.c:10 bar+0x3/0x4
";
        let section = section_of(&registry, buf);
        assert!(section.interrupted, "the WARNING line closes the KASAN section");
        assert_eq!(section.lines, 5);
        assert_eq!(detect_corruption(&registry, &section), None);
    }

    #[test]
    fn exempt_follow_up_markers_are_not_overlap() {
        let registry = linux();
        let buf = b"WARNING: CPU: 0 PID: 1 at fs/ext4/super.c:42 ext4_remount+0x10/0x20
Modules linked in:
Kernel panic - not syncing: panic_on_warn set ...
Call Trace:
 ext4_remount+0x10/0x20
---[ end trace 0000000000000000 ]---
";
        let section = section_of(&registry, buf);
        assert_eq!(
            detect_corruption(&registry, &section),
            None,
            "a panic_on_warn panic inside a WARNING is a continuation"
        );
    }

    #[test]
    fn short_section_cut_at_buffer_end_is_truncated() {
        let registry = linux();
        let buf = b"log\nBUG: KASAN: use-after-free in foo+0x1/0x2\nRead of size 8";
        let section = section_of(&registry, buf);
        assert!(section.hit_eof);
        assert_eq!(detect_corruption(&registry, &section), Some(TRUNCATED_OUTPUT));
    }

    #[test]
    fn long_unterminated_section_is_not_truncated() {
        let registry = linux();
        let buf = b"BUG: KASAN: use-after-free in foo+0x1/0x2
Read of size 8 at addr ffff888000000000 by task a/1
CPU: 0 PID: 1 Comm: a
Call Trace:
 foo+0x1/0x2
";
        let section = section_of(&registry, buf);
        assert_eq!(detect_corruption(&registry, &section), None);
    }
}
