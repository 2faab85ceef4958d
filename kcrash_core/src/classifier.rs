//! Turns a start marker into a populated [`Report`].
//!
//! Classification never fails: a section whose text matches none of its
//! rule's formats still yields a report with a generic title.

use crate::registry::Registry;
use crate::report::{CrashType, ExecutorInfo, Report};
use crate::rule::{CompiledRule, FRAME_PLACEHOLDER};
use crate::scanner::{self, Candidate};
use regex::Captures;
use tracing::debug;

/// Extent of one crash section in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub start: usize,
    pub end: usize,
    pub rule: usize,
    /// Number of lines in `[start, end)`.
    pub lines: usize,
    /// The section stopped because the buffer ran out, not because a
    /// terminator, blank line, reset, next crash marker, or the line cap
    /// closed it.
    pub hit_eof: bool,
    /// Another crash's start marker closed the section.
    pub interrupted: bool,
}

/// Determines where the section opened by `candidate` ends.
pub fn find_section(
    registry: &Registry,
    buf: &[u8],
    candidate: Candidate,
    max_lines: usize,
) -> Section {
    let rule = registry.rule(candidate.rule);
    let max_lines = max_lines.max(1);
    let mut pos = scanner::next_line(buf, scanner::line_end(buf, candidate.line_start));
    let next_marker = scanner::find_next(registry, buf, pos, buf.len(), |rule| {
        !rule.def.overlap_exempt
    })
    .map(|next| next.line_start);
    let mut lines = 1;
    let mut closed = false;
    let mut interrupted = false;

    while pos < buf.len() && lines < max_lines {
        if next_marker.is_some_and(|marker| marker <= pos) {
            closed = true;
            interrupted = true;
            break;
        }
        let end = scanner::line_end(buf, pos);
        let content = scanner::clean_line(registry, &buf[pos..end]);
        if rule.def.blank_line_ends && content.is_empty() {
            closed = true;
            break;
        }
        if registry.is_reset(content) {
            closed = true;
            break;
        }
        lines += 1;
        pos = scanner::next_line(buf, end);
        if is_terminator(rule, content) {
            closed = true;
            pos = absorb_terminators(registry, rule, buf, pos, &mut lines);
            break;
        }
    }

    Section {
        start: candidate.line_start,
        end: pos,
        rule: candidate.rule,
        lines,
        hit_eof: !closed && pos >= buf.len(),
        interrupted,
    }
}

fn is_terminator(rule: &CompiledRule, content: &[u8]) -> bool {
    std::str::from_utf8(content).is_ok_and(|line| rule.is_terminator(line))
}

/// Trailer lines directly after a terminator (`Kernel Offset:` followed by
/// `---[ end Kernel panic`) belong to the same section.
fn absorb_terminators(
    registry: &Registry,
    rule: &CompiledRule,
    buf: &[u8],
    mut pos: usize,
    lines: &mut usize,
) -> usize {
    while pos < buf.len() {
        let end = scanner::line_end(buf, pos);
        if !is_terminator(rule, scanner::clean_line(registry, &buf[pos..end])) {
            break;
        }
        *lines += 1;
        pos = scanner::next_line(buf, end);
    }
    pos
}

/// Builds the report for the section opened by `candidate`.
///
/// `suppressed` and `corrupted` are left unset; the reporter annotates them.
pub fn classify<'a>(
    registry: &Registry,
    buf: &'a [u8],
    candidate: Candidate,
    max_lines: usize,
) -> (Report<'a>, Section) {
    let section = find_section(registry, buf, candidate, max_lines);
    let rule = registry.rule(section.rule);
    let text = cleaned_text(registry, &buf[section.start..section.end]);

    let mut crash_type = rule.def.crash_type;
    let mut alt_titles = Vec::new();
    let mut chosen = None;

    let (title, frame) = match rule.formats.iter().enumerate().find_map(|(idx, format)| {
        format.regex.captures(&text).map(|caps| (idx, format, caps))
    }) {
        Some((idx, format, caps)) => {
            crash_type = format.crash_type;
            chosen = Some((section.rule, idx));
            let frame = frame_for(registry, &caps, &text);
            let title = render(registry, rule, format.template, &caps, &frame);
            for alt in format.alts {
                alt_titles.push(render(registry, rule, alt, &caps, &frame));
            }
            (title, frame)
        }
        None => (
            fallback_title(crash_type),
            stack_frame(registry, &text).unwrap_or_default(),
        ),
    };

    for (rule_idx, other) in registry.rules().iter().enumerate() {
        for (format_idx, format) in other.formats.iter().enumerate() {
            if format.crash_type != crash_type || chosen == Some((rule_idx, format_idx)) {
                continue;
            }
            if let Some(caps) = format.regex.captures(&text) {
                let other_frame = frame_for(registry, &caps, &text);
                let other_frame = if other_frame.is_empty() {
                    &frame
                } else {
                    &other_frame
                };
                alt_titles.push(render(registry, other, format.template, &caps, other_frame));
            }
        }
    }
    let mut seen = Vec::with_capacity(alt_titles.len());
    alt_titles.retain(|alt: &String| {
        if alt == &title || seen.contains(alt) {
            return false;
        }
        seen.push(alt.clone());
        true
    });

    let executor = executor_info(registry, &text);
    let skip_pos = section.end.max(section.start + 1);
    debug!(
        rule = rule.name(),
        start = section.start,
        end = section.end,
        %title,
        "classified report"
    );

    let report = Report {
        title,
        alt_titles,
        crash_type,
        frame,
        rule: rule.name(),
        start_pos: section.start,
        end_pos: section.end,
        skip_pos,
        suppressed: false,
        corrupted: false,
        corrupted_reason: String::new(),
        executor,
        body: &buf[section.start..section.end],
    };
    (report, section)
}

/// Section text with console prefixes stripped, one line per `\n`.
pub fn cleaned_text(registry: &Registry, body: &[u8]) -> String {
    let mut text = String::with_capacity(body.len());
    for (i, line) in body.split(|&b| b == b'\n').enumerate() {
        if i > 0 {
            text.push('\n');
        }
        text.push_str(&String::from_utf8_lossy(scanner::clean_line(registry, line)));
    }
    if text.ends_with('\n') {
        text.pop();
    }
    text
}

fn fallback_title(crash_type: CrashType) -> String {
    format!("unknown crash in {crash_type}")
}

fn frame_for(registry: &Registry, caps: &Captures<'_>, text: &str) -> String {
    match caps.name("frame") {
        Some(m) => {
            let frame = clean_frame(m.as_str());
            if registry.is_skipped_frame(&frame) {
                stack_frame(registry, text).unwrap_or(frame)
            } else {
                frame
            }
        }
        None => stack_frame(registry, text).unwrap_or_default(),
    }
}

/// First frame from a register dump line, else from the call trace, that
/// is not a reporting or allocation helper.
pub fn stack_frame(registry: &Registry, text: &str) -> Option<String> {
    let (registers, stack) = registry.frame_patterns();
    [registers, stack].into_iter().find_map(|patterns| {
        text.lines().find_map(|line| {
            patterns.iter().find_map(|pattern| {
                let frame = clean_frame(pattern.captures(line)?.name("frame")?.as_str());
                (!frame.is_empty() && !registry.is_skipped_frame(&frame)).then_some(frame)
            })
        })
    })
}

/// Drops offsets, compiler clone suffixes, and Go package paths.
pub fn clean_frame(raw: &str) -> String {
    let mut frame = raw.split("+0x").next().unwrap_or(raw);
    if let Some(idx) = frame.rfind('/') {
        frame = &frame[idx + 1..];
    }
    loop {
        let trimmed = strip_clone_suffix(frame);
        if trimmed.len() == frame.len() {
            break;
        }
        frame = trimmed;
    }
    frame.to_string()
}

fn strip_clone_suffix(frame: &str) -> &str {
    const SUFFIXES: &[&str] = &[".isra", ".constprop", ".part", ".cold", ".llvm"];
    let without_digits = frame.trim_end_matches(|c: char| c.is_ascii_digit());
    let stem = without_digits.strip_suffix('.').unwrap_or(without_digits);
    for suffix in SUFFIXES {
        if let Some(rest) = stem.strip_suffix(suffix) {
            if !rest.is_empty() {
                return rest;
            }
        }
    }
    frame
}

fn render(
    registry: &Registry,
    rule: &CompiledRule,
    template: &str,
    caps: &Captures<'_>,
    frame: &str,
) -> String {
    let mut expanded = String::new();
    caps.expand(template, &mut expanded);
    let expanded = if frame.is_empty() {
        expanded
            .replace(&format!(" in {FRAME_PLACEHOLDER}"), "")
            .replace(FRAME_PLACEHOLDER, "unknown")
    } else {
        expanded.replace(FRAME_PLACEHOLDER, frame)
    };
    normalize_title(registry, rule, &expanded)
}

/// Strips run-specific noise so the same bug gets the same title.
pub fn normalize_title(registry: &Registry, rule: &CompiledRule, title: &str) -> String {
    let cleanup = &registry.cleanup;
    let title = cleanup.whitespace.replace_all(title.trim(), " ");
    let title = cleanup.offsets.replace_all(&title, "");
    let title = cleanup.addresses.replace_all(&title, "ADDR");
    let title = cleanup.executors.replace_all(&title, "${name}");
    match rule.def.normalize {
        Some(normalize) => normalize(&title),
        None => title.into_owned(),
    }
}

fn executor_info(registry: &Registry, text: &str) -> Option<ExecutorInfo> {
    let caps = registry.executor().captures(text)?;
    Some(ExecutorInfo {
        proc_id: caps.name("proc")?.as_str().parse().ok()?,
        exec_id: caps.name("exec")?.as_str().parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{self, Target};

    fn registry(os: &str) -> Registry {
        Registry::build(&Target::get(os, target::AMD64).expect("target")).expect("registry")
    }

    fn classify_first(registry: &Registry, buf: &'static [u8]) -> (Report<'static>, Section) {
        let candidate =
            scanner::find_next(registry, buf, 0, buf.len(), |_| true).expect("a crash marker");
        classify(registry, buf, candidate, 1000)
    }

    const KASAN_UAF: &[u8] = b"[   20.1] ==================================================================
[   20.1] BUG: KASAN: slab-use-after-free in ext4_fill_super+0x1f2/0x3a0
[   20.1] Read of size 8 at addr ffff888012345678 by task syz.2.17/4321
[   20.1]
[   20.1] CPU: 0 PID: 4321 Comm: syz.2.17 Not tainted 6.1.0 #1
[   20.1] Call Trace:
[   20.1]  <TASK>
[   20.1]  dump_stack_lvl+0x8b/0xb3
[   20.1]  print_report+0x171/0x4a0
[   20.1]  kasan_report+0xbd/0xf0
[   20.1]  ext4_fill_super+0x1f2/0x3a0
[   20.1]  </TASK>
[   20.1] ==================================================================
[   20.2] next boot message
";

    #[test]
    fn kasan_report_gets_typed_title_frame_and_executor() {
        let registry = registry(target::LINUX);
        let (report, section) = classify_first(&registry, KASAN_UAF);
        assert_eq!(report.title, "KASAN: slab-use-after-free Read in ext4_fill_super");
        assert_eq!(report.crash_type, CrashType::UseAfterFree);
        assert_eq!(report.frame, "ext4_fill_super");
        assert_eq!(report.rule, "kasan");
        assert_eq!(
            report.executor,
            Some(ExecutorInfo {
                proc_id: 2,
                exec_id: 17
            })
        );
        assert!(
            report
                .alt_titles
                .contains(&"KASAN: slab-use-after-free in ext4_fill_super".to_string()),
            "the access-less format of the same type should be an alt title: {:?}",
            report.alt_titles
        );
        assert!(!section.hit_eof, "the closing ==== line terminates the section");
        let body = std::str::from_utf8(report.body).expect("ascii body");
        assert!(body.starts_with("[   20.1] BUG: KASAN"));
        assert!(body.trim_end().ends_with("======"));
        assert_eq!(report.skip_pos, report.end_pos);
    }

    #[test]
    fn frame_from_stack_skips_reporting_helpers() {
        let registry = registry(target::LINUX);
        let buf: &'static [u8] = b"Kernel panic - not syncing: VFS: Unable to mount root fs
CPU: 0 PID: 1 Comm: swapper/0 Not tainted 6.1.0 #1
Call Trace:
 <TASK>
 dump_stack_lvl+0x8b/0xb3
 panic+0x2c8/0x622
 mount_block_root+0x2f1/0x3b0
 </TASK>
Kernel Offset: disabled
---[ end Kernel panic - not syncing: VFS: Unable to mount root fs ]---
";
        let (report, section) = classify_first(&registry, buf);
        assert_eq!(report.crash_type, CrashType::Panic);
        assert_eq!(report.title, "kernel panic: VFS: Unable to mount root fs");
        assert_eq!(report.frame, "mount_block_root");
        assert_eq!(section.end, buf.len(), "trailer after Kernel Offset is absorbed");
        assert!(!section.hit_eof);
    }

    #[test]
    fn unmatched_formats_fall_back_to_generic_title() {
        let registry = registry(target::LINUX);
        let buf: &'static [u8] = b"Oops\nno details at all\n";
        let candidate = Candidate {
            line_start: 0,
            rule: registry
                .rules()
                .iter()
                .position(|r| r.name() == "workqueue-lockup")
                .expect("workqueue rule"),
        };
        let (report, _) = classify(&registry, buf, candidate, 1000);
        assert_eq!(report.title, "unknown crash in hang");
        assert_eq!(report.frame, "");
    }

    #[test]
    fn missing_frame_drops_placeholder() {
        let registry = registry(target::LINUX);
        let buf: &'static [u8] = b"BUG: soft lockup - CPU#1 stuck for 22s! [syz-executor.3:999]\nModules linked in:\n";
        let (report, _) = classify_first(&registry, buf);
        assert_eq!(report.title, "BUG: soft lockup");
        assert!(report.frame.is_empty());
    }

    #[test]
    fn blank_line_ends_section_exclusively() {
        let registry = registry(target::LINUX);
        let buf: &'static [u8] =
            b"BUG: workqueue lockup - pool cpus=0 stuck\nShowing busy workqueues\n\nafter\n";
        let (report, section) = classify_first(&registry, buf);
        assert_eq!(section.lines, 2);
        assert_eq!(
            report.body,
            b"BUG: workqueue lockup - pool cpus=0 stuck\nShowing busy workqueues\n"
        );
        assert!(!section.hit_eof);
    }

    #[test]
    fn reset_marker_closes_section() {
        let registry = registry(target::LINUX);
        let buf: &'static [u8] = b"WARNING: CPU: 0 PID: 1 at fs/ext4/super.c:42 ext4_remount+0x10/0x20\nModules linked in:\nLinux version 6.1.0\nmore\n";
        let (report, section) = classify_first(&registry, buf);
        assert_eq!(section.lines, 2);
        assert!(report.body.ends_with(b"Modules linked in:\n"));
        assert_eq!(report.title, "WARNING in ext4_remount");
        assert!(report.alt_titles.contains(&"WARNING: fs/ext4/super.c".to_string()));
    }

    #[test]
    fn next_crash_marker_ends_section_exclusively() {
        let registry = registry(target::LINUX);
        let buf: &'static [u8] = b"BUG: soft lockup - CPU#0 stuck for 22s! [syz.1.2:100]
Modules linked in:
RIP: 0010:queued_spin_lock_slowpath+0x10/0x20
BUG: KASAN: use-after-free in foo+0x1/0x2
Read of size 8 at addr ffff888000000000 by task a/1
";
        let (report, section) = classify_first(&registry, buf);
        assert!(section.interrupted);
        assert!(!section.hit_eof);
        assert_eq!(section.lines, 3);
        assert!(report.body.ends_with(b"queued_spin_lock_slowpath+0x10/0x20\n"));
    }

    #[test]
    fn allocator_helpers_are_not_culprit_frames() {
        let registry = registry(target::LINUX);
        let buf: &'static [u8] = b"BUG: memory leak
unreferenced object 0xffff888109e6a000 (size 64):
  comm \"syz.0.5\", pid 3605, jiffies 4294944843
  backtrace:
    kmalloc_trace+0x26/0x60
    ext4_fill_super+0x1f2/0x3a0
    mount_bdev+0x1c/0x20
";
        let (report, _) = classify_first(&registry, buf);
        assert_eq!(report.title, "memory leak in ext4_fill_super");
        assert_eq!(report.frame, "ext4_fill_super");
    }

    #[test]
    fn line_cap_bounds_section() {
        let registry = registry(target::LINUX);
        let buf: &'static [u8] = b"BUG: KASAN: wild-memory-access in foo+0x1/0x2\na\nb\nc\nd\ne\n";
        let candidate = scanner::find_next(&registry, buf, 0, buf.len(), |_| true).expect("marker");
        let (report, section) = classify(&registry, buf, candidate, 3);
        assert_eq!(section.lines, 3);
        assert_eq!(report.body, b"BUG: KASAN: wild-memory-access in foo+0x1/0x2\na\nb\n");
        assert!(!section.hit_eof, "the line cap is not a truncation");
    }

    #[test]
    fn unterminated_section_runs_to_buffer_end() {
        let registry = registry(target::LINUX);
        let buf: &'static [u8] = b"BUG: KASAN: use-after-free in foo+0x1/0x2";
        let (report, section) = classify_first(&registry, buf);
        assert!(section.hit_eof);
        assert_eq!(report.end_pos, buf.len());
        assert_eq!(report.skip_pos, buf.len());
    }

    #[test]
    fn clean_frame_removes_compiler_suffixes_and_paths() {
        assert_eq!(clean_frame("foo.isra.0+0x12/0x30"), "foo");
        assert_eq!(clean_frame("bar.constprop.0.cold"), "bar");
        assert_eq!(clean_frame("baz.part.3"), "baz");
        assert_eq!(
            clean_frame("gvisor.dev/gvisor/pkg/sentry/kernel.(*Task).run"),
            "kernel.(*Task).run"
        );
        assert_eq!(clean_frame("plain"), "plain");
    }

    #[test]
    fn titles_are_normalized() {
        let registry = registry(target::LINUX);
        let rule = registry
            .rules()
            .iter()
            .find(|r| r.name() == "syzfail")
            .expect("syzfail rule");
        assert_eq!(
            normalize_title(&registry, rule, "SYZFAIL:   bad   addr  ffffffff81234567 in syz.1.2"),
            "SYZFAIL: bad addr ADDR in syz"
        );
        assert_eq!(
            normalize_title(&registry, rule, "SYZFAIL: x in foo+0x10/0x20 by syz-executor123"),
            "SYZFAIL: x in foo by syz-executor"
        );
    }

    #[test]
    fn go_stack_frame_extraction() {
        let registry = Registry::build(&Target::get(target::GVISOR, target::AMD64).expect("gvisor"))
            .expect("registry");
        let buf: &'static [u8] = b"panic: runtime error: invalid memory address or nil pointer dereference
goroutine 1 [running]:
panic({0x1, 0x2})
\t/usr/local/go/src/runtime/panic.go:884 +0x213
runtime.panicmem()
\t/usr/local/go/src/runtime/panic.go:260 +0x1d
gvisor.dev/gvisor/pkg/sentry/fsimpl/proc.(*subtasksInode).Lookup(0xc000123456, 0x0)
\tpkg/sentry/fsimpl/proc/subtasks.go:70 +0x55
";
        let (report, _) = classify_first(&registry, buf);
        assert_eq!(report.frame, "proc.(*subtasksInode).Lookup");
        assert_eq!(
            report.title,
            "panic: runtime error: invalid memory address or nil pointer dereference in proc.(*subtasksInode).Lookup"
        );
    }
}
