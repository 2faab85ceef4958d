use super::{OsRules, no_register_frames};
use crate::report::CrashType;
use crate::rule::{RuleDef, TitleFormat};

const PANIC_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"panic\(cpu \d+ caller 0x[0-9a-f]+\): (?P<msg>[^\n]+)",
    "panic: ${msg}",
)];

const RULES_LIST: &[RuleDef] = &[RuleDef::new("panic", &["panic(cpu "], CrashType::Panic)
    .priority(10)
    .formats(PANIC_FORMATS)
    .blank_line_ends()
    .min_lines(3)
    .normalize(normalize_darwin_panic)];

pub const RULES: OsRules = OsRules {
    rules: RULES_LIST,
    stack_frames: &[r"^0x[0-9a-f]+ : 0x[0-9a-f]+ [^:]+ : (?P<frame>[A-Za-z0-9_.]+) \+ 0x"],
    skip_frames: &[
        r"_?handle_debugger_trap",
        r"_?DebuggerTrapWithState",
        r"_?panic_trap_to_debugger",
        r"_?panic.*",
        r"_?Assert",
        r"_?kernel_trap",
        r"_?trap_from_kernel",
        r"_?hndl_alltraps",
        r"_?return_from_trap",
        r"_?debugger_collect_diagnostics",
    ],
    suppressions: &[r"panic\(cpu \d+ caller 0x[0-9a-f]+\): \x22?zalloc: zone map exhausted"],
    resets: &["Darwin Kernel Version "],
    register_frames: no_register_frames,
};

/// Drops the `"..."@/path/file.c:123` source reference and surrounding
/// quotes that xnu appends to panic strings.
fn normalize_darwin_panic(title: &str) -> String {
    let title = match title.find("\"@") {
        Some(idx) => &title[..idx],
        None => title,
    };
    title.replacen("panic: \"", "panic: ", 1)
}
