use super::{OsRules, no_register_frames};
use crate::report::CrashType;
use crate::rule::{RuleDef, TitleFormat};

const END: &[&str] = &["{{{reset}}}", "entering panic shell loop", "Halted"];

const PANIC_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r"KERNEL PANIC\n(?:[^\n]*\n)*?panic \(caller [^)]*\): (?P<msg>[^\n]+)",
        "panic: ${msg}",
    ),
    TitleFormat::new(r"KERNEL PANIC", "KERNEL PANIC in {FRAME}"),
];

const EXCEPTION_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(r"<== fatal page fault", "page fault in {FRAME}"),
    TitleFormat::new(r"<== fatal exception", "fatal exception in {FRAME}"),
];

const ASSERT_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"ASSERT FAILED at \((?P<file>[^:)]+):\d+\): (?P<expr>[^\n]+)",
    "ASSERT FAILED at ${file}: ${expr}",
)];

const RULES_LIST: &[RuleDef] = &[
    RuleDef::new(
        "kernel-panic",
        &["ZIRCON KERNEL PANIC", "KERNEL PANIC"],
        CrashType::Panic,
    )
    .priority(20)
    .formats(PANIC_FORMATS)
    .terminators(END)
    .min_lines(2),
    RuleDef::new(
        "fatal-exception",
        &["<== fatal exception", "<== fatal page fault"],
        CrashType::Bug,
    )
    .priority(20)
    .formats(EXCEPTION_FORMATS)
    .blank_line_ends()
    .min_lines(2),
    RuleDef::new("assert", &["ASSERT FAILED at "], CrashType::Bug)
        .priority(20)
        .formats(ASSERT_FORMATS)
        .terminators(END)
        .blank_line_ends()
        .min_lines(1),
];

pub const RULES: OsRules = OsRules {
    rules: RULES_LIST,
    stack_frames: &[r"^#\d+(?:\.\d+)?:?\s+0x[0-9a-f]+ in (?P<frame>[A-Za-z0-9_:.~]+)"],
    skip_frames: &[
        r"panic.*",
        r"_panic",
        r"__zx_panic",
        r"__assert_fail",
        r"assert_fail_msg",
        r"platform_halt",
        r"abort",
        r"exception_die",
        r"handle_exception",
        r"x86_exception_handler",
        r"arm64_sync_exc",
    ],
    suppressions: &[r"OOM: memory availability state"],
    resets: &["welcome to Zircon", "physboot: "],
    register_frames: no_register_frames,
};
