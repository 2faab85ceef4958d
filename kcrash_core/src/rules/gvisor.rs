use super::{OsRules, no_register_frames};
use crate::report::CrashType;
use crate::rule::{RuleDef, TitleFormat};

const PANIC_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r"panic: (?P<msg>runtime error: [^\n\[]+)",
        "panic: ${msg} in {FRAME}",
    ),
    TitleFormat::new(r"panic: (?P<msg>[^\n]+)", "panic: ${msg}"),
    TitleFormat::new(r"fatal error: (?P<msg>[^\n]+)", "fatal error: ${msg}"),
];

const RACE_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"WARNING: DATA RACE\n(?:Write|Read) at [^\n]* by goroutine \d+:\n(?P<frame>[^\s(][^\s]*)\([^()\n]*\)",
    "DATA RACE in {FRAME}",
)];

const RULES_LIST: &[RuleDef] = &[
    RuleDef::new("data-race", &["WARNING: DATA RACE"], CrashType::DataRace)
        .priority(20)
        .formats(RACE_FORMATS)
        .terminators(&["=================="])
        .min_lines(4),
    RuleDef::new("panic", &["panic: ", "fatal error: "], CrashType::Panic)
        .priority(10)
        .formats(PANIC_FORMATS)
        .min_lines(3)
        .normalize(normalize_go_panic),
];

pub const RULES: OsRules = OsRules {
    rules: RULES_LIST,
    stack_frames: &[r"^(?P<frame>[^\s(\[][^\s]*)\([^()]*\)$"],
    skip_frames: &[
        r"panic",
        r"runtime\..*",
        r"sync\..*",
        r"log\..*",
        r"atomicbitops\..*",
        r"syncevent\..*",
    ],
    suppressions: &[r"FATAL ERROR: Sentry out of memory"],
    resets: &["Running runsc "],
    register_frames: no_register_frames,
};

/// Go panics embed goroutine ids and argument words.
fn normalize_go_panic(title: &str) -> String {
    match title.find(" [recovered]") {
        Some(idx) => title[..idx].to_string(),
        None => title.to_string(),
    }
}
