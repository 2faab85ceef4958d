//! Per-OS crash signature tables.
//!
//! Each OS contributes one [`OsRules`] value. Adding a target is a data
//! change here; the scanner and classifier stay target-agnostic.

use crate::rule::RuleDef;
use crate::target;

mod bsd;
mod common;
mod darwin;
mod fuchsia;
mod gvisor;
mod linux;

pub use common::{CONSOLE_PREFIX, EXECUTOR_PATTERN, SUPPRESSIONS as COMMON_SUPPRESSIONS};

/// Everything the registry needs to know about one operating system.
#[derive(Debug, Clone, Copy)]
pub struct OsRules {
    pub rules: &'static [RuleDef],
    /// Call-trace line patterns; each must capture `frame`.
    pub stack_frames: &'static [&'static str],
    /// Functions that never name the culprit (reporting, allocation,
    /// scheduling helpers). Matched against the whole cleaned frame.
    pub skip_frames: &'static [&'static str],
    /// Known-benign signatures specific to this OS.
    pub suppressions: &'static [&'static str],
    /// Lines that mean the machine restarted; they close any open section.
    pub resets: &'static [&'static str],
    /// Register dump lines naming the faulting function, per architecture.
    pub register_frames: fn(&str) -> &'static [&'static str],
}

pub fn for_os(os: &str) -> Option<&'static OsRules> {
    match os {
        target::LINUX => Some(&linux::RULES),
        target::FREEBSD => Some(&bsd::FREEBSD),
        target::NETBSD => Some(&bsd::NETBSD),
        target::OPENBSD => Some(&bsd::OPENBSD),
        target::FUCHSIA => Some(&fuchsia::RULES),
        target::GVISOR => Some(&gvisor::RULES),
        target::DARWIN => Some(&darwin::RULES),
        _ => None,
    }
}

fn no_register_frames(_arch: &str) -> &'static [&'static str] {
    &[]
}
