use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed classification of a recognized kernel failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrashType {
    Unknown,
    Panic,
    Bug,
    Warning,
    Hang,
    Lockdep,
    AtomicSleep,
    Kasan,
    Kmsan,
    Kfence,
    Ubsan,
    UseAfterFree,
    OutOfBounds,
    NullDeref,
    #[serde(rename = "gpf")]
    GeneralProtection,
    MemoryLeak,
    DataRace,
    SyzFailure,
}

impl CrashType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrashType::Unknown => "unknown",
            CrashType::Panic => "panic",
            CrashType::Bug => "bug",
            CrashType::Warning => "warning",
            CrashType::Hang => "hang",
            CrashType::Lockdep => "lockdep",
            CrashType::AtomicSleep => "atomic-sleep",
            CrashType::Kasan => "kasan",
            CrashType::Kmsan => "kmsan",
            CrashType::Kfence => "kfence",
            CrashType::Ubsan => "ubsan",
            CrashType::UseAfterFree => "use-after-free",
            CrashType::OutOfBounds => "out-of-bounds",
            CrashType::NullDeref => "null-deref",
            CrashType::GeneralProtection => "gpf",
            CrashType::MemoryLeak => "memory-leak",
            CrashType::DataRace => "data-race",
            CrashType::SyzFailure => "syz-failure",
        }
    }
}

impl fmt::Display for CrashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the fuzzing executor process that was running when the
/// kernel crashed, recovered from `syz.<proc>.<exec>` task names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorInfo {
    pub proc_id: u64,
    pub exec_id: u64,
}

/// A single crash report located in a kernel log.
///
/// The body borrows from the log buffer the report was parsed from, so all
/// reports of one `parse_all` call share that buffer read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report<'a> {
    /// Normalized, human-meaningful summary of the crash.
    pub title: String,
    /// Equivalent renderings of the title, in registry declaration order.
    pub alt_titles: Vec<String>,
    pub crash_type: CrashType,
    /// Implicated function, empty when no stack line could be used.
    pub frame: String,
    /// Name of the pattern rule that recognized the report.
    pub rule: &'static str,
    pub start_pos: usize,
    pub end_pos: usize,
    /// Offset the next parse resumes from; always greater than `start_pos`.
    pub skip_pos: usize,
    pub suppressed: bool,
    pub corrupted: bool,
    /// Non-empty exactly when `corrupted` is set.
    pub corrupted_reason: String,
    pub executor: Option<ExecutorInfo>,
    /// `buffer[start_pos..end_pos]`, unmodified.
    pub body: &'a [u8],
}

impl Report<'_> {
    /// MD5 of the crash type and title, stable across formatting variants
    /// that normalize to the same title.
    pub fn signature(&self) -> String {
        let digest = md5::compute(format!("{}\n{}", self.crash_type, self.title));
        format!("{:x}", digest)
    }

    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.body)
    }
}
