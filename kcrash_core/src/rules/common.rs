/// Console decorations that precede the kernel's own text: syslog level,
/// printk timestamp, caller id, and Fuchsia's `pid:tid>` tag.
pub const CONSOLE_PREFIX: &str =
    r"^(?:<\d+>)?(?:\[\s*\d+\.\d+\s*\]\s?)?(?:\[\s*[TCI]\d+\s*\]\s?)?(?:\d+[.:]\d+> )?";

/// Fuzzer executor task names, `syz.<proc>.<exec>`.
pub const EXECUTOR_PATTERN: &str = r"\bsyz\.(?P<proc>\d+)\.(?P<exec>\d+)\b";

/// Signatures that are benign on every target: the fuzzer's own
/// infrastructure failing, or memory exhaustion it provoked on purpose.
pub const SUPPRESSIONS: &[&str] = &[
    r"panic: failed to start executor binary",
    r"panic: executor failed: pthread_create failed",
    r"fatal error: runtime: out of memory",
    r"fatal error: runtime: cannot allocate memory",
    r"fatal error: unexpected signal during runtime execution",
    r"signal SIGBUS: bus error",
    r"Out of memory: Kill(?:ed)? process \d+ \(syz",
    r"lowmemorykiller: Killing 'syz",
];
