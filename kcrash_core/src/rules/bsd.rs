use super::{OsRules, no_register_frames};
use crate::report::CrashType;
use crate::rule::{RuleDef, TitleFormat};

const FREEBSD_END: &[&str] = &["Uptime:", "Automatic reboot in", "Rebooting..."];

const FREEBSD_PANIC_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r"panic: ASan: Invalid access, (?P<size>\d+)-byte (?P<access>read|write) at",
        "KASAN: invalid-access ${access} in {FRAME}",
    )
    .typed(CrashType::Kasan),
    TitleFormat::new(r"panic: (?P<msg>[^\n]+)", "panic: ${msg}"),
];

const FREEBSD_TRAP_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"Fatal trap (?P<num>\d+): (?P<what>[^\n]+?) while in kernel mode",
    "Fatal trap ${num}: ${what} in {FRAME}",
)];

const FREEBSD_LOR_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"lock order reversal",
    "lock order reversal in {FRAME}",
)];

const FREEBSD_RULES: &[RuleDef] = &[
    RuleDef::new("fatal-trap", &["Fatal trap "], CrashType::Bug)
        .priority(20)
        .formats(FREEBSD_TRAP_FORMATS)
        .terminators(FREEBSD_END)
        .min_lines(4),
    RuleDef::new("lock-order-reversal", &["lock order reversal:"], CrashType::Lockdep)
        .priority(20)
        .formats(FREEBSD_LOR_FORMATS)
        .blank_line_ends()
        .min_lines(3),
    RuleDef::new("panic", &["panic: "], CrashType::Panic)
        .priority(10)
        .formats(FREEBSD_PANIC_FORMATS)
        .terminators(FREEBSD_END)
        .min_lines(3)
        .overlap_exempt(),
];

pub const FREEBSD: OsRules = OsRules {
    rules: FREEBSD_RULES,
    stack_frames: &[
        r"^#\d+ 0x[0-9a-f]+ at (?P<frame>[A-Za-z0-9_.]+)\+0x",
        r"^(?P<frame>[A-Za-z0-9_.]+)\(\) at [A-Za-z0-9_.]+\+0x",
    ],
    skip_frames: &[
        r"kdb_backtrace",
        r"db_trace_self.*",
        r"vpanic",
        r"panic",
        r"doadump",
        r"kern_reboot",
        r"trap_fatal",
        r"trap_pfault",
        r"trap",
        r"calltrap",
        r"kasan_.*",
        r"__asan_.*",
        r"witness_checkorder",
        r"__mtx_lock.*",
        r"_sx_xlock.*",
        r"malloc",
        r"uma_zalloc.*",
    ],
    suppressions: &[r"panic: kmem_malloc\(\d+\): kmem_map too small"],
    resets: &["FreeBSD is a registered trademark", "Copyright (c) 1992-"],
    register_frames: no_register_frames,
};

const NETBSD_END: &[&str] = &["End traceback", "rebooting...", "dumping to dev"];

const NETBSD_PANIC_FORMATS: &[TitleFormat] =
    &[TitleFormat::new(r"panic: (?P<msg>[^\n]+)", "panic: ${msg}")];

const NETBSD_FAULT_FORMATS: &[TitleFormat] =
    &[TitleFormat::new(r"uvm_fault\(", "page fault in {FRAME}")];

const NETBSD_ASAN_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"ASan: Unauthorized Access In [^:]+: Addr [^\[]*\[\d+ bytes?, (?P<access>read|write)",
    "ASan: invalid access ${access} in {FRAME}",
)];

const NETBSD_RULES: &[RuleDef] = &[
    RuleDef::new("asan", &["ASan: Unauthorized Access In "], CrashType::Kasan)
        .priority(30)
        .formats(NETBSD_ASAN_FORMATS)
        .terminators(NETBSD_END)
        .min_lines(3),
    RuleDef::new("uvm-fault", &["uvm_fault("], CrashType::Bug)
        .priority(20)
        .formats(NETBSD_FAULT_FORMATS)
        .terminators(NETBSD_END)
        .min_lines(3),
    RuleDef::new("panic", &["panic: "], CrashType::Panic)
        .priority(10)
        .formats(NETBSD_PANIC_FORMATS)
        .terminators(NETBSD_END)
        .min_lines(3)
        .overlap_exempt(),
];

pub const NETBSD: OsRules = OsRules {
    rules: NETBSD_RULES,
    stack_frames: &[r"at netbsd:(?P<frame>[A-Za-z0-9_.]+)\+0x"],
    skip_frames: &[
        r"vpanic",
        r"panic",
        r"db_panic",
        r"kern_reboot",
        r"trap",
        r"alltraps",
        r"calltrap",
        r"uvm_fault.*",
        r"kasan_.*",
        r"__asan_.*",
        r"mutex_vector_enter",
        r"kmem_.*alloc",
    ],
    suppressions: &[r"panic: UVM: pmap_growkernel: out of memory"],
    resets: &["NetBSD/amd64 ", ">> NetBSD/x86 BIOS Boot"],
    register_frames: no_register_frames,
};

const OPENBSD_END: &[&str] = &["end trace frame:", "https://www.openbsd.org/ddb.html"];

const OPENBSD_PANIC_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r#"panic: kernel diagnostic assertion "(?P<expr>[^"]+)" failed: file "(?P<file>[^"]+)""#,
        "assert ${expr} failed in {FRAME}",
    )
    .with_alts(&["assert ${expr} failed in ${file}"])
    .typed(CrashType::Bug),
    TitleFormat::new(r"panic: (?P<msg>[^\n]+)", "panic: ${msg}"),
];

const OPENBSD_FAULT_FORMATS: &[TitleFormat] =
    &[TitleFormat::new(r"uvm_fault\(", "uvm_fault in {FRAME}")];

const OPENBSD_WITNESS_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"lock order reversal",
    "witness: lock order reversal in {FRAME}",
)];

const OPENBSD_RULES: &[RuleDef] = &[
    RuleDef::new("uvm-fault", &["uvm_fault("], CrashType::Bug)
        .priority(20)
        .formats(OPENBSD_FAULT_FORMATS)
        .terminators(OPENBSD_END)
        .min_lines(3),
    RuleDef::new(
        "witness",
        &["witness: lock order reversal:", "lock order reversal:"],
        CrashType::Lockdep,
    )
    .priority(20)
    .formats(OPENBSD_WITNESS_FORMATS)
    .blank_line_ends()
    .min_lines(3),
    RuleDef::new("panic", &["panic: "], CrashType::Panic)
        .priority(10)
        .formats(OPENBSD_PANIC_FORMATS)
        .terminators(OPENBSD_END)
        .min_lines(3)
        .overlap_exempt(),
];

pub const OPENBSD: OsRules = OsRules {
    rules: OPENBSD_RULES,
    stack_frames: &[
        r"^Stopped at\s+(?P<frame>[A-Za-z0-9_.]+)\+0x",
        r"^(?P<frame>[A-Za-z0-9_.]+)\([^)]*\) at [A-Za-z0-9_.]+\+0x",
    ],
    skip_frames: &[
        r"db_enter",
        r"db_ktrap",
        r"panic",
        r"__assert",
        r"kerntrap",
        r"trap",
        r"alltraps.*",
        r"uvm_fault",
        r"witness_checkorder",
        r"mtx_enter.*",
        r"malloc",
        r"pool_get",
    ],
    suppressions: &[r"panic: cannot mount root"],
    resets: &["OpenBSD ", ">> OpenBSD/amd64 BOOT"],
    register_frames: no_register_frames,
};
