use super::OsRules;
use crate::report::CrashType;
use crate::rule::{RuleDef, TitleFormat};
use crate::target;

const END_OF_OOPS: &[&str] = &["---[ end trace", "Kernel Offset:", "Rebooting in"];
const END_OF_SANITIZER: &[&str] = &["=================================================="];
const END_OF_TASK: &[&str] = &["</TASK>", "---[ end trace", "Kernel Offset:", "Rebooting in"];

const KASAN_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r"BUG: KASAN: (?P<kind>(?:slab-|vmalloc-)?use-after-free) in (?P<frame>[A-Za-z0-9_.]+)[^\n]*\n(?P<access>Read|Write) of size",
        "KASAN: ${kind} ${access} in {FRAME}",
    )
    .typed(CrashType::UseAfterFree),
    TitleFormat::new(
        r"BUG: KASAN: (?P<kind>(?:[a-z]+-)?out-of-bounds) in (?P<frame>[A-Za-z0-9_.]+)[^\n]*\n(?P<access>Read|Write) of size",
        "KASAN: ${kind} ${access} in {FRAME}",
    )
    .typed(CrashType::OutOfBounds),
    TitleFormat::new(
        r"BUG: KASAN: (?P<kind>(?:slab-|vmalloc-)?use-after-free) in (?P<frame>[A-Za-z0-9_.]+)",
        "KASAN: ${kind} in {FRAME}",
    )
    .typed(CrashType::UseAfterFree),
    TitleFormat::new(
        r"BUG: KASAN: (?P<kind>(?:[a-z]+-)?out-of-bounds) in (?P<frame>[A-Za-z0-9_.]+)",
        "KASAN: ${kind} in {FRAME}",
    )
    .typed(CrashType::OutOfBounds),
    TitleFormat::new(
        r"BUG: KASAN: (?P<kind>[a-z\-]+) in (?P<frame>[A-Za-z0-9_.]+)",
        "KASAN: ${kind} in {FRAME}",
    ),
    TitleFormat::new(r"BUG: KASAN: (?P<kind>[a-z\-]+)", "KASAN: ${kind} in {FRAME}"),
];

const KMSAN_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r"BUG: KMSAN: (?P<kind>[a-z\-]+) in (?P<frame>[A-Za-z0-9_.]+)",
        "KMSAN: ${kind} in {FRAME}",
    ),
    TitleFormat::new(r"BUG: KMSAN: (?P<kind>[a-z\-]+)", "KMSAN: ${kind} in {FRAME}"),
];

const KFENCE_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"BUG: KFENCE: (?P<kind>[a-z\-]+(?: read| write)?) in (?P<frame>[A-Za-z0-9_.]+)",
    "KFENCE: ${kind} in {FRAME}",
)];

const KCSAN_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r"BUG: KCSAN: data-race in (?P<frame>[A-Za-z0-9_.]+)(?:\+0x[0-9a-f]+/0x[0-9a-f]+)? / (?P<other>[A-Za-z0-9_.]+)",
        "KCSAN: data-race in {FRAME} / ${other}",
    ),
    TitleFormat::new(
        r"BUG: KCSAN: (?P<kind>[a-z\-]+) in (?P<frame>[A-Za-z0-9_.]+)",
        "KCSAN: ${kind} in {FRAME}",
    ),
];

const UBSAN_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"UBSAN: (?P<kind>[a-z\-]+) in (?P<file>[^\s:]+)",
    "UBSAN: ${kind} in {FRAME}",
)
.with_alts(&["UBSAN: ${kind} in ${file}"])];

const LOCKDEP_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r"WARNING: possible (?:circular|recursive) locking(?: dependency)? detected\n(?:[^\n]*\n)*?[^\n]*is trying to acquire lock:\n[^\n]*at: (?P<frame>[A-Za-z0-9_.]+)",
        "possible deadlock in {FRAME}",
    ),
    TitleFormat::new(
        r"WARNING: possible (?:circular|recursive) locking",
        "possible deadlock in {FRAME}",
    ),
    TitleFormat::new(
        r"WARNING: inconsistent lock state",
        "inconsistent lock state in {FRAME}",
    ),
    TitleFormat::new(
        r"WARNING: suspicious RCU usage\n(?:[^\n]*\n){0,3}?(?P<file>[A-Za-z0-9_\-/.]+\.[ch]):\d+ ",
        "suspicious RCU usage at ${file}",
    ),
    TitleFormat::new(
        r"WARNING: suspicious RCU usage",
        "suspicious RCU usage in {FRAME}",
    ),
    TitleFormat::new(
        r"WARNING: lock held when returning to user space",
        "WARNING: lock held when returning to user space in {FRAME}",
    ),
];

const WARNING_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r"WARNING: CPU: \d+ PID: \d+ at (?P<file>[^\s:]+)(?::\d+)? (?P<frame>[A-Za-z0-9_.]+)\+",
        "WARNING in {FRAME}",
    )
    .with_alts(&["WARNING: ${file}"]),
    TitleFormat::new(r"WARNING: CPU: \d+ PID: \d+ at", "WARNING in {FRAME}"),
];

const PAGE_FAULT_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r"BUG: unable to handle (?:kernel )?NULL pointer dereference",
        "BUG: unable to handle kernel NULL pointer dereference in {FRAME}",
    )
    .typed(CrashType::NullDeref),
    TitleFormat::new(
        r"BUG: unable to handle (?:kernel paging request|page fault for address)",
        "BUG: unable to handle kernel paging request in {FRAME}",
    ),
];

const ATOMIC_SLEEP_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r"BUG: sleeping function called from invalid context",
        "BUG: sleeping function called from invalid context in {FRAME}",
    ),
    TitleFormat::new(
        r"BUG: scheduling while atomic",
        "BUG: scheduling while atomic in {FRAME}",
    ),
];

const HUNG_TASK_FORMATS: &[TitleFormat] = &[
    TitleFormat::new(
        r"INFO: task [^\n]*blocked for more than \d+ seconds",
        "INFO: task hung in {FRAME}",
    ),
    TitleFormat::new(r"INFO: task [^\n]*can't die", "INFO: task can't die in {FRAME}"),
];

const GPF_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"general protection fault",
    "general protection fault in {FRAME}",
)];

const KERNEL_BUG_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"kernel BUG at (?P<file>[^\s!]+)!",
    "kernel BUG in {FRAME}",
)
.with_alts(&["kernel BUG at ${file}"])];

const SOFT_LOCKUP_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"BUG: soft lockup",
    "BUG: soft lockup in {FRAME}",
)];

const WORKQUEUE_LOCKUP_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"BUG: workqueue lockup",
    "BUG: workqueue lockup",
)];

const MEMORY_LEAK_FORMATS: &[TitleFormat] =
    &[TitleFormat::new(r"BUG: memory leak", "memory leak in {FRAME}")];

const RCU_STALL_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"INFO: rcu_[a-z]+ (?:self-)?detected (?:expedited )?stalls?",
    "INFO: rcu detected stall in {FRAME}",
)];

const SYZFAIL_FORMATS: &[TitleFormat] =
    &[TitleFormat::new(r"SYZFAIL: (?P<msg>[^\n]+)", "SYZFAIL: ${msg}")];

const PANIC_FORMATS: &[TitleFormat] = &[TitleFormat::new(
    r"Kernel panic - not syncing: (?P<reason>[^\n]+)",
    "kernel panic: ${reason}",
)];

const OOPS_FORMATS: &[TitleFormat] = &[TitleFormat::new(r"Oops", "Oops in {FRAME}")];

const BUG_FORMATS: &[TitleFormat] =
    &[TitleFormat::new(r"BUG: (?P<what>[^\n]+)", "BUG: ${what}")];

const RULES_LIST: &[RuleDef] = &[
    RuleDef::new("kasan", &["BUG: KASAN: "], CrashType::Kasan)
        .priority(30)
        .formats(KASAN_FORMATS)
        .terminators(END_OF_SANITIZER)
        .min_lines(4),
    RuleDef::new("kmsan", &["BUG: KMSAN: "], CrashType::Kmsan)
        .priority(30)
        .formats(KMSAN_FORMATS)
        .terminators(END_OF_SANITIZER)
        .min_lines(4),
    RuleDef::new("kfence", &["BUG: KFENCE: "], CrashType::Kfence)
        .priority(30)
        .formats(KFENCE_FORMATS)
        .terminators(END_OF_SANITIZER)
        .min_lines(4),
    RuleDef::new("kcsan", &["BUG: KCSAN: "], CrashType::DataRace)
        .priority(30)
        .formats(KCSAN_FORMATS)
        .terminators(END_OF_SANITIZER)
        .min_lines(4),
    RuleDef::new("ubsan", &["UBSAN: "], CrashType::Ubsan)
        .priority(30)
        .formats(UBSAN_FORMATS)
        .terminators(END_OF_SANITIZER)
        .min_lines(3),
    RuleDef::new(
        "lockdep",
        &[
            "WARNING: possible circular locking",
            "WARNING: possible recursive locking",
            "WARNING: inconsistent lock state",
            "WARNING: suspicious RCU usage",
            "WARNING: lock held when returning to user space",
        ],
        CrashType::Lockdep,
    )
    .priority(30)
    .formats(LOCKDEP_FORMATS)
    .terminators(END_OF_TASK)
    .min_lines(6),
    RuleDef::new("warning", &["WARNING: CPU: "], CrashType::Warning)
        .priority(20)
        .formats(WARNING_FORMATS)
        .terminators(END_OF_OOPS)
        .min_lines(4),
    RuleDef::new("page-fault", &["BUG: unable to handle"], CrashType::Bug)
        .priority(20)
        .formats(PAGE_FAULT_FORMATS)
        .terminators(END_OF_OOPS)
        .min_lines(4),
    RuleDef::new(
        "gpf",
        &["general protection fault"],
        CrashType::GeneralProtection,
    )
    .priority(20)
    .formats(GPF_FORMATS)
    .terminators(END_OF_OOPS)
    .min_lines(4),
    RuleDef::new("kernel-bug", &["kernel BUG at "], CrashType::Bug)
        .priority(20)
        .formats(KERNEL_BUG_FORMATS)
        .terminators(END_OF_OOPS)
        .min_lines(4),
    RuleDef::new(
        "atomic-sleep",
        &[
            "BUG: sleeping function called from invalid context",
            "BUG: scheduling while atomic",
        ],
        CrashType::AtomicSleep,
    )
    .priority(25)
    .formats(ATOMIC_SLEEP_FORMATS)
    .terminators(END_OF_TASK)
    .min_lines(3),
    RuleDef::new("soft-lockup", &["BUG: soft lockup"], CrashType::Hang)
        .priority(25)
        .formats(SOFT_LOCKUP_FORMATS)
        .terminators(END_OF_TASK)
        .min_lines(3),
    RuleDef::new("workqueue-lockup", &["BUG: workqueue lockup"], CrashType::Hang)
        .priority(25)
        .formats(WORKQUEUE_LOCKUP_FORMATS)
        .blank_line_ends(),
    RuleDef::new("memory-leak", &["BUG: memory leak"], CrashType::MemoryLeak)
        .priority(25)
        .formats(MEMORY_LEAK_FORMATS)
        .blank_line_ends()
        .min_lines(5),
    RuleDef::new("hung-task", &["INFO: task "], CrashType::Hang)
        .priority(20)
        .formats(HUNG_TASK_FORMATS)
        .terminators(&["</TASK>"])
        .blank_line_ends()
        .min_lines(4),
    RuleDef::new("rcu-stall", &["INFO: rcu_", "rcu: INFO: rcu_"], CrashType::Hang)
        .priority(20)
        .formats(RCU_STALL_FORMATS)
        .terminators(&["</TASK>"])
        .min_lines(3),
    RuleDef::new("syzfail", &["SYZFAIL: "], CrashType::SyzFailure)
        .priority(20)
        .formats(SYZFAIL_FORMATS)
        .blank_line_ends()
        .min_lines(1)
        .normalize(normalize_syzfail),
    RuleDef::new("panic", &["Kernel panic - not syncing: "], CrashType::Panic)
        .priority(15)
        .formats(PANIC_FORMATS)
        .terminators(&["Kernel Offset:", "---[ end Kernel panic", "Rebooting in"])
        .min_lines(3)
        .overlap_exempt()
        .normalize(normalize_panic),
    RuleDef::new("oops", &["Oops: ", "Internal error: Oops"], CrashType::Bug)
        .priority(5)
        .formats(OOPS_FORMATS)
        .terminators(END_OF_OOPS)
        .min_lines(4)
        .overlap_exempt(),
    RuleDef::new("bug", &["BUG: "], CrashType::Bug)
        .priority(1)
        .formats(BUG_FORMATS)
        .terminators(END_OF_TASK)
        .normalize(normalize_bug),
];

const STACK_FRAMES: &[&str] = &[
    r"^(?:\[<[0-9a-f]+>\]\s*)?(?P<frame>[A-Za-z0-9_.]+)\+0x[0-9a-f]+/0x[0-9a-f]+",
    r"^(?:\[<[0-9a-f]+>\]\s*)?(?P<frame>[A-Za-z0-9_.]+) (?:[A-Za-z0-9_\-.]+/)*[A-Za-z0-9_\-.]+\.[chS]:\d+",
];

const SKIP_FRAMES: &[&str] = &[
    r"dump_stack(?:_lvl)?",
    r"__dump_stack",
    r"show_stack",
    r"show_trace_log_lvl",
    r"print_address_description.*",
    r"print_report",
    r"(?:__)?kasan_.*",
    r"check_region_inline",
    r"check_memory_region.*",
    r"(?:__)?asan_.*",
    r"__msan_.*",
    r"kmsan_.*",
    r"(?:__)?ubsan_.*",
    r"ubsan_epilogue",
    r"(?:__)?kcsan_.*",
    r"__tsan_.*",
    r"(?:__)?kfence_.*",
    r"panic",
    r"nmi_panic",
    r"__warn",
    r"__warn_printk",
    r"warn_slowpath.*",
    r"report_bug",
    r"handle_bug",
    r"exc_invalid_op",
    r"asm_exc_.*",
    r"do_error_trap",
    r"do_trap",
    r"fixup_bug",
    r"(?:__)?die",
    r"oops_end",
    r"page_fault_oops",
    r"kernelmode_fixup_or_oops",
    r"(?:__)?bad_area_nosemaphore",
    r"do_user_addr_fault",
    r"exc_page_fault",
    r"__schedule",
    r"schedule",
    r"schedule_timeout",
    r"schedule_preempt_disabled",
    r"io_schedule",
    r"__mutex_lock.*",
    r"mutex_lock.*",
    r"rwsem_down_.*",
    r"_*might_sleep",
    r"__might_resched",
    r"__might_fault",
    r"lock_acquire.*",
    r"__lock_acquire",
    r"lockdep_.*",
    r"print_circular_bug.*",
    r"check_noncircular",
    r"check_prev_add",
    r"validate_chain",
    r"(?:__)?kmalloc.*",
    r"kmem_cache_alloc.*",
    r"slab_post_alloc_hook",
    r"kmemleak_alloc.*",
    r"__do_kmalloc_node",
    r"kzalloc",
    r"krealloc",
    r"kvmalloc.*",
    r"__alloc_pages.*",
    r"alloc_pages.*",
    r"_raw_spin_(?:un)?lock.*",
    r"do_raw_spin_lock",
    r"spin_bug",
    r"spin_dump",
    r"rcu_.*",
    r"__rcu_read_(?:un)?lock",
];

const SUPPRESSIONS: &[&str] = &[
    r"INIT: PANIC: segmentation violation!",
    r"Kernel panic - not syncing: Out of memory and no killable processes",
    r"Kernel panic - not syncing: System is deadlocked on memory",
    r"SYZFAIL: failed to recv rpc",
];

const RESETS: &[&str] = &["Linux version ", "SeaBIOS (version", "Booting the kernel"];

fn register_frames(arch: &str) -> &'static [&'static str] {
    match arch {
        target::AMD64 => &[r"^RIP: [0-9a-f]{4}:(?P<frame>[A-Za-z0-9_.]+)\+0x"],
        target::I386 => &[r"^EIP: (?:[0-9a-f]{4}:)?(?P<frame>[A-Za-z0-9_.]+)\+0x"],
        target::ARM64 => &[r"^pc : (?P<frame>[A-Za-z0-9_.]+)\+0x"],
        target::ARM => &[r"^PC is at (?P<frame>[A-Za-z0-9_.]+)\+0x"],
        target::RISCV64 => &[r"^epc : (?P<frame>[A-Za-z0-9_.]+)\+0x"],
        target::PPC64LE => &[r"^NIP \[[0-9a-f]+\] (?P<frame>[A-Za-z0-9_.]+)\+0x"],
        target::S390X => &[r"^Krnl PSW : [0-9a-f]+ [0-9a-f]+ \((?P<frame>[A-Za-z0-9_.]+)\+0x"],
        target::MIPS64LE => &[r"^epc\s*: [0-9a-f]+ (?P<frame>[A-Za-z0-9_.]+)\+0x"],
        _ => &[],
    }
}

pub const RULES: OsRules = OsRules {
    rules: RULES_LIST,
    stack_frames: STACK_FRAMES,
    skip_frames: SKIP_FRAMES,
    suppressions: SUPPRESSIONS,
    resets: RESETS,
    register_frames,
};

fn normalize_panic(title: &str) -> String {
    let title = match title.find(" ]---") {
        Some(idx) => &title[..idx],
        None => title,
    };
    title.trim_end_matches(['!', ' ']).to_string()
}

fn normalize_syzfail(title: &str) -> String {
    match title.find(" (errno") {
        Some(idx) => title[..idx].to_string(),
        None => title.to_string(),
    }
}

/// Generic `BUG:` lines carry CPU numbers, pids and trailing context that
/// differ on every occurrence of the same bug.
fn normalize_bug(title: &str) -> String {
    let mut end = title.len();
    for sep in [",", " [", " pfn:", " at "] {
        if let Some(idx) = title.find(sep) {
            end = end.min(idx);
        }
    }
    let mut out = String::with_capacity(end);
    let mut in_digits = false;
    for c in title[..end].chars() {
        if c.is_ascii_digit() {
            if !in_digits {
                out.push('N');
            }
            in_digits = true;
        } else {
            out.push(c);
            in_digits = false;
        }
    }
    out.trim_end().to_string()
}
