use std::fmt;
use thiserror::Error;

pub const LINUX: &str = "linux";
pub const FREEBSD: &str = "freebsd";
pub const NETBSD: &str = "netbsd";
pub const OPENBSD: &str = "openbsd";
pub const FUCHSIA: &str = "fuchsia";
pub const GVISOR: &str = "gvisor";
pub const DARWIN: &str = "darwin";

pub const AMD64: &str = "amd64";
pub const I386: &str = "386";
pub const ARM64: &str = "arm64";
pub const ARM: &str = "arm";
pub const RISCV64: &str = "riscv64";
pub const PPC64LE: &str = "ppc64le";
pub const S390X: &str = "s390x";
pub const MIPS64LE: &str = "mips64le";

/// Every known operating system with the architectures its logs can come from.
const KNOWN_TARGETS: &[(&str, &[&str])] = &[
    (
        LINUX,
        &[AMD64, I386, ARM64, ARM, RISCV64, PPC64LE, S390X, MIPS64LE],
    ),
    (FREEBSD, &[AMD64, I386, ARM64, RISCV64]),
    (NETBSD, &[AMD64]),
    (OPENBSD, &[AMD64]),
    (FUCHSIA, &[AMD64, ARM64]),
    (GVISOR, &[AMD64, ARM64]),
    (DARWIN, &[AMD64]),
];

/// Errors raised while resolving a target descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// The OS/architecture pair has no pattern registry.
    #[error("unknown target: {os}/{arch} (supported: {supported})")]
    UnknownTarget {
        os: String,
        arch: String,
        supported: String,
    },

    /// The execution architecture cannot run on the given OS.
    #[error("execution arch {arch} is not supported by {os}")]
    UnsupportedExecArch { os: String, arch: String },

    /// A `os/vmarch[/arch]` string had the wrong shape.
    #[error("malformed target string {0:?}, expected os/vmarch[/arch]")]
    Malformed(String),
}

/// Identifies the kernel that produced a log: operating system, the
/// architecture of the machine running it, and the architecture the
/// fuzzing executor was built for (usually the same).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    os: &'static str,
    vm_arch: &'static str,
    arch: &'static str,
}

impl Target {
    /// Resolves an `os`/`vm_arch` pair whose executor runs natively.
    pub fn get(os: &str, vm_arch: &str) -> Result<Self, TargetError> {
        Self::with_exec_arch(os, vm_arch, vm_arch)
    }

    pub fn with_exec_arch(os: &str, vm_arch: &str, arch: &str) -> Result<Self, TargetError> {
        let (os_name, arches) = match KNOWN_TARGETS.iter().find(|(name, _)| *name == os) {
            Some(&(name, arches)) => (name, arches),
            None => return Err(unknown(os, vm_arch)),
        };
        let vm_arch_name = find_arch(arches, vm_arch).ok_or_else(|| unknown(os, vm_arch))?;
        let arch_name =
            find_arch(arches, arch).ok_or_else(|| TargetError::UnsupportedExecArch {
                os: os.to_string(),
                arch: arch.to_string(),
            })?;
        Ok(Self {
            os: os_name,
            vm_arch: vm_arch_name,
            arch: arch_name,
        })
    }

    /// Parses `os/vmarch` or `os/vmarch/arch`. Extra middle components are
    /// ignored; the last one names the executor arch.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let parts: Vec<&str> = raw.split('/').collect();
        match parts.as_slice() {
            [os, vm_arch] => Self::get(os, vm_arch),
            [os, vm_arch, .., arch] => Self::with_exec_arch(os, vm_arch, arch),
            _ => Err(TargetError::Malformed(raw.to_string())),
        }
    }

    pub fn os(&self) -> &'static str {
        self.os
    }

    pub fn vm_arch(&self) -> &'static str {
        self.vm_arch
    }

    pub fn arch(&self) -> &'static str {
        self.arch
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.vm_arch == self.arch {
            write!(f, "{}/{}", self.os, self.vm_arch)
        } else {
            write!(f, "{}/{}/{}", self.os, self.vm_arch, self.arch)
        }
    }
}

fn find_arch(arches: &[&'static str], name: &str) -> Option<&'static str> {
    arches.iter().copied().find(|a| *a == name)
}

fn unknown(os: &str, arch: &str) -> TargetError {
    TargetError::UnknownTarget {
        os: os.to_string(),
        arch: arch.to_string(),
        supported: supported_list().join(", "),
    }
}

/// All `os/arch` pairs, in registry order.
pub fn supported_list() -> Vec<String> {
    KNOWN_TARGETS
        .iter()
        .flat_map(|(os, arches)| arches.iter().map(move |arch| format!("{os}/{arch}")))
        .collect()
}

/// Maps the host architecture onto the names used by target descriptors.
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => AMD64,
        "x86" => I386,
        "aarch64" => ARM64,
        "arm" => ARM,
        "riscv64" => RISCV64,
        "powerpc64" => PPC64LE,
        "s390x" => S390X,
        "mips64" => MIPS64LE,
        other => other_arch(other),
    }
}

fn other_arch(name: &str) -> &'static str {
    // Unmapped hosts fall back to amd64 so the default target still resolves.
    tracing::debug!(host_arch = name, "unmapped host architecture, defaulting to amd64");
    AMD64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_pair() {
        let target = Target::get("linux", "amd64").expect("linux/amd64 must resolve");
        assert_eq!(target.os(), LINUX);
        assert_eq!(target.vm_arch(), AMD64);
        assert_eq!(target.arch(), AMD64);
        assert_eq!(target.to_string(), "linux/amd64");
    }

    #[test]
    fn unknown_os_is_a_construction_error() {
        match Target::get("plan9", "amd64") {
            Err(TargetError::UnknownTarget { os, .. }) => assert_eq!(os, "plan9"),
            other => panic!("Expected UnknownTarget, got {other:?}"),
        }
    }

    #[test]
    fn unknown_arch_for_known_os_is_rejected() {
        assert!(
            Target::get("netbsd", "arm64").is_err(),
            "netbsd has no arm64 registry"
        );
    }

    #[test]
    fn parse_three_part_target_keeps_exec_arch() {
        let target = Target::parse("linux/amd64/386").expect("valid triple");
        assert_eq!(target.vm_arch(), AMD64);
        assert_eq!(target.arch(), I386);
        assert_eq!(target.to_string(), "linux/amd64/386");
    }

    #[test]
    fn parse_rejects_malformed_strings() {
        assert_eq!(
            Target::parse("linux"),
            Err(TargetError::Malformed("linux".to_string()))
        );
        assert!(Target::parse("").is_err());
    }

    #[test]
    fn parse_takes_exec_arch_from_last_component() {
        let target = Target::parse("linux/amd64/v2/386").expect("extra components are tolerated");
        assert_eq!(target.vm_arch(), AMD64);
        assert_eq!(target.arch(), I386);
        assert!(
            Target::parse("linux/amd64/386/extra").is_err(),
            "the last component must still be a known arch"
        );
    }

    #[test]
    fn exec_arch_must_belong_to_os() {
        match Target::with_exec_arch("freebsd", "amd64", "s390x") {
            Err(TargetError::UnsupportedExecArch { arch, .. }) => assert_eq!(arch, "s390x"),
            other => panic!("Expected UnsupportedExecArch, got {other:?}"),
        }
    }

    #[test]
    fn supported_list_covers_every_os() {
        let list = supported_list();
        for os in [LINUX, FREEBSD, NETBSD, OPENBSD, FUCHSIA, GVISOR, DARWIN] {
            assert!(
                list.iter().any(|t| t.starts_with(&format!("{os}/"))),
                "{os} missing from supported list"
            );
        }
    }
}
