//! Per-target pattern registry.
//!
//! A [`Registry`] is built once for a [`Target`] and never mutated
//! afterwards, so it can be wrapped in an `Arc` and read from any number of
//! threads. It owns every compiled regex the scanner and classifier use;
//! nothing is compiled on the parse path.

use crate::rule::{CompiledFormat, CompiledRule};
use crate::rules::{self, OsRules};
use crate::target::Target;
use aho_corasick::{AhoCorasick, MatchKind};
use regex::{Regex, bytes};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// A rule, frame, or suppression pattern failed to compile.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The anchor prefilter could not be built.
    #[error("failed to build anchor index: {0}")]
    AnchorIndex(String),

    /// The target's OS has no rule table.
    #[error("no crash rules registered for {0}")]
    EmptyRegistry(String),
}

/// Regexes applied to every title after template expansion.
#[derive(Debug)]
pub(crate) struct TitleCleanup {
    pub(crate) offsets: Regex,
    pub(crate) addresses: Regex,
    pub(crate) executors: Regex,
    pub(crate) whitespace: Regex,
}

#[derive(Debug)]
pub struct Registry {
    target: Target,
    rules: Vec<CompiledRule>,
    anchors: AhoCorasick,
    console_prefix: bytes::Regex,
    executor: Regex,
    register_frames: Vec<Regex>,
    stack_frames: Vec<Regex>,
    skip_frames: Regex,
    suppressions: Vec<bytes::Regex>,
    resets: &'static [&'static str],
    pub(crate) cleanup: TitleCleanup,
}

impl Registry {
    pub fn build(target: &Target) -> Result<Self, RegistryError> {
        let os_rules: &OsRules = rules::for_os(target.os())
            .ok_or_else(|| RegistryError::EmptyRegistry(target.to_string()))?;
        if os_rules.rules.is_empty() {
            return Err(RegistryError::EmptyRegistry(target.to_string()));
        }

        let mut compiled = Vec::with_capacity(os_rules.rules.len());
        let mut anchor_list: Vec<&'static str> = Vec::new();
        for def in os_rules.rules {
            let formats = def
                .formats
                .iter()
                .map(|format| {
                    Ok(CompiledFormat {
                        regex: compile(format.pattern)?,
                        template: format.template,
                        alts: format.alts,
                        crash_type: format.crash_type.unwrap_or(def.crash_type),
                    })
                })
                .collect::<Result<Vec<_>, RegistryError>>()?;
            for anchor in def.anchors {
                if !anchor_list.contains(anchor) {
                    anchor_list.push(*anchor);
                }
            }
            compiled.push(CompiledRule { def: *def, formats });
        }

        let anchors = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(&anchor_list)
            .map_err(|e| RegistryError::AnchorIndex(e.to_string()))?;

        let register_frames = (os_rules.register_frames)(target.vm_arch())
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        let stack_frames = os_rules
            .stack_frames
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        let skip_frames = compile(&format!("^(?:{})$", os_rules.skip_frames.join("|")))?;

        let suppressions = rules::COMMON_SUPPRESSIONS
            .iter()
            .chain(os_rules.suppressions)
            .map(|p| compile_bytes(p))
            .collect::<Result<Vec<_>, _>>()?;

        let registry = Self {
            target: target.clone(),
            rules: compiled,
            anchors,
            console_prefix: compile_bytes(rules::CONSOLE_PREFIX)?,
            executor: compile(rules::EXECUTOR_PATTERN)?,
            register_frames,
            stack_frames,
            skip_frames,
            suppressions,
            resets: os_rules.resets,
            cleanup: TitleCleanup {
                offsets: compile(r"\+0x[0-9a-f]+(?:/0x[0-9a-f]+)?")?,
                addresses: compile(r"\b(?:0x)?[0-9a-f]{8,}\b")?,
                executors: compile(r"\b(?P<name>syz-executor|syz)\.?[0-9]+(?:\.[0-9]+)?\b")?,
                whitespace: compile(r"\s+")?,
            },
        };
        debug!(
            kernel = %registry.target,
            rules = registry.rules.len(),
            anchors = anchor_list.len(),
            suppressions = registry.suppressions.len(),
            "built pattern registry"
        );
        Ok(registry)
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Rules in declaration order; indices are stable for the registry's
    /// lifetime.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn rule(&self, idx: usize) -> &CompiledRule {
        &self.rules[idx]
    }

    pub(crate) fn anchors(&self) -> &AhoCorasick {
        &self.anchors
    }

    /// Length of the console decoration at the start of `line`.
    pub fn console_prefix_len(&self, line: &[u8]) -> usize {
        self.console_prefix.find(line).map_or(0, |m| m.end())
    }

    pub(crate) fn executor(&self) -> &Regex {
        &self.executor
    }

    /// Register-dump patterns for the VM architecture, then call-trace
    /// patterns for the OS.
    pub(crate) fn frame_patterns(&self) -> (&[Regex], &[Regex]) {
        (&self.register_frames, &self.stack_frames)
    }

    pub fn is_skipped_frame(&self, frame: &str) -> bool {
        self.skip_frames.is_match(frame)
    }

    pub fn suppressions(&self) -> &[bytes::Regex] {
        &self.suppressions
    }

    pub fn is_reset(&self, content: &[u8]) -> bool {
        self.resets.iter().any(|r| content.starts_with(r.as_bytes()))
    }
}

fn compile(pattern: &str) -> Result<Regex, RegistryError> {
    Regex::new(pattern).map_err(|source| RegistryError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

pub(crate) fn compile_bytes(pattern: &str) -> Result<bytes::Regex, RegistryError> {
    bytes::Regex::new(pattern).map_err(|source| RegistryError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
