//! Entry point for parsing kernel logs.
//!
//! A [`Reporter`] binds a target's registry to the per-deployment settings
//! (ignored titles, extra suppressions, line cap). Parsing is a pure
//! function of the buffer; the reporter itself is never mutated and can be
//! shared between threads.

use crate::classifier;
use crate::config::ReporterConfig;
use crate::corruption;
use crate::registry::{self, Registry, RegistryError};
use crate::report::Report;
use crate::scanner;
use crate::suppression;
use crate::target::{Target, TargetError};
use regex::{Regex, bytes};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum ReporterError {
    /// The configured target string does not name a known target.
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An `ignores` entry is not a valid regex.
    #[error("invalid ignore pattern {pattern:?}: {source}")]
    InvalidIgnore {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A configured suppression is not a valid regex.
    #[error("invalid suppression pattern {0}")]
    InvalidSuppression(#[source] RegistryError),
}

#[derive(Debug, Clone)]
pub struct Reporter {
    registry: Arc<Registry>,
    ignores: Vec<Regex>,
    suppressions: Vec<bytes::Regex>,
    max_report_lines: usize,
}

impl Reporter {
    pub fn new(target: &Target) -> Result<Self, ReporterError> {
        Self::with_config(target, &ReporterConfig::default())
    }

    /// Builds a reporter honoring `config`. A `target` in the config takes
    /// precedence over `target`.
    pub fn with_config(target: &Target, config: &ReporterConfig) -> Result<Self, ReporterError> {
        let target = match &config.target {
            Some(raw) => Target::parse(raw)?,
            None => target.clone(),
        };
        let registry = Arc::new(Registry::build(&target)?);
        Self::from_registry(registry, config)
    }

    /// Reuses an already built registry, e.g. one shared by several
    /// reporters for the same target. The config's `target` is ignored.
    pub fn from_registry(
        registry: Arc<Registry>,
        config: &ReporterConfig,
    ) -> Result<Self, ReporterError> {
        let ignores = config
            .ignores
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ReporterError::InvalidIgnore {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut suppressions = registry.suppressions().to_vec();
        for pattern in &config.suppressions {
            suppressions.push(
                registry::compile_bytes(pattern).map_err(ReporterError::InvalidSuppression)?,
            );
        }
        Ok(Self {
            registry,
            ignores,
            suppressions,
            max_report_lines: config.max_report_lines.max(1),
        })
    }

    pub fn target(&self) -> &Target {
        self.registry.target()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the earliest report in `buf`.
    pub fn parse<'a>(&self, buf: &'a [u8]) -> Option<Report<'a>> {
        self.parse_from(buf, 0)
    }

    /// Returns the earliest report starting at or after `from`.
    pub fn parse_from<'a>(&self, buf: &'a [u8], from: usize) -> Option<Report<'a>> {
        let mut pos = from;
        while pos < buf.len() {
            let candidate = scanner::find_next(&self.registry, buf, pos, buf.len(), |_| true)?;
            let (mut report, section) =
                classifier::classify(&self.registry, buf, candidate, self.max_report_lines);
            if self.is_ignored(&report.title) {
                trace!(title = %report.title, skip_pos = report.skip_pos, "ignoring report");
                pos = report.skip_pos;
                continue;
            }
            if let Some(reason) = corruption::detect_corruption(&self.registry, &section) {
                report.corrupted = true;
                report.corrupted_reason = reason.to_string();
            }
            report.suppressed = suppression::is_suppressed(&self.suppressions, &report);
            return Some(report);
        }
        None
    }

    /// Cheaper than [`Reporter::parse`] when the report itself is not
    /// needed.
    pub fn contains_crash(&self, buf: &[u8]) -> bool {
        if self.ignores.is_empty() {
            scanner::find_next(&self.registry, buf, 0, buf.len(), |_| true).is_some()
        } else {
            self.parse(buf).is_some()
        }
    }

    /// Whole-buffer suppression check, meaningful when no report was found.
    pub fn is_suppressed(&self, buf: &[u8]) -> bool {
        suppression::buffer_matches_suppression(&self.suppressions, buf)
    }

    fn is_ignored(&self, title: &str) -> bool {
        self.ignores.iter().any(|re| re.is_match(title))
    }
}

/// Every report in `buf`, in ascending start order. Each parse resumes at
/// the previous report's `skip_pos`, so the loop runs at most `buf.len()`
/// times.
pub fn parse_all<'a>(reporter: &Reporter, buf: &'a [u8]) -> Vec<Report<'a>> {
    let mut reports = Vec::new();
    let mut pos = 0;
    while let Some(report) = reporter.parse_from(buf, pos) {
        debug_assert!(report.skip_pos > report.start_pos && report.start_pos >= pos);
        pos = report.skip_pos;
        reports.push(report);
    }
    reports
}

/// Whole-buffer suppression check; see [`Reporter::is_suppressed`].
pub fn is_suppressed(reporter: &Reporter, buf: &[u8]) -> bool {
    reporter.is_suppressed(buf)
}
