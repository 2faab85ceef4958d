//! Pattern rule definitions.
//!
//! Rules are plain data: the scanner and classifier never branch on a
//! particular target, they only interpret these tables. The registry
//! compiles every [`RuleDef`] into a [`CompiledRule`] once per target.

use crate::report::CrashType;
use regex::Regex;

/// Placeholder in title templates replaced by the extracted frame.
pub const FRAME_PLACEHOLDER: &str = "{FRAME}";

/// Custom title post-processing for rules whose titles carry noise that
/// cannot be stripped generically.
pub type TitleNormalizer = fn(&str) -> String;

/// One way of turning a report section into a title.
#[derive(Debug, Clone, Copy)]
pub struct TitleFormat {
    /// Regex matched against the cleaned section text (console prefixes
    /// stripped, one line per `\n`). A capture named `frame` supplies the
    /// report frame directly.
    pub pattern: &'static str,
    /// Title template; `$name`/`${name}` expand captures and
    /// [`FRAME_PLACEHOLDER`] expands the frame.
    pub template: &'static str,
    /// Alternate titles rendered from the same captures.
    pub alts: &'static [&'static str],
    /// Overrides the rule's crash type when this format wins.
    pub crash_type: Option<CrashType>,
}

impl TitleFormat {
    pub const fn new(pattern: &'static str, template: &'static str) -> Self {
        Self {
            pattern,
            template,
            alts: &[],
            crash_type: None,
        }
    }

    pub const fn with_alts(mut self, alts: &'static [&'static str]) -> Self {
        self.alts = alts;
        self
    }

    pub const fn typed(mut self, crash_type: CrashType) -> Self {
        self.crash_type = Some(crash_type);
        self
    }
}

/// A named crash-section recognizer.
#[derive(Debug, Clone, Copy)]
pub struct RuleDef {
    pub name: &'static str,
    /// Literal markers that open a section when found at the start of a
    /// line (after the console prefix).
    pub anchors: &'static [&'static str],
    pub crash_type: CrashType,
    /// Higher wins when several rules match the same line.
    pub priority: u8,
    /// Tried in order; the first match produces the title.
    pub formats: &'static [TitleFormat],
    /// Lines containing one of these close the section (inclusive).
    pub terminators: &'static [&'static str],
    /// A blank line closes the section (exclusive).
    pub blank_line_ends: bool,
    /// Fewer lines than this, cut off at end of buffer, means truncation.
    pub min_lines: usize,
    /// Markers of this rule inside another report are a normal
    /// continuation, not an interleaved second crash.
    pub overlap_exempt: bool,
    pub normalize: Option<TitleNormalizer>,
}

impl RuleDef {
    pub const fn new(
        name: &'static str,
        anchors: &'static [&'static str],
        crash_type: CrashType,
    ) -> Self {
        Self {
            name,
            anchors,
            crash_type,
            priority: 10,
            formats: &[],
            terminators: &[],
            blank_line_ends: false,
            min_lines: 2,
            overlap_exempt: false,
            normalize: None,
        }
    }

    pub const fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub const fn formats(mut self, formats: &'static [TitleFormat]) -> Self {
        self.formats = formats;
        self
    }

    pub const fn terminators(mut self, terminators: &'static [&'static str]) -> Self {
        self.terminators = terminators;
        self
    }

    pub const fn blank_line_ends(mut self) -> Self {
        self.blank_line_ends = true;
        self
    }

    pub const fn min_lines(mut self, min_lines: usize) -> Self {
        self.min_lines = min_lines;
        self
    }

    pub const fn overlap_exempt(mut self) -> Self {
        self.overlap_exempt = true;
        self
    }

    pub const fn normalize(mut self, normalize: TitleNormalizer) -> Self {
        self.normalize = Some(normalize);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompiledFormat {
    pub regex: Regex,
    pub template: &'static str,
    pub alts: &'static [&'static str],
    pub crash_type: CrashType,
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub def: RuleDef,
    pub formats: Vec<CompiledFormat>,
}

impl CompiledRule {
    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn is_terminator(&self, line: &str) -> bool {
        self.def.terminators.iter().any(|t| line.contains(t))
    }
}
