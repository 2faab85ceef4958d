use kcrash_core::{CrashType, ExecutorInfo, Report};
use serde::Serialize;
use std::borrow::Cow;
use std::io::{self, Write};

pub const NO_REPORTS: &str = "no crash reports found in log";
pub const SUPPRESSED_NOTE: &str = "note: log matched suppression patterns for this target";

#[derive(Serialize, Debug)]
struct SerializedReport<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "no_alts")]
    alt_titles: &'a [String],
    #[serde(rename = "type")]
    crash_type: CrashType,
    #[serde(skip_serializing_if = "blank")]
    frame: &'a str,
    start_pos: usize,
    end_pos: usize,
    skip_pos: usize,
    suppressed: bool,
    corrupted: bool,
    #[serde(skip_serializing_if = "blank")]
    corrupted_reason: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    executor: Option<ExecutorInfo>,
    report: Cow<'a, str>,
}

impl<'a> From<&'a Report<'a>> for SerializedReport<'a> {
    fn from(report: &'a Report<'a>) -> Self {
        Self {
            title: &report.title,
            alt_titles: &report.alt_titles,
            crash_type: report.crash_type,
            frame: &report.frame,
            start_pos: report.start_pos,
            end_pos: report.end_pos,
            skip_pos: report.skip_pos,
            suppressed: report.suppressed,
            corrupted: report.corrupted,
            corrupted_reason: &report.corrupted_reason,
            executor: report.executor,
            report: report.body_text(),
        }
    }
}

fn no_alts(alts: &&[String]) -> bool {
    alts.is_empty()
}

fn blank(text: &&str) -> bool {
    text.is_empty()
}

/// JSON array with two-space indentation and a trailing newline.
pub fn write_json<W: Write>(out: &mut W, reports: &[Report<'_>]) -> anyhow::Result<()> {
    let serialized: Vec<SerializedReport<'_>> = reports.iter().map(SerializedReport::from).collect();
    let text = serde_json::to_string_pretty(&serialized)?;
    out.write_all(html_escape(&text).as_bytes())?;
    writeln!(out)?;
    Ok(())
}

/// Escapes `<`, `>`, `&`, U+2028 and U+2029 as `\uXXXX`, the way Go's
/// `encoding/json` does by default. None of them is structural JSON, so
/// they can only occur inside strings.
fn html_escape(json: &str) -> Cow<'_, str> {
    if !json.contains(['<', '>', '&', '\u{2028}', '\u{2029}']) {
        return Cow::Borrowed(json);
    }
    let mut escaped = String::with_capacity(json.len() + 16);
    for c in json.chars() {
        match c {
            '<' | '>' | '&' | '\u{2028}' | '\u{2029}' => {
                escaped.push_str(&format!("\\u{:04x}", c as u32));
            }
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

pub fn write_human<W: Write>(out: &mut W, reports: &[Report<'_>]) -> io::Result<()> {
    for (idx, report) in reports.iter().enumerate() {
        writeln!(out, "Crash #{}", idx + 1)?;
        writeln!(out, "Title: {}", report.title)?;
        writeln!(out, "Type: {}", report.crash_type)?;
        if !report.alt_titles.is_empty() {
            writeln!(out, "Alt titles: {}", report.alt_titles.join(", "))?;
        }
        if !report.frame.is_empty() {
            writeln!(out, "Frame: {}", report.frame)?;
        }
        writeln!(
            out,
            "Range: [{}, {}], next {}",
            report.start_pos, report.end_pos, report.skip_pos
        )?;
        writeln!(out, "Suppressed: {}", report.suppressed)?;
        write!(out, "Corrupted: {}", report.corrupted)?;
        if !report.corrupted_reason.is_empty() {
            write!(out, " ({})", report.corrupted_reason)?;
        }
        write!(out, "\n\n")?;
        if report.body.is_empty() {
            writeln!(out, "(empty report body)")?;
        } else {
            out.write_all(report.body)?;
            if !report.body.ends_with(b"\n") {
                writeln!(out)?;
            }
        }
        if idx + 1 < reports.len() {
            write!(out, "\n---\n\n")?;
        }
    }
    Ok(())
}

pub fn write_empty<W: Write>(out: &mut W, json: bool, suppressed: bool) -> io::Result<()> {
    if json {
        return writeln!(out, "[]");
    }
    writeln!(out, "{NO_REPORTS}")?;
    if suppressed {
        writeln!(out, "{SUPPRESSED_NOTE}")?;
    }
    Ok(())
}
