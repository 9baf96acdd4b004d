//! Line classifier for clang-style analyzer output.
//!
//! Each line of combined stdout/stderr is either a positioned diagnostic
//! (`C:/path/file.cpp:LINE:COL: message`), a command-level error (an
//! `error:` line without a location) or noise. Classification is pure and
//! never fails; anything unrecognized is noise.

use crate::models::Severity;
use crate::path;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([A-Z]:[\\/].*?):([0-9]+):([0-9]+)(:.*)").expect("valid diagnostic regex")
});

static WARNING_FLAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(.*\[)(-W)(.*\])").expect("valid warning flag regex"));

static COMMAND_ERROR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)error:").expect("valid command error regex"));

/// A diagnostic tied to a source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDiagnostic {
    /// Normalized source path.
    pub file_path: String,
    pub line: u64,
    pub column: u64,
    /// Display text `<path>(<line>,<column>) <tail>`, also the dedup key.
    pub message: String,
    pub severity: Severity,
}

/// Result of classifying one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Diagnostic(ParsedDiagnostic),
    /// `[<profile>] <line>`
    CommandError(String),
    Noise,
}

/// Classify one line of analyzer output produced under `profile`.
///
/// A line shaped like a positioned diagnostic is never a command error: when
/// its line number is 0 or a number does not fit in `u64`, it is noise.
pub fn parse_line(line: &str, profile: &str) -> ParsedLine {
    if let Some(caps) = LINE_RE.captures(line) {
        return match parse_positioned(&caps) {
            Some(diag) => ParsedLine::Diagnostic(diag),
            None => ParsedLine::Noise,
        };
    }
    if COMMAND_ERROR_RE.is_match(line) {
        return ParsedLine::CommandError(format!("[{}] {}", profile, line.trim_end()));
    }
    ParsedLine::Noise
}

fn parse_positioned(caps: &Captures<'_>) -> Option<ParsedDiagnostic> {
    let line_no: u64 = caps[2].parse().ok()?;
    let column_no: u64 = caps[3].parse().ok()?;
    if line_no == 0 {
        return None;
    }
    let file_path = path::normalize(&caps[1]);
    let tail = caps[4].trim_end();
    let mut message = format!("{}({},{}) {}", file_path, line_no, column_no, tail);
    let severity = if message.contains("error:") {
        Severity::Error
    } else {
        Severity::Warning
    };
    if severity == Severity::Warning {
        message = rewrite_warning_flag(&message);
    }
    Some(ParsedDiagnostic {
        file_path,
        line: line_no,
        column: column_no,
        message,
        severity,
    })
}

/// Turn a trailing `[-Wflag]` into `[Disable with -Wno-flag]`.
pub fn rewrite_warning_flag(message: &str) -> String {
    match WARNING_FLAG_RE.captures(message) {
        Some(caps) => format!("{}Disable with -Wno-{}", &caps[1], &caps[3]),
        None => message.to_string(),
    }
}

/// Fold `\r\r\n`, `\r\n` and stray `\r` into `\n`.
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\r\n", "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}
