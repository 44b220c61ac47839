//! This module holds functionality specific to running flake8 and parsing it's
//! output.

use std::process::Command;
use std::sync::OnceLock;

// non-std crates
use regex::Regex;

// project-specific modules/crates
use super::output_of;
use crate::common_fs::FileObj;
use crate::error::Result;

/// A single problem reported by flake8.
#[derive(Debug, PartialEq, Eq)]
pub struct LintNotification {
    /// The file's path as flake8 printed it.
    pub filename: String,

    /// The line number from which the notification originated.
    pub line: u32,

    /// The column offset on the line from which the notification originated.
    pub cols: u32,

    /// The error code, like `E501` or `F401`.
    pub code: String,

    /// A message explaining the problem.
    pub message: String,
}

/// The outcome of linting one file.
#[derive(Debug, Default)]
pub struct LintResult {
    /// Did flake8 exit successfully?
    pub passed: bool,

    /// The parsed notifications.
    pub notifications: Vec<LintNotification>,
}

fn note_header() -> &'static Regex {
    static NOTE_HEADER: OnceLock<Regex> = OnceLock::new();
    NOTE_HEADER.get_or_init(|| {
        Regex::new(r"^(.+):(\d+):(\d+):\s(\w+)\s(.*)$").expect("valid flake8 note pattern")
    })
}

/// Parses flake8's default output format (`path:row:col: CODE message`).
///
/// Lines that do not look like a notification are skipped.
pub fn parse_flake8_output(stdout: &str) -> Vec<LintNotification> {
    let mut notifications = Vec::new();
    for line in stdout.lines() {
        let Some(captures) = note_header().captures(line) else {
            if !line.trim().is_empty() {
                log::debug!("Unrecognized flake8 output: {line}");
            }
            continue;
        };
        let (Ok(line_number), Ok(cols)) =
            (captures[2].parse::<u32>(), captures[3].parse::<u32>())
        else {
            continue;
        };
        notifications.push(LintNotification {
            filename: captures[1].to_string(),
            line: line_number,
            cols,
            code: captures[4].to_string(),
            message: captures[5].to_string(),
        });
    }
    notifications
}

/// Run flake8 on a specific `file`.
///
/// The whole file is checked, not only its changed lines. A non-zero exit status is
/// reported in the returned [`LintResult`] rather than as an error.
pub fn run_flake8(cmd: &mut Command, file: &FileObj) -> Result<LintResult> {
    cmd.arg(file.name.as_os_str());
    let output = output_of(cmd)?;
    let notifications = parse_flake8_output(&String::from_utf8_lossy(&output.stdout));
    for note in &notifications {
        let changed = file
            .added_ranges
            .iter()
            .any(|range| range.contains(&note.line));
        log::warn!(
            "{}:{}:{}: {} {}{}",
            note.filename,
            note.line,
            note.cols,
            note.code,
            note.message,
            if changed { " (changed line)" } else { "" }
        );
    }
    if !output.status.success() {
        if notifications.is_empty() {
            log::warn!(
                "flake8 failed on {} ({}):\n{}",
                file.display_name(),
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        } else {
            log::warn!(
                "flake8 reported {} problem(s) in {}",
                notifications.len(),
                file.display_name()
            );
        }
    }
    Ok(LintResult {
        passed: output.status.success(),
        notifications,
    })
}
