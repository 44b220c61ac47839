//! This module holds functionality specific to running clang-format and parsing it's
//! output.

use std::path::Path;
use std::process::Command;

// non-std crates
use serde::Deserialize;
use serde_xml_rs::de::Deserializer;

// project-specific crates/modules
use super::{line_args, output_of, run_checked};
use crate::common_fs::{get_line_cols_from_offset, FileObj};
use crate::error::{Error, Result};

/// A Structure used to deserialize clang-format's XML output.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename = "replacements")]
pub struct FormatAdvice {
    /// A list of [`Replacement`]s that clang-format wants to make.
    #[serde(rename = "$value", default)]
    pub replacements: Vec<Replacement>,
}

/// A single replacement that clang-format wants to make.
#[derive(Debug, Deserialize, PartialEq)]
pub struct Replacement {
    /// The byte offset where the replacement will start.
    pub offset: usize,

    /// The amount of bytes that will be removed.
    pub length: usize,

    /// The bytes (UTF-8 encoded) that will be added at the [`Replacement::offset`] position.
    #[serde(rename = "$value")]
    pub value: Option<String>,

    /// The line number described by the [`Replacement::offset`].
    ///
    /// This value is not provided by the XML output, but we calculate it after
    /// deserialization.
    pub line: Option<usize>,

    /// The column number on the line described by the [`Replacement::offset`].
    ///
    /// This value is not provided by the XML output, but we calculate it after
    /// deserialization.
    pub cols: Option<usize>,
}

/// Deserializes the `--output-replacements-xml` output.
pub fn parse_replacements(xml_out: &str) -> Result<FormatAdvice> {
    if xml_out.trim().is_empty() {
        return Ok(FormatAdvice {
            replacements: vec![],
        });
    }
    // whitespace is part of the elements' body, so the LFs between elements go first
    let xml = xml_out.lines().collect::<Vec<&str>>().join("");
    let config = serde_xml_rs::ParserConfig::new()
        .trim_whitespace(false)
        .whitespace_to_characters(true)
        .ignore_root_level_whitespace(true);
    let event_reader = serde_xml_rs::EventReader::new_with_config(xml.as_bytes(), config);
    Ok(FormatAdvice::deserialize(&mut Deserializer::new(
        event_reader,
    ))?)
}

/// Run clang-format on a specific `file`, limited to the file's changed lines.
///
/// Without `check`, the file is reformatted in place and no advice is returned.
/// With `check`, nothing is modified; the replacements clang-format would make are
/// logged and returned with their line and column (in the file under `root`).
pub fn run_clang_format(
    cmd: &mut Command,
    file: &FileObj,
    root: &Path,
    check: bool,
) -> Result<FormatAdvice> {
    cmd.arg(file.name.as_os_str());
    cmd.arg(if check {
        "--output-replacements-xml"
    } else {
        "-i"
    });
    cmd.args(line_args(&file.added_ranges, ':'));
    if !check {
        run_checked(cmd, file)?;
        return Ok(FormatAdvice {
            replacements: vec![],
        });
    }

    let output = output_of(cmd)?;
    if !output.status.success() {
        log::debug!(
            "clang-format reported errors:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
        return Err(Error::ToolFailed {
            program: cmd.get_program().to_string_lossy().into_owned(),
            file: file.name.clone(),
            status: output.status,
        });
    }
    let mut format_advice = parse_replacements(&String::from_utf8_lossy(&output.stdout))?;
    let source = root.join(&file.name);
    for replacement in &mut format_advice.replacements {
        let (line_number, columns) = get_line_cols_from_offset(&source, replacement.offset)?;
        replacement.line = Some(line_number);
        replacement.cols = Some(columns);
        log::warn!(
            "{}:{line_number}:{columns}: clang-format would replace {} byte(s)",
            file.display_name(),
            replacement.length
        );
    }
    Ok(format_advice)
}
