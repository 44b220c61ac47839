//! This crate holds the functionality related to running the external formatters and
//! linters on the changed files.

use std::{
    env::current_dir,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Output},
};

// non-std crates
use semver::Version;
use which::{which, which_in};

// project-specific modules/crates
use crate::cli::CheckerSelection;
use crate::common_fs::{has_extension, FileObj};
use crate::error::{Error, Result};
use crate::logger::{end_log_group, start_log_group};
pub mod clang_format;
use clang_format::run_clang_format;
pub mod flake8;
use flake8::run_flake8;
pub mod yapf;
use yapf::run_yapf;

/// Fetch the path to a tool by `name` (ie `"yapf"` or `"clang-format"`) and
/// `version`.
///
/// The specified `version` can be either
///
/// - blank, to use whatever `name` resolves to on `$PATH`
/// - a full or partial semantic version specification
/// - a path to a directory containing the executable binary `name`d
///
/// If the executable is not found using the specified semantic `version`, then the
/// tool is sought only by it's `name`. A `name` containing a path separator is used
/// as a path to the executable.
pub fn get_tool_exe(name: &str, version: &str) -> Result<PathBuf> {
    let not_found = |reason| Error::ToolNotFound {
        name: name.to_string(),
        reason,
    };
    if version.is_empty() {
        return which(name).map_err(|_| not_found("not found on PATH"));
    }
    if let Ok(semver) = lenient_semver::parse_into::<Version>(version) {
        // `version` specified has at least a major version number
        if let Ok(cmd) = which(format!("{}-{}", name, semver.major)) {
            Ok(cmd)
        } else {
            // Windows installs typically do not append the major version to the
            // executable's name; assume the one on PATH is the right one.
            which(name).map_err(|_| not_found("not found by name and version"))
        }
    } else {
        // `version` specified is not a semantic version; treat as path/to/bin
        which_in(name, Some(version), current_dir().unwrap_or_default())
            .map_err(|_| not_found("not found in the given directory"))
    }
}

/// Renders `--lines` arguments for the given ranges, joining the first and last line
/// of each range with `separator`.
pub fn line_args(ranges: &[RangeInclusive<u32>], separator: char) -> Vec<String> {
    ranges
        .iter()
        .map(|range| format!("--lines={}{separator}{}", range.start(), range.end()))
        .collect()
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

fn log_command(cmd: &Command) {
    log::info!(
        "Running \"{} {}\"",
        program_name(cmd),
        cmd.get_args()
            .map(|x| x.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );
}

/// Runs `cmd` with inherited stdio and returns its exit status.
fn status_of(cmd: &mut Command) -> Result<ExitStatus> {
    log_command(cmd);
    cmd.status().map_err(|source| Error::Spawn {
        program: program_name(cmd),
        source,
    })
}

/// Runs `cmd` capturing stdout and stderr.
fn output_of(cmd: &mut Command) -> Result<Output> {
    log_command(cmd);
    cmd.output().map_err(|source| Error::Spawn {
        program: program_name(cmd),
        source,
    })
}

/// Runs `cmd` with inherited stdio and fails unless it exits successfully.
fn run_checked(cmd: &mut Command, file: &FileObj) -> Result<()> {
    let status = status_of(cmd)?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::ToolFailed {
            program: program_name(cmd),
            file: file.name.clone(),
            status,
        })
    }
}

/// Options that shape how the selected tools are invoked.
#[derive(Debug, Clone)]
pub struct ToolOptions {
    /// Extensions (without dot) of files handed to clang-format.
    pub cpp_extensions: Vec<String>,

    /// Extensions (without dot) of files handed to yapf and flake8.
    pub py_extensions: Vec<String>,

    /// Desired clang-format version, or a directory holding it. Blank for the default.
    pub clang_version: String,

    /// Report instead of modifying files.
    pub check: bool,
}

/// What the tools found, per file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ToolsReport {
    /// Files a formatter would change (only filled in check mode).
    pub unformatted: Vec<PathBuf>,

    /// Files flake8 complained about.
    pub lint_failures: Vec<PathBuf>,
}

impl ToolsReport {
    pub fn is_clean(&self) -> bool {
        self.unformatted.is_empty() && self.lint_failures.is_empty()
    }
}

/// Resolves the executable for `cmd` unless no file needs it.
fn resolve_for(files: &[&FileObj], cmd: &str, version: &str) -> Result<Option<PathBuf>> {
    if files.is_empty() {
        log::debug!("No changed files for {cmd}");
        return Ok(None);
    }
    let exe = get_tool_exe(cmd, version)?;
    log::debug!("Using {}", exe.to_string_lossy());
    Ok(Some(exe))
}

fn select<'a>(files: &'a [FileObj], extensions: &[String]) -> Vec<&'a FileObj> {
    files
        .iter()
        .filter(|file| has_extension(&file.name, extensions))
        .collect()
}

/// Runs clang-format, yapf and flake8 (in that order) on the changed files.
///
/// Each tool only sees files with an extension of its language, one process per
/// file, with `root` as the working directory. Formatter failures stop the run.
/// flake8 results are collected into the returned [`ToolsReport`].
pub fn run_tools(
    files: &[FileObj],
    selection: &CheckerSelection,
    options: &ToolOptions,
    root: &Path,
) -> Result<ToolsReport> {
    let mut report = ToolsReport::default();
    let cpp_files = select(files, &options.cpp_extensions);
    let py_files = select(files, &options.py_extensions);

    if let Some(cmd) = &selection.clang_format {
        if let Some(exe) = resolve_for(&cpp_files, cmd, &options.clang_version)? {
            start_log_group(String::from("clang-format"));
            for file in &cpp_files {
                let mut command = Command::new(&exe);
                command.current_dir(root);
                let advice = run_clang_format(&mut command, file, root, options.check)?;
                if !advice.replacements.is_empty() {
                    report.unformatted.push(file.name.clone());
                }
            }
            end_log_group();
        }
    }
    if let Some(cmd) = &selection.yapf {
        if let Some(exe) = resolve_for(&py_files, cmd, "")? {
            start_log_group(String::from("yapf"));
            for file in &py_files {
                let mut command = Command::new(&exe);
                command.current_dir(root);
                if run_yapf(&mut command, file, options.check)?
                    && !report.unformatted.contains(&file.name)
                {
                    report.unformatted.push(file.name.clone());
                }
            }
            end_log_group();
        }
    }
    if let Some(cmd) = &selection.flake8 {
        if let Some(exe) = resolve_for(&py_files, cmd, "")? {
            start_log_group(String::from("flake8"));
            for file in &py_files {
                let mut command = Command::new(&exe);
                command.current_dir(root);
                let notes = run_flake8(&mut command, file)?;
                if !notes.passed {
                    report.lint_failures.push(file.name.clone());
                }
            }
            end_log_group();
        }
    }
    Ok(report)
}
