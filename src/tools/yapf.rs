//! This module holds functionality specific to running yapf.

use std::process::Command;

// project-specific crates/modules
use super::{line_args, output_of, run_checked};
use crate::common_fs::FileObj;
use crate::error::{Error, Result};

/// Run yapf on a specific `file`, limited to the file's changed lines.
///
/// Without `check`, the file is reformatted in place and `false` is returned.
/// With `check`, yapf only prints the diff it would apply; `true` is returned if that
/// diff is not empty.
pub fn run_yapf(cmd: &mut Command, file: &FileObj, check: bool) -> Result<bool> {
    cmd.arg(file.name.as_os_str());
    cmd.arg(if check { "--diff" } else { "-i" });
    cmd.args(line_args(&file.added_ranges, '-'));
    if !check {
        run_checked(cmd, file)?;
        return Ok(false);
    }

    let output = output_of(cmd)?;
    if output.status.success() {
        return Ok(false);
    }
    // yapf exits non-zero when `--diff` finds something to change
    if output.stdout.is_empty() {
        log::debug!(
            "yapf reported errors:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
        return Err(Error::ToolFailed {
            program: cmd.get_program().to_string_lossy().into_owned(),
            file: file.name.clone(),
            status: output.status,
        });
    }
    log::warn!(
        "yapf would reformat {}:\n{}",
        file.display_name(),
        String::from_utf8_lossy(&output.stdout)
    );
    Ok(true)
}
