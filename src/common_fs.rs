//! A module to hold all common file system functionality.

use std::fs;
use std::io::Read;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

// project specific modules/crates
use crate::error::{Error, Result};

/// A structure to represent a file's path and line changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileObj {
    /// The path to the file, relative to the repository root.
    pub name: PathBuf,

    /// The list of ranges (1-based, inclusive) that span lines with additions.
    pub added_ranges: Vec<RangeInclusive<u32>>,
}

impl FileObj {
    /// Instantiate an object with file name and changed lines information.
    pub fn from(name: PathBuf, added_ranges: Vec<RangeInclusive<u32>>) -> Self {
        FileObj { name, added_ranges }
    }

    /// The file's path using `/` as separator, for log output.
    pub fn display_name(&self) -> String {
        self.name.to_string_lossy().replace('\\', "/")
    }
}

/// Does the `file_name` use one of the listed `extensions`?
///
/// Extensions are given without the leading dot and compared case-sensitively, so
/// `h` and `H` are distinct.
pub fn has_extension(file_name: &Path, extensions: &[String]) -> bool {
    match file_name.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy();
            extensions.iter().any(|e| e.as_str() == ext)
        }
        None => false,
    }
}

/// Describes if a specified `file_name` is contained within the given `set` of paths.
///
/// The `set` of paths is used as domains, so the specified `file_name` can be a direct
/// or distant descendant of any given paths in the `set`. An empty entry stands for
/// the repository root.
pub fn is_file_in_list(file_name: &Path, set: &[String], prompt: &str) -> bool {
    for pattern in set {
        if pattern.is_empty() || file_name.starts_with(Path::new(pattern)) {
            log::debug!(
                "{} is {prompt} as specified via {:?}",
                file_name.to_string_lossy().replace('\\', "/"),
                if pattern.is_empty() { "./" } else { pattern }
            );
            return true;
        }
    }
    false
}

/// Should the file at `entry` be skipped?
///
/// An entry in the `not_ignored` list supersedes any domain in the `ignored` list.
pub fn is_ignored(entry: &Path, ignored: &[String], not_ignored: &[String]) -> bool {
    is_file_in_list(entry, ignored, "ignored")
        && !is_file_in_list(entry, not_ignored, "not ignored")
}

/// Gets the line and column number from a given `offset` (of bytes) for given
/// `file_path`.
///
/// This computes the line and column numbers from a buffer of bytes read from the
/// `file_path`. In non-UTF-8 encoded files, this does not guarantee that a word
/// boundary exists at the returned column number. However, the `offset` given to this
/// function is expected to originate from replacements reported by clang-format.
pub fn get_line_cols_from_offset(file_path: &Path, offset: usize) -> Result<(usize, usize)> {
    let read_err = |source| Error::Read {
        path: file_path.to_path_buf(),
        source,
    };
    let mut file_buf = vec![0; offset];
    fs::File::open(file_path)
        .and_then(|mut file| file.read_exact(&mut file_buf))
        .map_err(read_err)?;
    let lines = file_buf.split(|byte| byte == &b'\n');
    let line_count = lines.clone().count();
    let column_count = lines.last().unwrap_or(&[]).len() + 1; // +1 because not a 0 based count
    Ok((line_count, column_count))
}
