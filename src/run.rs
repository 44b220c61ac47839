//! This module is the entry point shared by the binary and the tests.
//!
//! [`main()`] takes the full command line (including the program name) so it can be
//! driven with any argument list.

use std::env;
use std::path::{Path, PathBuf};

// non-std crates
use clap::{parser::ValueSource, ArgMatches};
use log::set_max_level;

// project specific modules/crates
use crate::cli::{get_arg_parser, get_list, parse_ignore, CheckerSelection};
use crate::common_fs::{is_ignored, FileObj};
use crate::error::{Error, Result};
use crate::git::{find_repo_root, get_diff, parse_diff, read_diff_source};
use crate::logger::{self, end_log_group, level_from_verbosity, start_log_group};
use crate::tools::{run_tools, ToolOptions};

/// This is the backend entry point for console applications.
///
/// Returns the process exit code: `0` when everything ran, `1` when anything failed.
/// In `--check` mode, `1` is also returned if a formatter would change something or
/// flake8 reported problems.
pub fn main(args: Vec<String>) -> i32 {
    let arg_parser = get_arg_parser();
    let args = arg_parser.get_matches_from(args);

    // a second init (ie when called repeatedly in one process) keeps the first logger
    logger::init().unwrap_or_default();
    set_max_level(level_from_verbosity(
        args.get_one::<String>("verbosity")
            .map(String::as_str)
            .unwrap_or("info"),
    ));

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err}");
            1
        }
    }
}

/// Lists the changed files that are not ignored.
pub fn select_files(
    diff: &str,
    strip: usize,
    ignored: &[String],
    not_ignored: &[String],
) -> Vec<FileObj> {
    parse_diff(diff, strip)
        .into_iter()
        .filter(|file| !is_ignored(&file.name, ignored, not_ignored))
        .collect()
}

/// How many leading directories to strip from the diff's file names.
///
/// libgit2 always writes `a/` and `b/` prefixes, so a diff from git is stripped once
/// unless `--prefix` is given. A diff read from a file uses `--prefix` (default `0`).
pub fn strip_level(args: &ArgMatches, from_git: bool) -> usize {
    let given = args.value_source("prefix") == Some(ValueSource::CommandLine);
    if from_git && !given {
        1
    } else {
        args.get_one::<usize>("prefix").copied().unwrap_or(0)
    }
}

fn run(args: &ArgMatches) -> Result<i32> {
    let selection = CheckerSelection::from_matches(args);
    if selection.is_empty() {
        log::warn!("no checkers are enabled.");
    }

    let repo_root = args
        .get_one::<String>("repo-root")
        .map(String::as_str)
        .unwrap_or(".");
    let diff_source = args.get_one::<String>("diff");
    let (diff, root) = match diff_source {
        Some(path) => (read_diff_source(path)?, PathBuf::from(repo_root)),
        None => {
            let (repo, root) = find_repo_root(Path::new(repo_root))?;
            let reference = args
                .get_one::<String>("ref")
                .map(String::as_str)
                .unwrap_or("main");
            (get_diff(&repo, reference)?, root)
        }
    };
    if root != Path::new(".") {
        env::set_current_dir(&root).map_err(|source| Error::ChangeDir {
            path: root.clone(),
            source,
        })?;
    }

    let ignore = args
        .get_many::<String>("ignore")
        .map(|vals| vals.map(String::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    let (ignored, not_ignored) = parse_ignore(&ignore, Path::new("."));

    let strip = strip_level(args, diff_source.is_none());
    start_log_group(String::from("Get list of changed files"));
    let files = select_files(&diff, strip, &ignored, &not_ignored);
    if files.is_empty() {
        log::info!("No changed files");
    } else {
        log::info!("Giving attention to the following files:");
        for file in &files {
            log::info!("  ./{}", file.display_name());
        }
    }
    end_log_group();

    let options = ToolOptions {
        cpp_extensions: get_list(args, "cpp-extensions"),
        py_extensions: get_list(args, "py-extensions"),
        clang_version: args
            .get_one::<String>("clang-version")
            .cloned()
            .unwrap_or_default(),
        check: args.get_flag("check"),
    };
    let report = run_tools(&files, &selection, &options, Path::new("."))?;

    if options.check && !report.is_clean() {
        for name in &report.unformatted {
            log::error!("{} needs formatting", name.to_string_lossy());
        }
        for name in &report.lint_failures {
            log::error!("{} has lint problems", name.to_string_lossy());
        }
        return Ok(1);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{select_files, strip_level};
    use crate::cli::get_arg_parser;

    static DIFF: &str = "--- a/src/main.cpp
+++ b/src/main.cpp
@@ -1,0 +2 @@
+int x;
--- a/third_party/lib/vendored.cpp
+++ b/third_party/lib/vendored.cpp
@@ -5 +5 @@
-old
+new
--- a/.github/scripts/ci.py
+++ b/.github/scripts/ci.py
@@ -1 +1,2 @@
-a
+b
+c
";

    #[test]
    fn ignored_files_are_dropped() {
        let ignored = vec![String::from(".github"), String::from("third_party")];
        let files = select_files(DIFF, 1, &ignored, &[]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, PathBuf::from("src/main.cpp"));
        assert_eq!(files[0].added_ranges, vec![2..=2]);
    }

    #[test]
    fn git_diff_strips_one_directory_by_default() {
        let args = get_arg_parser().get_matches_from(["code-quality"]);
        assert_eq!(strip_level(&args, true), 1);
        assert_eq!(strip_level(&args, false), 0);
    }

    #[test]
    fn explicit_prefix_wins() {
        let args = get_arg_parser().get_matches_from(["code-quality", "--prefix", "0"]);
        assert_eq!(strip_level(&args, true), 0);
        let args = get_arg_parser().get_matches_from(["code-quality", "--prefix=2"]);
        assert_eq!(strip_level(&args, false), 2);
    }

    #[test]
    fn not_ignored_wins() {
        let ignored = vec![String::from("third_party")];
        let not_ignored = vec![String::from("third_party/lib")];
        let files = select_files(DIFF, 1, &ignored, &not_ignored);
        assert_eq!(files.len(), 3);
    }
}
