//! This module is primarily used to get and parse diffs.
//!
//! The diff is produced by libgit2 as unified patch text with zero context lines,
//! the same thing `git diff -U0 --no-color <merge-base>` prints. Parsing works on
//! that text so a diff given on the command line (`--diff`) is handled identically.

use std::fs;
use std::io::{self, Read};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// non-std crates
use git2::{Diff, DiffFormat, DiffOptions, Repository};
use regex::Regex;

// project specific modules/crates
use crate::common_fs::FileObj;
use crate::error::{Error, Result};

/// Finds the repository that contains `path`, searching parent directories.
///
/// The repository must have a working directory (bare repositories hold nothing
/// to format).
pub fn find_repo_root(path: &Path) -> Result<(Repository, PathBuf)> {
    let repo = Repository::discover(path).map_err(|source| Error::NotARepository {
        path: path.to_path_buf(),
        source,
    })?;
    let root = repo
        .workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::BareRepository(repo.path().to_path_buf()))?;
    log::debug!("Repository root: {}", root.to_string_lossy());
    Ok((repo, root))
}

/// Fetch the diff between the merge base of `reference` and `HEAD` and the current
/// working tree (including staged changes).
///
/// Only changes made since the histories diverged are included, so commits that
/// landed on `reference` after branching off do not show up.
pub fn get_diff(repo: &Repository, reference: &str) -> Result<String> {
    let ref_commit = repo
        .revparse_single(reference)
        .and_then(|obj| obj.peel_to_commit())
        .map_err(|source| Error::UnknownReference {
            reference: reference.to_string(),
            source,
        })?;
    let head = repo.head()?.peel_to_commit()?;
    let base = repo.merge_base(ref_commit.id(), head.id())?;
    log::debug!("Merge base of {reference} and HEAD: {base}");
    let base_tree = repo.find_commit(base)?.tree()?;

    let mut opts = DiffOptions::new();
    opts.context_lines(0);
    let diff = repo.diff_tree_to_workdir_with_index(Some(&base_tree), Some(&mut opts))?;
    diff_to_string(&diff)
}

/// Renders a [`git2::Diff`] as unified patch text.
fn diff_to_string(diff: &Diff) -> Result<String> {
    let mut buf = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        match line.origin() {
            origin @ ('+' | '-' | ' ') => {
                buf.push(origin as u8);
                buf.extend_from_slice(line.content());
            }
            _ => buf.extend_from_slice(line.content()),
        }
        true
    })?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Reads a diff from the file at `path`, or from stdin if `path` is `-`.
pub fn read_diff_source(path: &str) -> Result<String> {
    let read_err = |source| Error::Read {
        path: PathBuf::from(path),
        source,
    };
    if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map_err(read_err)?;
        Ok(buf)
    } else {
        fs::read_to_string(path).map_err(read_err)
    }
}

fn hunk_header() -> &'static Regex {
    static HUNK_HEADER: OnceLock<Regex> = OnceLock::new();
    HUNK_HEADER.get_or_init(|| {
        Regex::new(r"^@@ -\d+(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid hunk pattern")
    })
}

/// Removes `strip` leading directories from `path`, like `patch -p<strip>`.
///
/// Returns [`None`] if the path does not have that many directories.
fn strip_components(path: &str, strip: usize) -> Option<&str> {
    let mut rest = path;
    for _ in 0..strip {
        let idx = rest.find('/')?;
        rest = &rest[idx + 1..];
    }
    Some(rest)
}

/// Extracts the file name from the text after `+++ `.
fn file_name_from_header(header: &str, strip: usize) -> Option<PathBuf> {
    // `diff -u` appends a tab and a timestamp
    let name = header.split('\t').next().unwrap_or_default().trim_end();
    let name = name
        .strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .unwrap_or(name);
    if name == "/dev/null" {
        return None;
    }
    match strip_components(name, strip) {
        Some(stripped) if !stripped.is_empty() => Some(PathBuf::from(stripped)),
        _ => {
            log::warn!("Cannot strip {strip} directories from {name:?}; skipping file");
            None
        }
    }
}

/// Line counts left to read in the body of the current hunk.
#[derive(Default)]
struct HunkBody {
    old: u32,
    new: u32,
}

impl HunkBody {
    fn is_done(&self) -> bool {
        self.old == 0 && self.new == 0
    }

    fn consume(&mut self, line: &str) {
        match line.as_bytes().first() {
            Some(b'+') => self.new = self.new.saturating_sub(1),
            Some(b'-') => self.old = self.old.saturating_sub(1),
            Some(b'\\') => {} // "\ No newline at end of file"
            _ => {
                self.old = self.old.saturating_sub(1);
                self.new = self.new.saturating_sub(1);
            }
        }
    }
}

/// Parses unified diff text into the list of changed files and their added line
/// ranges.
///
/// `strip` leading directories are removed from every file name (`1` turns
/// `b/src/main.cpp` into `src/main.cpp`). Hunks that only delete lines are ignored,
/// and so are files left with no added lines (deleted files included). Files keep
/// the order in which they appear in the diff.
pub fn parse_diff(diff: &str, strip: usize) -> Vec<FileObj> {
    let mut files: Vec<FileObj> = Vec::new();
    let mut current_file: Option<PathBuf> = None;
    let mut ranges: Vec<RangeInclusive<u32>> = Vec::new();
    let mut body = HunkBody::default();

    let mut flush = |name: Option<PathBuf>, ranges: &mut Vec<RangeInclusive<u32>>| {
        if let Some(name) = name {
            if !ranges.is_empty() {
                files.push(FileObj::from(name, std::mem::take(ranges)));
            }
        }
        ranges.clear();
    };

    for line in diff.lines() {
        if !body.is_done() {
            body.consume(line);
            continue;
        }
        if let Some(header) = line.strip_prefix("+++ ") {
            flush(current_file.take(), &mut ranges);
            current_file = file_name_from_header(header, strip);
            continue;
        }
        let Some(captures) = hunk_header().captures(line) else {
            continue;
        };
        let count = |idx: usize| {
            captures
                .get(idx)
                .map_or(Ok(1), |m| m.as_str().parse::<u32>())
        };
        let (Ok(old_lines), Ok(start), Ok(new_lines)) = (count(1), count(2), count(3)) else {
            log::warn!("Malformed hunk header: {line}");
            continue;
        };
        body = HunkBody {
            old: old_lines,
            new: new_lines,
        };
        if current_file.is_none() || new_lines == 0 {
            // no file name yet, or the hunk only removes lines
            continue;
        }
        let Some(end) = start.checked_add(new_lines - 1) else {
            log::warn!("Malformed hunk header: {line}");
            continue;
        };
        ranges.push(start..=end);
    }
    flush(current_file, &mut ranges);

    for file in &files {
        log::debug!("{} changed lines {:?}", file.display_name(), file.added_ranges);
    }
    files
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::{Path, PathBuf};

    use git2::{Commit, IndexAddOption, Oid, Repository, Signature};
    use tempfile::{tempdir, TempDir};

    use super::{find_repo_root, get_diff, parse_diff, strip_components};
    use crate::error::Error;

    static TYPICAL_DIFF: &str = "diff --git a/src/main.cpp b/src/main.cpp
index 1234567..89abcde 100644
--- a/src/main.cpp
+++ b/src/main.cpp
@@ -3 +3 @@ int main()
-    return 1;
+    return 0;
@@ -10,0 +11,3 @@ void helper()
+void extra()
+{
+}
@@ -20,2 +22,0 @@ void removed()
-    gone();
-    gone_too();
diff --git a/tools/setup.py b/tools/setup.py
new file mode 100644
index 0000000..1111111
--- /dev/null
+++ b/tools/setup.py
@@ -0,0 +1,2 @@
+import os
+print(os.name)
diff --git a/old.h b/old.h
deleted file mode 100644
index 2222222..0000000
--- a/old.h
+++ /dev/null
@@ -1,2 +0,0 @@
-#pragma once
-int x;
";

    #[test]
    fn parse_typical_diff() {
        let files = parse_diff(TYPICAL_DIFF, 1);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, PathBuf::from("src/main.cpp"));
        assert_eq!(files[0].added_ranges, vec![3..=3, 11..=13]);
        assert_eq!(files[1].name, PathBuf::from("tools/setup.py"));
        assert_eq!(files[1].added_ranges, vec![1..=2]);
    }

    #[test]
    fn no_strip_keeps_prefix() {
        let files = parse_diff(TYPICAL_DIFF, 0);
        assert_eq!(files[0].name, PathBuf::from("b/src/main.cpp"));
    }

    #[test]
    fn strip_more_directories() {
        let files = parse_diff(TYPICAL_DIFF, 2);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, PathBuf::from("main.cpp"));
        assert_eq!(files[1].name, PathBuf::from("setup.py"));
    }

    #[test]
    fn too_few_directories_skips_file() {
        // "b/src/main.cpp" has only 2 directories
        let files = parse_diff(TYPICAL_DIFF, 3);
        assert!(files.is_empty());
    }

    #[test]
    fn strip_like_patch() {
        assert_eq!(strip_components("a/b/c.py", 0), Some("a/b/c.py"));
        assert_eq!(strip_components("a/b/c.py", 1), Some("b/c.py"));
        assert_eq!(strip_components("a/b/c.py", 2), Some("c.py"));
        assert_eq!(strip_components("a/b/c.py", 3), None);
        assert_eq!(strip_components("a//c.py", 2), Some("c.py"));
    }

    #[test]
    fn added_line_looking_like_header() {
        // an added line that starts with "++ " shows up as "+++ " in the diff
        let diff = "--- a/calc.cpp
+++ b/calc.cpp
@@ -4,0 +5,2 @@
+++ counter;
+int y;
";
        let files = parse_diff(diff, 1);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, PathBuf::from("calc.cpp"));
        assert_eq!(files[0].added_ranges, vec![5..=6]);
    }

    #[test]
    fn file_names_with_spaces_and_timestamps() {
        let diff = "--- old/some dir/a file.py\t2024-01-01 10:00:00.000000000 +0000
+++ new/some dir/a file.py\t2024-01-02 10:00:00.000000000 +0000
@@ -1,3 +1,4 @@
 import os
+import sys

 print(os.name)
";
        let files = parse_diff(diff, 1);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, PathBuf::from("some dir/a file.py"));
        // context lines are part of the reported range, like the hunk header says
        assert_eq!(files[0].added_ranges, vec![1..=4]);
    }

    #[test]
    fn oversized_hunk_is_skipped() {
        let diff = "+++ b/x.py
@@ -0,0 +4294967295,2 @@
+a
+b
+++ b/y.py
@@ -0,0 +1 @@
+c
";
        let files = parse_diff(diff, 1);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, PathBuf::from("y.py"));
        assert_eq!(files[0].added_ranges, vec![1..=1]);
    }

    #[test]
    fn hunks_before_any_file_are_ignored() {
        let diff = "@@ -1 +1 @@\n-a\n+b\n";
        assert!(parse_diff(diff, 0).is_empty());
    }

    #[test]
    fn empty_diff() {
        assert!(parse_diff("", 1).is_empty());
    }

    #[test]
    fn no_newline_marker() {
        let diff = "--- a/x.py
+++ b/x.py
@@ -1 +1 @@
-a = 1
\\ No newline at end of file
+a = 2
\\ No newline at end of file
--- a/y.py
+++ b/y.py
@@ -2,0 +3 @@
+b = 3
";
        let files = parse_diff(diff, 1);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].added_ranges, vec![1..=1]);
        assert_eq!(files[1].name, PathBuf::from("y.py"));
        assert_eq!(files[1].added_ranges, vec![3..=3]);
    }

    // ******************* tests using a scratch repository

    fn commit_all(repo: &Repository, message: &str) -> Oid {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parent_refs = parents.iter().collect::<Vec<&Commit>>();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    fn write(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// A repository with a `base` branch at the first commit and one more commit on
    /// top of it in the checked out branch.
    fn setup_repo() -> (TempDir, Repository) {
        let tmp = tempdir().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        write(tmp.path(), "a.cpp", "1\n2\n3\n4\n5\n");
        write(tmp.path(), "b.py", "x = 1\n");
        write(tmp.path(), "gone.h", "#pragma once\n");
        let first = commit_all(&repo, "initial");
        repo.branch("base", &repo.find_commit(first).unwrap(), false)
            .unwrap();
        write(tmp.path(), "b.py", "x = 1\ny = 2\nz = 3\n");
        commit_all(&repo, "more python");
        (tmp, repo)
    }

    #[test]
    fn diff_since_merge_base() {
        let (tmp, repo) = setup_repo();
        write(tmp.path(), "a.cpp", "1\n2\nthree\n4\n5\n");
        fs::remove_file(tmp.path().join("gone.h")).unwrap();

        let diff = get_diff(&repo, "base").unwrap();
        let files = parse_diff(&diff, 1);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, PathBuf::from("a.cpp"));
        assert_eq!(files[0].added_ranges, vec![3..=3]);
        assert_eq!(files[1].name, PathBuf::from("b.py"));
        assert_eq!(files[1].added_ranges, vec![2..=3]);
    }

    #[test]
    fn staged_new_file_is_included() {
        let (tmp, repo) = setup_repo();
        write(tmp.path(), "src/new.hpp", "#pragma once\nint f();\n");
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("src/new.hpp")).unwrap();
        index.write().unwrap();

        let diff = get_diff(&repo, "base").unwrap();
        let files = parse_diff(&diff, 1);
        let new_file = files
            .iter()
            .find(|f| f.name == PathBuf::from("src/new.hpp"))
            .unwrap();
        assert_eq!(new_file.added_ranges, vec![1..=2]);
    }

    #[test]
    fn missing_newline_marker_keeps_its_own_line() {
        let (tmp, repo) = setup_repo();
        write(tmp.path(), "c.py", "x = 1");
        commit_all(&repo, "no trailing newline");
        write(tmp.path(), "c.py", "x = 2");

        let diff = get_diff(&repo, "HEAD").unwrap();
        assert!(diff.contains("+x = 2\n\\ No newline at end of file\n"));
        let files = parse_diff(&diff, 1);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, PathBuf::from("c.py"));
        assert_eq!(files[0].added_ranges, vec![1..=1]);
    }

    #[test]
    fn untracked_file_is_not_included() {
        let (tmp, repo) = setup_repo();
        write(tmp.path(), "scratch.py", "print('hi')\n");
        let diff = get_diff(&repo, "HEAD").unwrap();
        assert!(parse_diff(&diff, 1).is_empty());
    }

    #[test]
    fn unknown_reference() {
        let (_tmp, repo) = setup_repo();
        let err = get_diff(&repo, "no-such-branch").unwrap_err();
        assert!(matches!(err, Error::UnknownReference { .. }));
    }

    #[test]
    fn discover_from_subdirectory() {
        let (tmp, _repo) = setup_repo();
        write(tmp.path(), "nested/dir/file.txt", "");
        let (_, root) = find_repo_root(&tmp.path().join("nested/dir")).unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn not_a_repository() {
        let tmp = tempdir().unwrap();
        // a temp dir could live inside some checkout; only assert when it does not
        if Repository::discover(tmp.path()).is_err() {
            let err = find_repo_root(tmp.path()).err().unwrap();
            assert!(matches!(err, Error::NotARepository { .. }));
        }
    }
}
