//! This module holds the Command Line Interface design.

use std::fs;
use std::path::Path;

// non-std crates
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

/// Builds and returns the Command Line Interface's argument parsing object.
pub fn get_arg_parser() -> Command {
    Command::new("code-quality")
        .about(
            "Run code quality checks and code formatters on a Git repository.

Only files which changed since a given branch or commit are processed.",
        )
        .arg(
            Arg::new("py")
                .long("py")
                .action(ArgAction::SetTrue)
                .help("Enable all Python checks"),
        )
        .arg(
            Arg::new("yapf")
                .long("yapf")
                .value_name("CMD")
                .num_args(0..=1)
                .default_missing_value("yapf")
                .help("Reformat Python files"),
        )
        .arg(
            Arg::new("flake8")
                .long("flake8")
                .value_name("CMD")
                .num_args(0..=1)
                .default_missing_value("flake8")
                .help("Check Python files with flake8"),
        )
        .arg(
            Arg::new("cpp")
                .long("cpp")
                .action(ArgAction::SetTrue)
                .help("Enable all C++ checks"),
        )
        .arg(
            Arg::new("clang-format")
                .long("clang-format")
                .value_name("CMD")
                .num_args(0..=1)
                .default_missing_value("clang-format")
                .help("Reformat C++ code"),
        )
        .arg(
            Arg::new("ref")
                .long("ref")
                .default_value("main")
                .help("Name / hash of the reference branch / commit"),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .value_name("NUM")
                .value_parser(value_parser!(usize))
                .default_value("0")
                .hide_default_value(true)
                .help(
                    "Strip this number of directories from file paths \
                     [default: 1 for git's diff, 0 for --diff]",
                ),
        )
        .arg(
            Arg::new("clang-version")
                .short('V')
                .long("clang-version")
                .default_value("")
                .long_help(
                    "The desired version of clang-format to use.

- Set this option to a blank string (``''``) to use the
  platform's default installed version.
- A number like ``16`` looks for ``clang-format-16`` first.
- This value can also be a path to where the clang tools are
  installed (if using a custom install location).
",
                ),
        )
        .arg(
            Arg::new("repo-root")
                .short('r')
                .long("repo-root")
                .default_value(".")
                .long_help(
                    "A path inside the repository to process. The repository's root
directory is discovered from here and used as the working directory
for all tools.
",
                ),
        )
        .arg(
            Arg::new("diff")
                .short('d')
                .long("diff")
                .value_name("FILE")
                .long_help(
                    "Read a unified diff from FILE instead of asking git for the changes
since --ref. Use ``-`` to read from stdin. Paths in the diff are taken
relative to the repository root (after --prefix is applied).
",
                ),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .long_help(
                    "Do not modify any files. Report what the formatters would change and
exit with a non-zero status if anything would change or flake8 reports
problems.
",
                ),
        )
        .arg(
            Arg::new("ignore")
                .short('i')
                .long("ignore")
                .value_delimiter('|')
                .default_value(".github")
                .long_help(
                    "Set this option with path(s) to ignore (or not ignore).

- In the case of multiple paths, you can use `|` to separate each path.
- There is no need to use ``./`` for each entry; a blank string (``''``)
  represents the repo-root path.
- Prefix a path with ``!`` to explicitly not ignore it.
- Submodules are automatically ignored unless explicitly not ignored.
- Glob patterns are not supported here.
",
                ),
        )
        .arg(
            Arg::new("cpp-extensions")
                .long("cpp-extensions")
                .value_delimiter(',')
                .default_value("cpp,cc,cxx,hpp,hh,hxx,h")
                .help("A comma-separated list of C++ file extensions"),
        )
        .arg(
            Arg::new("py-extensions")
                .long("py-extensions")
                .value_delimiter(',')
                .default_value("py")
                .help("A comma-separated list of Python file extensions"),
        )
        .arg(
            Arg::new("verbosity")
                .long("verbosity")
                .short('v')
                .default_value("info")
                .value_parser(["debug", "info"])
                .help("This controls the verbosity of the log output"),
        )
}

/// The external tools enabled for a run, each with the command used to invoke it.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CheckerSelection {
    pub clang_format: Option<String>,
    pub yapf: Option<String>,
    pub flake8: Option<String>,
}

impl CheckerSelection {
    /// Resolves `--py` and `--cpp` into the individual tools they enable.
    ///
    /// A tool given explicitly keeps its command; the language switches only fill in
    /// the default command for tools that were not given.
    pub fn from_matches(args: &ArgMatches) -> Self {
        let explicit = |name: &str| args.get_one::<String>(name).cloned();
        let mut selection = CheckerSelection {
            clang_format: explicit("clang-format"),
            yapf: explicit("yapf"),
            flake8: explicit("flake8"),
        };
        if args.get_flag("py") {
            selection.yapf.get_or_insert_with(|| String::from("yapf"));
            selection.flake8.get_or_insert_with(|| String::from("flake8"));
        }
        if args.get_flag("cpp") {
            selection
                .clang_format
                .get_or_insert_with(|| String::from("clang-format"));
        }
        selection
    }

    /// Is no tool enabled at all?
    pub fn is_empty(&self) -> bool {
        self.clang_format.is_none() && self.yapf.is_none() && self.flake8.is_none()
    }
}

/// Collects the values of a multi-valued option as owned strings.
pub fn get_list(args: &ArgMatches, name: &str) -> Vec<String> {
    args.get_many::<String>(name)
        .map(|vals| vals.filter(|v| !v.is_empty()).cloned().collect())
        .unwrap_or_default()
}

/// This will parse the list of paths specified from the CLI using the `--ignore`
/// argument.
///
/// It returns 2 lists (in order):
///
/// - `ignored` paths
/// - `not_ignored` paths
///
/// Paths are returned relative to the repository root without a leading `./`. An
/// empty string stands for the root itself.
///
/// This function will also read a .gitmodules file located in the `repo_root`.
/// The named submodules' paths will be automatically added to the ignored list,
/// unless the submodule's path is already specified in the not_ignored list.
pub fn parse_ignore(ignore: &[&str], repo_root: &Path) -> (Vec<String>, Vec<String>) {
    let mut ignored = vec![];
    let mut not_ignored = vec![];
    for pattern in ignore {
        let as_posix = pattern.replace('\\', "/");
        let mut pat = as_posix.as_str();
        let is_ignored = !pat.starts_with('!');
        if !is_ignored {
            pat = &pat[1..];
        }
        if pat == "." {
            pat = "";
        }
        pat = pat.trim_start_matches("./").trim_end_matches('/');
        if is_ignored {
            ignored.push(pat.to_string());
        } else {
            not_ignored.push(pat.to_string());
        }
    }

    if let Ok(read_buf) = fs::read_to_string(repo_root.join(".gitmodules")) {
        for line in read_buf.lines() {
            let line = line.trim();
            if !line.starts_with("path") {
                continue;
            }
            if let Some((_, value)) = line.split_once('=') {
                let submodule = value.trim().trim_start_matches("./").to_string();
                log::debug!("Found submodule: {submodule}");
                if !not_ignored.contains(&submodule) && !ignored.contains(&submodule) {
                    ignored.push(submodule);
                }
            }
        }
    }

    if !ignored.is_empty() {
        log::info!("Ignored:");
        for pattern in &ignored {
            log::info!("  ./{pattern}");
        }
    }
    if !not_ignored.is_empty() {
        log::info!("Not Ignored:");
        for pattern in &not_ignored {
            log::info!("  ./{pattern}");
        }
    }
    (ignored, not_ignored)
}
