//! A module to initialize and customize the logger object used in (most) stdout.

use std::env;

// non-std crates
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("{}: {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// A private constant to manage the application's logger object.
static LOGGER: SimpleLogger = SimpleLogger;

/// A function to initialize the private `LOGGER`.
///
/// The logging level defaults to [`LevelFilter::Info`].
/// Returns a [`SetLoggerError`] if the `LOGGER` is already initialized.
pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Info))
}

/// Maps the `--verbosity` value to a log level.
pub fn level_from_verbosity(verbosity: &str) -> LevelFilter {
    if verbosity == "debug" {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn in_github_actions() -> bool {
    env::var("GITHUB_ACTIONS").is_ok_and(|val| val == "true")
}

/// This prints a line to indicate the beginning of a related group of log statements.
///
/// On a GitHub Actions runner the group is collapsible in the workflow log.
/// Elsewhere, the name is just logged as a header.
pub fn start_log_group(name: String) {
    if in_github_actions() {
        println!("::group::{}", name);
    } else {
        log::info!("{}", name);
    }
}

/// This prints a line to indicate the ending of a related group of log statements.
pub fn end_log_group() {
    if in_github_actions() {
        println!("::endgroup::");
    }
}
