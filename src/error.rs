//! The error type shared by all of this crate's fallible operations.

use std::{io, path::PathBuf, process::ExitStatus};

/// Everything that can stop a run before all requested tools have finished.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to determine git root directory of {path:?}. Is this a git repository?")]
    NotARepository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("the repository at {0:?} has no working directory")]
    BareRepository(PathBuf),

    #[error("could not resolve reference '{reference}': {source}")]
    UnknownReference {
        reference: String,
        #[source]
        source: git2::Error,
    },

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error("could not find {name}: {reason}")]
    ToolNotFound { name: String, reason: &'static str },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed on {file:?} ({status})")]
    ToolFailed {
        program: String,
        file: PathBuf,
        status: ExitStatus,
    },

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot change into {path:?}: {source}")]
    ChangeDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not parse clang-format replacements: {0}")]
    Replacements(#[from] serde_xml_rs::Error),
}

/// A shorthand for results carrying this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
