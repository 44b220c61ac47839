//! The root module for the code_quality package when compiled as a library.
//! This module mainly holds the declarations of this package's other modules.
//!
//! The binary driver (`bin.rs`) only forwards the command line to [`run::main`].

// project specific modules/crates
pub mod cli;
pub mod common_fs;
pub mod error;
pub mod git;
pub mod logger;
pub mod run;
pub mod tools;

pub use error::{Error, Result};
