//! This is the code_quality package's binary executable's source code.

use std::{env, process};

// project specific modules/crates
use code_quality::run::main as run_main;

/// This takes the CLI arguments and passes them to [`code_quality::run::main`].
pub fn main() {
    process::exit(run_main(env::args().collect::<Vec<String>>()));
}
