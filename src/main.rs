//! Percolate - build client scripts and vendor files into a public directory

use std::process::ExitCode;

use percolate::cli;

fn main() -> ExitCode {
    cli::run()
}
