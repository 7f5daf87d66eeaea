//! gridstore CLI entry point
//!
//! Parses arguments and dispatches to the CLI module. The response,
//! including any error, is already on stdout; failures exit non-zero.

use gridstore::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
