//! # celio command-line tool
//!
//! Inspect and validate Affymetrix CEL files.
//!
//! ```bash
//! # Show a file's format and header
//! celio info scan.CEL
//!
//! # Channel layout of a multi-channel generic file
//! celio channels scan.CEL
//!
//! # Check that a set of files share geometry and chip type
//! celio check *.CEL
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    cli.run()
}
