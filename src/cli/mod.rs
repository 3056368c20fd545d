use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod channels;
mod check;
mod info;

/// celio - Affymetrix CEL file inspector
#[derive(Parser)]
#[command(name = "celio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a CEL file's format and header
    Info {
        /// CEL file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Emit the header as JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// List the scan channels of a generic CEL file
    Channels {
        /// CEL file path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check that a set of CEL files share geometry and chip type
    Check {
        /// CEL file paths; the first one is the reference
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Info { file, json } => info::run(file, json),
            Commands::Channels { file } => channels::run(file),
            Commands::Check { files } => check::run(files),
        }
    }
}
