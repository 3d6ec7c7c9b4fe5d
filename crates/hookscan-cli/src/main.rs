use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "hookscan")]
#[command(about = "Byte-pattern signature scanner for binary files")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a binary file for a signature
    Scan {
        /// File to scan
        file: PathBuf,

        /// Pattern text, e.g. "48 8B ? ? E8"
        pattern: String,

        /// Stop scanning after this many matches
        #[arg(short, long)]
        limit: Option<usize>,

        /// Fail unless exactly this many matches are found
        #[arg(short, long, conflicts_with = "limit")]
        expect: Option<usize>,

        /// Report addresses rebased onto this hex base instead of file offsets
        #[arg(short, long)]
        base: Option<String>,

        /// Hexdump rows to print around each match
        #[arg(short, long, default_value_t = 0)]
        context: usize,

        /// Hint store seeded before the scan and updated after it
        #[arg(long)]
        hints: Option<PathBuf>,
    },
    /// Inspect a hint store file
    Hints {
        /// Store file to print
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hookscan=info".parse()?))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Scan {
            file,
            pattern,
            limit,
            expect,
            base,
            context,
            hints,
        } => commands::scan::run(
            &file,
            &pattern,
            limit,
            expect,
            base.as_deref(),
            context,
            hints.as_deref(),
        ),
        Command::Hints { file } => commands::hints::run(&file),
    }
}
