//! Read and patch nested JAR/WAR/EAR/RAR archives from the command line
//!
//! # Overview
//!
//! The binary is a thin front end over the `earpatch` library:
//!
//! 1. CLI argument parsing
//! 2. Log setup: `tracing` events from the library go to stderr, filtered by
//!    `RUST_LOG` or else by the `-q`/`-v` counts
//! 3. Dispatch to the subcommand
//!
//! Rewriting commands (`replace`, `recompress`, `prop set`) write to a
//! temporary file beside the archive and rename it over the original only
//! after the whole pass succeeded.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use earpatch::args::Args;
use earpatch::commands::run;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);
    run(&args)
}

fn init_logging(args: &Args) {
    let level = match (args.quiet, args.verbose) {
        (q, _) if q > 1 => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("earpatch={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
