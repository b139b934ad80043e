//! Command-line argument parsing
//!
//! Defines the CLI for the `earpatch` binary using clap. Every subcommand takes
//! the physical archive first; entries inside it are named by virtual path
//! (`lib/jms.rar#/META-INF/ra.xml`) or selected by glob pattern.
//!
//! # Examples
//!
//! ```no_run
//! use earpatch::args::Args;
//! use clap::Parser;
//!
//! let args = Args::parse();
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Read and patch nested JAR/WAR/EAR/RAR archives and their deployment descriptors
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Examples:
  earpatch list app.ear                                   List every entry at every nesting level
  earpatch list app.ear '**/*.xml'                        List descriptors only
  earpatch extract app.ear -d out '**/META-INF/*'         Extract matching entries below out/
  earpatch cat app.ear lib/jms.rar#/META-INF/ra.xml       Print one entry to stdout
  earpatch replace app.ear lib/a.jar#/conf.xml=conf.xml   Overwrite a nested entry with a local file
  earpatch recompress -L 9 app.ear                        Rewrite every entry at level 9
  earpatch verify app.ear                                 Check CRC-32 of every entry
  earpatch prop get app.ear lib/jms.rar#/META-INF/ra.xml  Show resource adapter properties
  earpatch prop set app.ear lib/jms.rar#/META-INF/ra.xml ConnectionURL=tcp://mq:61616")]
pub struct Args {
    /// Quiet mode (-q no progress or summaries, -qq errors only)
    #[arg(short = 'q', long = "quiet", action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Log archive decisions (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Compression level for rewritten entries (0 stores, 1-9 deflate)
    #[arg(
        short = 'L',
        long = "level",
        value_name = "LEVEL",
        global = true,
        value_parser = clap::value_parser!(u32).range(0..=9)
    )]
    pub level: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List leaf entries of the archive and of every nested archive
    List {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Show compressed size, ratio and CRC-32
        #[arg(short = 'l', long = "long")]
        long: bool,

        #[command(flatten)]
        select: Selection,
    },

    /// Extract leaf entries into a directory tree
    Extract {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Directory to extract files to (default: current directory)
        #[arg(short = 'd', long = "directory", value_name = "EXDIR")]
        output_dir: Option<PathBuf>,

        /// Overwrite existing files (default: skip them)
        #[arg(short = 'o', long = "overwrite")]
        overwrite: bool,

        /// Junk paths (don't create directories)
        #[arg(short = 'j', long = "junk-paths")]
        junk_paths: bool,

        /// Skip restoring file timestamps
        #[arg(short = 'D', long = "no-timestamps")]
        no_timestamps: bool,

        #[command(flatten)]
        select: Selection,
    },

    /// Write the content of one entry to stdout
    Cat {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Virtual path, matched as a suffix
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Overwrite entries in a single atomic rewrite
    Replace {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Replace the entry at PATH with the content of FILE
        #[arg(value_name = "PATH=FILE", value_parser = parse_assignment)]
        files: Vec<(String, String)>,

        /// Replace the entry at PATH with TEXT
        #[arg(
            short = 't',
            long = "text",
            value_name = "PATH=TEXT",
            value_parser = parse_assignment
        )]
        texts: Vec<(String, String)>,

        /// Ignore paths that are not in the archive instead of failing
        #[arg(long = "optional")]
        optional: bool,
    },

    /// Rewrite every entry, including nested archives, at the chosen level
    Recompress {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,
    },

    /// Test CRC-32 of every leaf entry at every nesting level
    Verify {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        #[command(flatten)]
        select: Selection,
    },

    /// Read or change configuration properties of an XML descriptor
    Prop {
        #[command(subcommand)]
        action: PropCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PropCommand {
    /// Print property values (all properties when no NAME is given)
    Get {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Virtual path of the descriptor
        #[arg(value_name = "DESCRIPTOR")]
        descriptor: String,

        #[arg(value_name = "NAME")]
        names: Vec<String>,

        #[command(flatten)]
        scope: Scope,
    },

    /// Set property values, adding properties that do not exist yet
    Set {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Virtual path of the descriptor
        #[arg(value_name = "DESCRIPTOR")]
        descriptor: String,

        #[arg(value_name = "NAME=VALUE", required = true, value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,

        #[command(flatten)]
        scope: Scope,
    },
}

/// Include and exclude patterns for read traversals.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Selection {
    /// Entries to select (glob over virtual paths; default: all)
    #[arg(value_name = "PATTERN")]
    pub patterns: Vec<String>,

    /// Exclude entries matching these patterns
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,
}

/// Which property group of the descriptor to address.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Scope {
    /// Use the outbound connection definition (optionally the one for INTERFACE)
    #[arg(long = "outbound", value_name = "INTERFACE", conflicts_with = "activation")]
    pub outbound: Option<Option<String>>,

    /// Use the activation config of the message-driven bean EJB_NAME
    #[arg(long = "activation", value_name = "EJB_NAME")]
    pub activation: Option<String>,
}

/// Split `KEY=VALUE` at the first `=`.
pub fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}
