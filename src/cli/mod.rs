//! CLI module for vidfetch.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{format_size, Output};

use clap::{Args, Parser, Subcommand};

/// vidfetch - fetch remote videos with format fallback
///
/// Tries a ranked list of formats, falls back to a bundled sample when the
/// remote source cannot deliver, and never overwrites an existing file.
#[derive(Parser, Debug)]
#[command(name = "vidfetch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by the commands that download.
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Extract audio instead of keeping the video
    #[arg(long)]
    pub audio: bool,

    /// Format spec to try, in order (repeat to build a chain; overrides the config)
    #[arg(short, long = "format", value_name = "FORMAT")]
    pub formats: Vec<String>,

    /// Destination directory
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Local sample to use when every format fails
    #[arg(long)]
    pub fallback: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a single URL
    Download {
        /// Video URL (defaults to the configured sample URL)
        url: Option<String>,

        #[command(flatten)]
        fetch: FetchArgs,

        /// Skip the download when the predicted file already exists
        #[arg(long)]
        skip_existing: bool,
    },

    /// Download every URL from a list file and the command line
    Batch {
        /// Extra URLs to process after the ones in the list file
        urls: Vec<String>,

        /// URL list file (one URL per line)
        #[arg(long)]
        file: Option<String>,

        /// Process only the first N URLs
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of URLs processed at the same time
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Download even when the predicted file already exists
        #[arg(long)]
        no_skip_existing: bool,

        /// Write the merged URL list back to the list file
        #[arg(long)]
        save: bool,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// List files in the destination directory
    List {
        /// Directory to list (defaults to the configured destination)
        #[arg(short, long)]
        output_dir: Option<String>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
