//! CLI parse: clap types for trellis. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Trellis CLI - fetch and inspect API resource graphs
#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Fetch route resource graphs from a content API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Fetch a route and everything it displays
    Fetch {
        /// Route path, e.g. /about
        path: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Fetch one resource by IRI
    Resource {
        iri: String,
        /// Do not follow nested relations
        #[arg(long)]
        shallow: bool,
    },
    /// Print the effective configuration
    Config,
}
