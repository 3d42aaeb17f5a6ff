use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "abr-session")]
#[command(author, version, about = "Adaptive streaming session controller")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether the DASH provider would claim a source
    Check {
        /// Source URL
        #[arg(required = true)]
        src: String,

        /// MIME type of the source
        #[arg(long = "type")]
        mime_type: Option<String>,

        /// Explicit provider tag
        #[arg(long)]
        provider: Option<String>,
    },

    /// Replay a scripted session against the mock engine
    Replay {
        /// Trace file (JSON)
        #[arg(required = true)]
        trace: PathBuf,

        /// Print the full report instead of one event per line
        #[arg(long)]
        report: bool,

        /// Apply the browser quirks of this user agent
        #[arg(long)]
        user_agent: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
