//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "service-rules",
    version,
    author = "neur0map",
    about = "Classify discovered container endpoints with declarative service rules",
    long_about = "service-rules maps discovered service instances to service types using ordered, \
                  declarative signature files. The first ruleset whose rules all hold assigns the \
                  type; instances no ruleset claims are dropped."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/service-rules/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a JSON array of discovered instances
    Classify {
        /// Path to the instances file
        #[arg(short, long, value_name = "FILE")]
        entities: PathBuf,

        /// Print matched instances as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load and validate signature files
    Check {
        /// Signature files to check (defaults to the configured ones)
        files: Vec<PathBuf>,
    },

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

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
