use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::sources::SourceKind;

/// Command-line arguments for the rust-extractor tool.
///
/// `--input-type` and `--input` are required for an extraction run; they
/// are checked at runtime so the subcommands can be used without them.
#[derive(Parser, Debug)]
#[clap(name = "rust-extractor", about = "Forensic artifact extraction from device images and backups")]
pub struct Args {
    /// Type of the evidence container
    #[clap(short = 't', long, value_enum)]
    pub input_type: Option<SourceKind>,

    /// Path to the evidence container
    #[clap(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory for the log and run summary
    #[clap(short, long, default_value = "extraction_output")]
    pub output: PathBuf,

    /// Staging directory for extracted files (default: <output>/staging)
    #[clap(long)]
    pub temp: Option<PathBuf>,

    /// Artifacts to run (comma-separated; default: all except long-running)
    #[clap(short, long, value_delimiter = ',')]
    pub artifacts: Vec<String>,

    /// Include long-running artifacts when no list is given
    #[clap(long)]
    pub include_long_running: bool,

    /// Time budget per artifact in seconds
    #[clap(long)]
    pub timeout: Option<u64>,

    /// Keep the staging directory after the run
    #[clap(long)]
    pub keep_staged: bool,

    /// Record the SHA-256 of the input in the run summary
    #[clap(long)]
    pub hash_input: bool,

    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

impl Args {
    /// Staging directory for this run
    pub fn staging_dir(&self) -> PathBuf {
        self.temp
            .clone()
            .unwrap_or_else(|| self.output.join(crate::constants::DEFAULT_STAGING_DIR_NAME))
    }
}

/// Available subcommands for the extractor.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = crate::constants::DEFAULT_CONFIG_FILE_NAME)]
        path: PathBuf,
    },

    /// List the available artifacts
    List,
}
