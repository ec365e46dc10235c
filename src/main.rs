use std::fs::{self, File};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger};

use rust_extractor::artifacts::builtin_registry;
use rust_extractor::cli::{Args, Commands};
use rust_extractor::config::{load_or_create_config, ExtractorConfig};
use rust_extractor::constants::DEFAULT_LOG_FILE_NAME;
use rust_extractor::runner::{run_extraction, ExtractionRequest};

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Handle subcommands
    if let Some(cmd) = &args.command {
        initialize_logging(args.verbose, None)?;
        return handle_subcommand(cmd);
    }

    let request = build_request(&args)?;

    fs::create_dir_all(&request.output_dir)
        .context("Failed to create output directory")?;
    initialize_logging(args.verbose, Some(&request.output_dir.join(DEFAULT_LOG_FILE_NAME)))?;

    info!("Starting artifact extraction");

    // Load configuration and apply command-line overrides
    let mut config = load_or_create_config(args.config.as_deref())?;
    apply_cli_overrides(&mut config, &args);

    let report = run_extraction(&request, &config)?;

    info!(
        "Artifact extraction completed: {} processed, {} failed, {} without files",
        report.outcome.succeeded, report.outcome.failed, report.outcome.skipped
    );
    Ok(())
}

/// Initialize terminal logging, plus a log file when a path is given
fn initialize_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        let file = File::create(path)
            .context(format!("Failed to create log file: {}", path.display()))?;
        loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
    }

    CombinedLogger::init(loggers).context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands (init-config and list)
fn handle_subcommand(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            ExtractorConfig::create_default_config_file(path)?;
            info!("Configuration created successfully");
            Ok(())
        }
        Commands::List => {
            let registry = builtin_registry()?;
            for descriptor in registry.iter() {
                let mut flags = Vec::new();
                if descriptor.core {
                    flags.push("core");
                }
                if descriptor.long_running {
                    flags.push("long-running");
                }
                println!(
                    "{:<20} {:<16} {:<14} {}",
                    descriptor.name,
                    descriptor.category,
                    flags.join(","),
                    descriptor.description
                );
            }
            Ok(())
        }
    }
}

/// Input type and path are required for an extraction run
fn build_request(args: &Args) -> Result<ExtractionRequest> {
    let kind = args.input_type
        .ok_or_else(|| anyhow!("--input-type is required (fs, tar, gz, zip or itunes)"))?;
    let input = args.input
        .clone()
        .ok_or_else(|| anyhow!("--input is required"))?;

    Ok(ExtractionRequest {
        kind,
        input,
        output_dir: args.output.clone(),
        staging_dir: args.staging_dir(),
    })
}

/// Command-line values take precedence over the configuration file
fn apply_cli_overrides(config: &mut ExtractorConfig, args: &Args) {
    if !args.artifacts.is_empty() {
        config.artifacts.selected = args.artifacts.clone();
    }
    if args.include_long_running {
        config.artifacts.include_long_running = true;
    }
    if args.timeout.is_some() {
        config.engine.artifact_timeout_secs = args.timeout;
    }
    if args.keep_staged {
        config.staging.keep_staged_files = true;
    }
    if args.hash_input {
        config.hash_input = true;
    }
}
