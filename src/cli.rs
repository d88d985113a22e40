//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// diffcov-aggregate - multi-module diff-coverage aggregation
///
/// Run once per module at the end of its build. Only the module that
/// finishes last in dependency order aggregates classes, sources and
/// coverage data from every module and hands them to the report engine.
///
/// Examples:
///   diffcov-aggregate --reactor target/reactor.json --module web
///   diffcov-aggregate --reactor reactor.json --module web --diff-base origin/main
///   diffcov-aggregate --reactor reactor.json --module web --dry-run
///   diffcov-aggregate --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Reactor manifest (JSON) describing the modules in dependency order
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "DIFFCOV_REACTOR",
        required_unless_present = "init_config"
    )]
    pub reactor: Option<PathBuf>,

    /// Identifier of the module currently finishing its build
    #[arg(
        short,
        long,
        value_name = "ID",
        env = "DIFFCOV_MODULE",
        required_unless_present = "init_config"
    )]
    pub module: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .diffcov.toml in the top-level project directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Diff file, relative to the top-level project directory
    #[arg(long, value_name = "FILE", conflicts_with_all = ["diff_url", "diff_base"])]
    pub diff_file: Option<PathBuf>,

    /// URL serving the diff
    #[arg(long, value_name = "URL", conflicts_with = "diff_base")]
    pub diff_url: Option<String>,

    /// Git revision to diff the working tree against
    #[arg(long, value_name = "REV")]
    pub diff_base: Option<String>,

    /// Aggregate minimum coverage (0.0 - 1.0) applied to every metric
    #[arg(long, value_name = "FRACTION")]
    pub min_coverage: Option<f64>,

    /// Ask the report engine to fail the build on threshold violations
    #[arg(long)]
    pub fail_on_violation: bool,

    /// Report renderer command; receives the engine input JSON path
    #[arg(long, value_name = "CMD", env = "DIFFCOV_ENGINE")]
    pub engine_command: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: assemble and print the configuration without invoking the engine
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .diffcov.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref reactor) = self.reactor {
            if !reactor.is_file() {
                return Err(format!(
                    "Reactor manifest does not exist: {}",
                    reactor.display()
                ));
            }
        }

        if self.module.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err("Module id must not be empty".to_string());
        }

        if let Some(min_coverage) = self.min_coverage {
            if !(0.0..=1.0).contains(&min_coverage) {
                return Err("Minimum coverage must be between 0.0 and 1.0".to_string());
            }
        }

        if let Some(ref url) = self.diff_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Diff URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
