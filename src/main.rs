//! diffcov-aggregate - multi-module diff-coverage aggregation
//!
//! Invoked once per module at the end of its build. The module that
//! finishes last in dependency order collects class files, source roots
//! and coverage data from every module and hands them to the report engine.
//!
//! Exit codes:
//!   0 - Success (or not the last module, nothing to do)
//!   1 - Configuration, filesystem or engine error

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod reactor;
mod repo;
mod report;
mod scanner;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use models::AggregatedConfig;
use reactor::{is_last_module, BuildGraph, Reactor};
use report::HandoffEngine;
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("diffcov-aggregate v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(&args) {
        error!("Aggregation failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .diffcov.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Set a diff source and thresholds before the next build.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Gate on the last module, aggregate, and hand over to the engine.
fn run(args: &Args) -> Result<()> {
    let reactor_path = args
        .reactor
        .as_deref()
        .context("--reactor is required")?;
    let current_module = args.module.as_deref().context("--module is required")?;

    let reactor = Reactor::load(reactor_path)?;
    if reactor.module(current_module).is_none() {
        warn!(
            "Module '{}' is not listed in {}",
            current_module,
            reactor_path.display()
        );
    }

    if !is_last_module(reactor.sorted_modules(), current_module) {
        info!("{} is not the last module in the build, nothing to aggregate", current_module);
        return Ok(());
    }

    let mut config = load_config(args, reactor.top_level_dir())?;
    config.merge_with_args(args);
    config.lint();

    // Handle --dry-run: assemble and print, never touch the engine
    if args.dry_run {
        let aggregated = analysis::aggregator::run(&reactor, current_module, &config)?;
        print_dry_run(&aggregated);
        return Ok(());
    }

    let engine = HandoffEngine::new(reactor.top_level_dir(), config.engine.command.clone());
    if let Some(aggregated) = analysis::execute(&reactor, current_module, &config, &engine)? {
        println!(
            "\n✅ Diff coverage input ready in {}",
            aggregated.reports().base_report_dir.display()
        );
    }

    Ok(())
}

/// Handle --dry-run output.
fn print_dry_run(aggregated: &AggregatedConfig) {
    println!("\n🔍 Dry run: aggregated configuration (report engine not invoked)\n");
    println!("   Report name: {}", aggregated.report_name());
    println!("   Diff source: {}", aggregated.diff_source());
    println!("   Output: {}", aggregated.reports().base_report_dir.display());

    let t = aggregated.thresholds();
    println!(
        "   Thresholds: lines {} | branches {} | instructions {} | fail on violation: {}",
        t.min_lines, t.min_branches, t.min_instructions, t.fail_on_violation
    );

    println!("\n   Class files ({}):", aggregated.class_files().len());
    for path in aggregated.class_files() {
        println!("     📦 {}", path.display());
    }
    println!("\n   Source dirs ({}):", aggregated.source_dirs().len());
    for path in aggregated.source_dirs() {
        println!("     📁 {}", path.display());
    }
    println!("\n   Exec files ({}):", aggregated.exec_files().len());
    for path in aggregated.exec_files() {
        println!("     📄 {}", path.display());
    }

    println!("\n✅ Dry run complete.");
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args, root_dir: &Path) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try the top-level project directory
    match Config::load_from_dir(root_dir)? {
        Some(config) => {
            info!("Loaded {} from {}", DEFAULT_CONFIG_FILE, root_dir.display());
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
