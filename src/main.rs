//! scriptfilter - Main Entry Point
//!
//! Runs a synthetic test-pattern stream through a script filter node and
//! prints the run statistics as JSON on stdout. Logs go to stderr.

mod cli;

use anyhow::{bail, Context};
use clap::Parser;
use cli::Cli;
use scriptfilter::{
    bridge::BridgeState,
    config::{default_config_path, BridgeConfig, FilterOptions, FrameErrorPolicy, OPTIONS},
    pipeline::{FilterStats, PipelineBuilder, ScriptFilterNode, TestPatternSource},
    types::Rational,
};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// JSON document printed after a run.
#[derive(Debug, Serialize)]
struct RunSummary {
    module: String,
    frames_sourced: u64,
    frames_processed: u64,
    frames_delivered: u64,
    elapsed_ms: u128,
    final_state: BridgeState,
    stats: FilterStats,
    error: Option<String>,
}

fn load_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    if let Some(ref spec) = cli.options {
        let options = FilterOptions::parse(spec).context("Invalid --options")?;
        return Ok(BridgeConfig::new(options));
    }
    if let Some(ref path) = cli.config {
        return BridgeConfig::load(path).context("Failed to load config");
    }
    match BridgeConfig::load_default()? {
        Some(config) => {
            tracing::info!("Using config from {:?}", default_config_path());
            Ok(config)
        }
        None => bail!("No configuration: pass --options or --config"),
    }
}

fn print_options() {
    println!("scriptfilter options:");
    for option in OPTIONS {
        let required = if option.required { " (required)" } else { "" };
        println!("  {:<16} {}{}", option.name, option.help, required);
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,scriptfilter=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if cli.list_options {
        print_options();
        return Ok(());
    }

    let mut config = load_config(&cli)?;
    if !cli.module_paths.is_empty() {
        let mut paths = cli.module_paths.clone();
        paths.append(&mut config.engine.module_paths);
        config.engine.module_paths = paths;
    }
    if cli.fail_on_error {
        config.engine.on_frame_error = FrameErrorPolicy::Fail;
    }

    tracing::info!(
        "Running {} frames of {}x{} @ {} fps through module '{}'",
        cli.frames,
        cli.width,
        cli.height,
        cli.fps,
        config.filter.module
    );

    let source = TestPatternSource::new(cli.width, cli.height, Rational::from_fps(cli.fps))
        .with_frame_count(cli.frames);
    let node = ScriptFilterNode::from_config(&config);

    let report = PipelineBuilder::new()
        .build(source, node)
        .run(|_frame| {})
        .context("Script filter failed to start")?;

    let summary = RunSummary {
        module: config.filter.module.clone(),
        frames_sourced: report.frames_sourced,
        frames_processed: report.frames_processed,
        frames_delivered: report.frames_delivered,
        elapsed_ms: report.elapsed.as_millis(),
        final_state: report.node.state(),
        stats: report.node.stats().clone(),
        error: report.error.as_ref().map(ToString::to_string),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(e) = report.error {
        return Err(e).context("Script filter stopped early");
    }
    Ok(())
}
