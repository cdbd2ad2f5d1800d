/*
 * collective-check: report collective calls that may not be reached by
 * every participant.
 *
 * Usage:
 *   collective-check module.json
 *   collective-check module.json --config analysis.yaml --format json
 *   collective-check module.json --preset thorough --stats --dot graph.dot
 *
 * Exit codes:
 *   0  analysis ran (no warnings, or warnings without --fail-on-warning)
 *   1  warnings found and --fail-on-warning given
 *   2  input, configuration or output error
 */

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use codegraph_collective::config::{Preset, TaintMode};
use codegraph_collective::{AnalysisConfig, AnalysisReport, AnalysisSession, Module, Paradigm};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "collective-check", version, about = "Detect collective divergence")]
struct Args {
    /// Module to analyze (JSON)
    module: PathBuf,

    /// YAML analysis configuration (version 1 schema)
    #[arg(short, long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Configuration preset: fast, balanced, thorough
    #[arg(long, value_parser = Preset::from_str)]
    preset: Option<Preset>,

    /// Restrict to the given paradigm (repeatable)
    #[arg(long = "paradigm", value_parser = Paradigm::from_str)]
    paradigms: Vec<Paradigm>,

    /// Taint propagation mode
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Report every conditional collective, ignoring data flow
    #[arg(long)]
    disable_dataflow: bool,

    /// Keep equivalent memory phis
    #[arg(long)]
    no_phi_elimination: bool,

    /// Only flag conditions whose branches run different collective sequences
    #[arg(long)]
    sequence_filter: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print analysis statistics
    #[arg(long)]
    stats: bool,

    /// Write the dependency graph in DOT format
    #[arg(long)]
    dot: Option<PathBuf>,

    /// Exit with status 1 when warnings are found
    #[arg(long)]
    fail_on_warning: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Context-insensitive
    Ci,
    /// Context-sensitive
    Cs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);

    match run(&args) {
        Ok(report) if args.fail_on_warning && report.has_warnings() => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> codegraph_collective::Result<AnalysisConfig> {
    let mut config = match (&args.config, args.preset) {
        (Some(path), _) => AnalysisConfig::from_yaml(path)?,
        (None, Some(preset)) => AnalysisConfig::preset(preset),
        (None, None) => AnalysisConfig::default(),
    };
    if !args.paradigms.is_empty() {
        config = config.paradigms(args.paradigms.clone());
    }
    if let Some(mode) = args.mode {
        let mode = match mode {
            ModeArg::Ci => TaintMode::ContextInsensitive,
            ModeArg::Cs => TaintMode::ContextSensitive,
        };
        config = config.taint(|t| t.mode(mode));
    }
    if args.disable_dataflow {
        config = config.taint(|t| t.disable_dataflow(true));
    }
    if args.no_phi_elimination {
        config = config.dep_graph(|d| d.phi_elimination(false));
    }
    if args.sequence_filter {
        config = config.detector(|d| d.sequence_filter(true));
    }
    Ok(config)
}

fn run(args: &Args) -> codegraph_collective::Result<AnalysisReport> {
    let module = Module::from_json_path(&args.module)?;
    let config = load_config(args)?;
    let registry = config.registry();
    info!(module = %module.name, config = %config.describe(), "starting analysis");

    let session = AnalysisSession::new(&module, config, registry)?;
    let report = session.report();

    if let Some(path) = &args.dot {
        std::fs::write(path, session.dep_graph_dot())?;
        info!(path = %path.display(), "dependency graph written");
    }

    match args.format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => print_text(&report, args.stats),
    }
    Ok(report)
}

fn print_text(report: &AnalysisReport, stats: bool) {
    for warning in &report.warnings {
        println!("{warning}");
        for step in &warning.trace {
            println!("    {step}");
        }
    }
    for advisory in &report.loop_advisories {
        println!("{advisory}");
    }
    if report.warnings.is_empty() {
        println!("{}: no collective divergence found", report.module);
    }
    if stats {
        println!();
        println!("{}", report.stats.summary());
    }
}
