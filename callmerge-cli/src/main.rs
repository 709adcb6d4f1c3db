//! # callmerge - Gene-Call Reconciliation Pipeline
//!
//! Command-line driver for reconciling gene callers and running checkpointed
//! multi-genome pipelines.
//!
//! ## Usage
//!
//! ```bash
//! # Run every genome of a run file up to the last configured stage
//! callmerge run -c run.json
//!
//! # Reconcile caller outputs for one genome
//! callmerge reconcile --call prodigal=prodigal.gff --call glimmer=glimmer.predict \
//!     --policy consensus --tolerance 5 -o phiX.reconciled.tsv
//!
//! # Show each genome's checkpoint
//! callmerge status -c run.json
//! ```
//!
//! ## Options
//!
//! - `-v, --verbose`: More log output (repeat for trace)
//! - `-q, --quiet`: Errors only
//!
//! `RUST_LOG` overrides both flags.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use callmerge_core::adapters::{CallerAdapter, RawFormat};
use callmerge_core::databases::FilesystemVerifier;
use callmerge_core::output::write_reconciled;
use callmerge_core::pipeline::{CancellationToken, CheckpointStore, CommandHooks, Pipeline};
use callmerge_core::types::{Caller, GeneCallSet, GenomeDescriptor};
use callmerge_core::{CallPolicy, MatchTolerance, OutputFormat, Reconciler, RunConfig};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .required(true)
        .help("JSON run file");

    Command::new("callmerge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reconcile competing gene-call sets and run checkpointed genome pipelines")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("More log output (-vv for trace)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .conflicts_with("verbose")
                .help("Only log errors"),
        )
        .subcommand(
            Command::new("run")
                .about("Run every configured genome up to the last configured stage")
                .arg(config_arg.clone()),
        )
        .subcommand(
            Command::new("reconcile")
                .about("Reconcile caller outputs for a single genome")
                .arg(
                    Arg::new("call")
                        .long("call")
                        .value_name("CALLER=FILE")
                        .action(ArgAction::Append)
                        .required(true)
                        .help("Caller output, repeat in priority order (e.g. prodigal=calls.gff)"),
                )
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .value_name("NAME")
                        .default_value("genome")
                        .help("Genome name written into the output"),
                )
                .arg(
                    Arg::new("policy")
                        .short('p')
                        .long("policy")
                        .value_name("POLICY")
                        .default_value("consensus")
                        .help("consensus, superset, commoncore, custom or a caller name"),
                )
                .arg(
                    Arg::new("tolerance")
                        .short('t')
                        .long("tolerance")
                        .value_name("N")
                        .default_value("0")
                        .help("Boundary tolerance"),
                )
                .arg(
                    Arg::new("tolerance-mode")
                        .long("tolerance-mode")
                        .value_name("MODE")
                        .default_value("bases")
                        .help("Tolerance unit: bases or percent"),
                )
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_name("FORMAT")
                        .default_value("tsv")
                        .help("Output format: tsv, gff"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Output file (default: stdout)"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show the recorded stage of every configured genome")
                .arg(config_arg),
        )
}

fn init_logging(matches: &ArgMatches) {
    let level = if matches.get_flag("quiet") {
        "error"
    } else {
        match matches.get_count("verbose") {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn string_arg<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str, Box<dyn std::error::Error>> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| format!("missing --{id}").into())
}

fn load_config(matches: &ArgMatches) -> Result<RunConfig, Box<dyn std::error::Error>> {
    Ok(RunConfig::from_path(Path::new(string_arg(matches, "config")?))?)
}

fn parse_call(value: &str) -> Result<(Caller, PathBuf), Box<dyn std::error::Error>> {
    let (caller, path) = value
        .split_once('=')
        .ok_or_else(|| format!("--call expects CALLER=FILE, got '{value}'"))?;
    Ok((caller.parse()?, PathBuf::from(path)))
}

fn run_pipeline(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(matches)?;
    let hooks = CommandHooks::new(config.commands.clone());
    let pipeline = Pipeline::new(
        &config,
        &hooks,
        &hooks,
        &FilesystemVerifier,
        CancellationToken::new(),
    )?;
    let summary = pipeline.run()?;
    print!("{summary}");

    let failed = summary.failures().count();
    if failed > 0 {
        return Err(format!("{failed} of {} genomes failed", summary.genomes.len()).into());
    }
    Ok(())
}

fn reconcile_calls(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let policy: CallPolicy = string_arg(matches, "policy")?.parse()?;
    let tolerance_value: f64 = string_arg(matches, "tolerance")?
        .parse()
        .map_err(|_| "--tolerance must be a number")?;
    let tolerance = MatchTolerance::from_parts(tolerance_value, string_arg(matches, "tolerance-mode")?)?;
    let format: OutputFormat = string_arg(matches, "format")?.parse()?;

    let mut priority = Vec::new();
    let mut sets: HashMap<Caller, GeneCallSet> = HashMap::new();
    for value in matches.get_many::<String>("call").into_iter().flatten() {
        let (caller, path) = parse_call(value)?;
        let set = CallerAdapter::new(caller, RawFormat::detect(caller, &path))
            .load(&path)
            .map_err(|e| format!("{}: {e}", path.display()))?;
        priority.push(caller);
        sets.insert(caller, set);
    }

    let name = string_arg(matches, "name")?;
    let genome = GenomeDescriptor::new(name, "", "", "");
    let result = Reconciler::new(priority, tolerance)?.reconcile(&genome, &sets, policy)?;

    let mut writer: Box<dyn Write> = if let Some(output_file) = matches.get_one::<String>("output") {
        Box::new(BufWriter::new(File::create(output_file)?))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };
    write_reconciled(&mut writer, &result.calls, format)?;
    writer.flush()?;

    info!(
        calls = result.calls.len(),
        rejected = result.total_rejected(),
        "reconciliation complete"
    );
    Ok(())
}

fn show_status(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(matches)?;
    let store = CheckpointStore::open(&config.checkpoint_dir)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "#genome\tstage\tupdated")?;
    for genome in &config.genomes {
        match store.record(&genome.name)? {
            Some(record) => writeln!(
                out,
                "{}\t{}\t{}",
                genome.name,
                record.stage,
                record.updated_at.to_rfc3339()
            )?,
            None => writeln!(out, "{}\tPENDING\t-", genome.name)?,
        }
    }
    Ok(())
}

/// Main entry point for the callmerge CLI.
///
/// Returns an error (non-zero exit) on configuration problems and when any
/// genome of a run fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();
    init_logging(&matches);

    match matches.subcommand() {
        Some(("run", sub)) => run_pipeline(sub),
        Some(("reconcile", sub)) => reconcile_calls(sub),
        Some(("status", sub)) => show_status(sub),
        _ => Err("no subcommand given".into()),
    }
}
