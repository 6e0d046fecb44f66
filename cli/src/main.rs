use std::fs;
use std::path::{Path, PathBuf};

use catalog_merge_core::{
    CONFIG_OWNER, Model, RunAction, RunActions, RunReport, Severity, check_valid_crn_service_name,
    convert_composite_to_canonical, is_name_canonical, make_canonical_name, make_comparable_name,
    parse_composite_name, run,
};
use catalog_merge_db::{RunConfig, RunManifest, SourceLoader};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for reports and name listings.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum CliOutputFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "catalog-merge")]
#[command(about = "Reconcile cloud service and environment catalog entries")]
#[command(version)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(long, global = true)]
    debug: bool,
    /// Prefix log lines with timestamps.
    #[arg(long, global = true)]
    log_timestamps: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load source snapshots, run every phase and write the report.
    Merge(MergeArgs),
    /// Show how names normalize.
    Names(NamesArgs),
    /// Load and validate a run configuration file.
    CheckConfig(CheckConfigArgs),
    /// List inputs that changed between two run manifests.
    DiffManifest(DiffManifestArgs),
}

#[derive(Debug, Args)]
struct MergeArgs {
    /// Snapshot files and/or directories containing snapshot files.
    #[arg(long = "input", required = true)]
    inputs: Vec<PathBuf>,
    /// Run configuration YAML.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Report path (stdout if omitted).
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t)]
    format: CliOutputFormat,
    /// Write a run manifest to this path.
    #[arg(long)]
    manifest: Option<PathBuf>,
    /// Enable a run action in addition to those in the config (rmc, doctor-disabled).
    #[arg(long = "run-action")]
    run_actions: Vec<RunAction>,
    /// Exit with status 2 if any counted issue is at least this severe.
    #[arg(long)]
    fail_on: Option<Severity>,
}

#[derive(Debug, Args)]
struct NamesArgs {
    #[arg(required = true)]
    names: Vec<String>,
    #[arg(long, value_enum, default_value_t)]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct CheckConfigArgs {
    path: PathBuf,
}

#[derive(Debug, Args)]
struct DiffManifestArgs {
    old: PathBuf,
    new: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.log_timestamps);

    let result = match cli.command {
        Command::Merge(args) => run_merge(args),
        Command::Names(args) => run_names(args),
        Command::CheckConfig(args) => run_check_config(args),
        Command::DiffManifest(args) => run_diff_manifest(args),
    };

    match result {
        Ok(Outcome::Clean) => {}
        Ok(Outcome::ThresholdExceeded(severity)) => {
            eprintln!("error: report contains {severity} issues");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

/// Successful command results that still affect the exit status.
enum Outcome {
    Clean,
    ThresholdExceeded(Severity),
}

fn init_tracing(debug: bool, timestamps: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}

fn format_output<T: Serialize>(value: &T, format: CliOutputFormat) -> Result<String, String> {
    match format {
        CliOutputFormat::Json => serde_json::to_string_pretty(value)
            .map(|mut raw| {
                raw.push('\n');
                raw
            })
            .map_err(|e| format!("Failed to serialize output: {e}")),
        CliOutputFormat::Yaml => {
            serde_yaml::to_string(value).map_err(|e| format!("Failed to serialize output: {e}"))
        }
    }
}

fn write_output(path: &Path, raw: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }
    fs::write(path, raw).map_err(|err| format!("Failed to write '{}': {err}", path.display()))
}

// ---------------------------------------------------------------------------
// merge command
// ---------------------------------------------------------------------------

fn run_merge(args: MergeArgs) -> Result<Outcome, String> {
    let config = match &args.config {
        Some(path) => RunConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => RunConfig::default(),
    };
    let options = config.run_options_with(args.run_actions.iter().copied());
    debug!(run_actions = ?options.run_actions, "resolved run options");

    let loader = SourceLoader::from_paths(&args.inputs).map_err(|e| e.to_string())?;
    let files = loader.files().to_vec();

    let mut model = Model::new();
    let mut conflicts = model.register_do_not_merge(
        CONFIG_OWNER,
        options.do_not_merge.iter().map(String::as_str),
    );
    conflicts.extend(model.ingest(loader.into_bundle()));
    for conflict in &conflicts {
        warn!(%conflict, "do-not-merge registry conflict");
    }

    let report = run(&mut model, &options).map_err(|e| e.to_string())?;
    info!(
        services = report.services.len(),
        environments = report.environments.len(),
        tombstones = report.tombstones.len(),
        info = report.counts.info,
        warning = report.counts.warning,
        severe = report.counts.severe,
        critical = report.counts.critical,
        suppressed = report.counts.suppressed,
        "merge complete"
    );

    let raw = format_output(&report, args.format)?;
    match &args.output {
        Some(path) => write_output(path, &raw)?,
        None => print!("{raw}"),
    }

    if let Some(path) = &args.manifest {
        let manifest = build_manifest(&files, &options.run_actions, &report)?;
        manifest
            .save(path)
            .map_err(|e| format!("Failed to write '{}': {e}", path.display()))?;
        info!(path = %path.display(), inputs = manifest.inputs.len(), "wrote run manifest");
    }

    Ok(match (args.fail_on, report.max_severity()) {
        (Some(threshold), Some(max)) if max >= threshold => Outcome::ThresholdExceeded(max),
        _ => Outcome::Clean,
    })
}

fn build_manifest(
    files: &[PathBuf],
    run_actions: &RunActions,
    report: &RunReport,
) -> Result<RunManifest, String> {
    let mut manifest = RunManifest::new(PACKAGE_VERSION);
    manifest.run_actions = run_actions.iter().collect();
    for file in files {
        manifest
            .record_input(file)
            .map_err(|e| format!("Failed to checksum '{}': {e}", file.display()))?;
    }
    manifest.record_report(report).map_err(|e| e.to_string())?;
    Ok(manifest)
}

// ---------------------------------------------------------------------------
// names command
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct NameReport {
    name: String,
    canonical: String,
    is_canonical: bool,
    comparable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    composite_parent: Option<String>,
    reference_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    crn_error: Option<String>,
}

impl NameReport {
    fn new(name: &str) -> Self {
        let (reference_name, _) = convert_composite_to_canonical(name);
        Self {
            name: name.to_string(),
            canonical: make_canonical_name(name),
            is_canonical: is_name_canonical(name),
            comparable: make_comparable_name(name),
            composite_parent: parse_composite_name(name).map(|c| c.base.to_string()),
            crn_error: check_valid_crn_service_name(&reference_name)
                .err()
                .map(|e| e.to_string()),
            reference_name,
        }
    }
}

fn run_names(args: NamesArgs) -> Result<Outcome, String> {
    let reports: Vec<NameReport> = args.names.iter().map(|name| NameReport::new(name)).collect();
    print!("{}", format_output(&reports, args.format)?);
    Ok(Outcome::Clean)
}

// ---------------------------------------------------------------------------
// check-config / diff-manifest commands
// ---------------------------------------------------------------------------

fn run_check_config(args: CheckConfigArgs) -> Result<Outcome, String> {
    let config = RunConfig::load(&args.path)
        .map_err(|e| format!("Invalid config '{}': {e}", args.path.display()))?;
    let actions: Vec<String> = config.run_actions.iter().map(ToString::to_string).collect();
    println!(
        "Config '{}' is valid: run actions [{}], {} do-not-merge name(s), min severity {}.",
        args.path.display(),
        actions.join(", "),
        config.do_not_merge.len(),
        config.report.min_severity
    );
    Ok(Outcome::Clean)
}

fn run_diff_manifest(args: DiffManifestArgs) -> Result<Outcome, String> {
    let load = |path: &PathBuf| {
        RunManifest::load(path)
            .map_err(|e| format!("Failed to load manifest '{}': {e}", path.display()))
    };
    let old = load(&args.old)?;
    let new = load(&args.new)?;

    let changed = old.changed_inputs(&new);
    for path in &changed {
        println!("changed: {path}");
    }
    if old.run_actions != new.run_actions {
        println!("run actions differ");
    }
    if old.report_digest == new.report_digest {
        println!("Reports are identical ({} changed input(s)).", changed.len());
    } else {
        println!("Reports differ ({} changed input(s)).", changed.len());
    }
    Ok(Outcome::Clean)
}
