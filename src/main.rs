//! unitbuild CLI
//!
//! Entry point for the `unitbuild` command-line tool.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use unitbuild::config::{parse_overrides, OverrideError, DEFAULT_CONFIG_FILE};
use unitbuild::summary::ExitCode;
use unitbuild::{
    BuildOptions, CancelToken, DryRunInvoker, Invoker, LoadOptions, ProcessInvoker, Registry, RegistryError,
    SignalHandler, Toolchain,
};

#[derive(Parser)]
#[command(name = "unitbuild")]
#[command(about = "Build every unit of a build file", version)]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and link every unit
    Build {
        /// Path to the build file (default: build.json)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Units to build concurrently (0 = one per CPU)
        #[arg(long, short = 'j', default_value_t = 1)]
        jobs: usize,

        /// Stop starting new units after the first failure
        #[arg(long)]
        fail_fast: bool,

        /// Print commands instead of running them
        #[arg(long)]
        dry_run: bool,

        /// Override a setting in every unit (e.g. flags.c=["-O0"])
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one unit's resolved configuration
    Show {
        /// Unit name
        unit: String,

        /// Path to the build file (default: build.json)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Override a setting in every unit
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Validate the build file
    Verify {
        /// Path to the build file (default: build.json)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// List unit names in build order
    List {
        /// Path to the build file (default: build.json)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logger_init(cli.verbose);

    let result = match cli.command {
        Commands::Build {
            config,
            jobs,
            fail_fast,
            dry_run,
            set,
            report,
            json,
        } => run_build(config, jobs, fail_fast, dry_run, &set, report, json),
        Commands::Show { unit, config, set } => run_show(&unit, config, &set),
        Commands::Verify { config } => run_verify(config),
        Commands::List { config } => run_list(config),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(exit_code_for(&e));
        }
    }
}

fn logger_init(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Configuration problems exit with 2, everything else with 1
fn exit_code_for(err: &anyhow::Error) -> i32 {
    let is_config = err
        .chain()
        .any(|cause| cause.is::<RegistryError>() || cause.is::<OverrideError>());
    if is_config {
        ExitCode::Config.as_i32()
    } else {
        ExitCode::UnitsFailed.as_i32()
    }
}

fn config_path(config: Option<PathBuf>) -> PathBuf {
    config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn load_registry(path: &Path, set: &[String]) -> Result<Registry> {
    let options = LoadOptions {
        overrides: parse_overrides(set)?,
        ..Default::default()
    };
    let registry = Registry::load_with(path, &options)?;
    Ok(registry)
}

fn run_build(
    config: Option<PathBuf>,
    jobs: usize,
    fail_fast: bool,
    dry_run: bool,
    set: &[String],
    report_path: Option<PathBuf>,
    json_output: bool,
) -> Result<i32> {
    let path = config_path(config);
    let mut registry = load_registry(&path, set)?;

    let cancel = CancelToken::new();
    if let Err(e) = SignalHandler::new(cancel.clone()).install() {
        warn!(error = %e, "cannot install interrupt handler");
    }

    let options = BuildOptions {
        jobs,
        fail_fast,
        cancel,
    };

    let invoker: Box<dyn Invoker> = if dry_run {
        Box::new(DryRunInvoker::new())
    } else {
        Box::new(ProcessInvoker::new())
    };

    let report = registry.build_all(invoker.as_ref(), &options);

    if let Some(report_path) = report_path {
        report
            .write_to_file(&report_path)
            .with_context(|| format!("cannot write report {}", report_path.display()))?;
    }

    if json_output {
        println!("{}", report.to_json()?);
        let failed = report.failed_units();
        if !failed.is_empty() {
            eprintln!("Failed units: {}", failed.join(", "));
        }
    } else {
        println!("{}", report.to_human());
    }

    Ok(report.exit_code)
}

fn run_show(unit_name: &str, config: Option<PathBuf>, set: &[String]) -> Result<i32> {
    let path = config_path(config);
    let registry = load_registry(&path, set)?;

    let Some(unit) = registry.unit(unit_name) else {
        eprintln!("Unit '{}' not found in {}.", unit_name, path.display());
        eprintln!("Available units: {}", registry.names().join(", "));
        return Ok(ExitCode::UnitsFailed.as_i32());
    };

    let sources = unit.sources(&registry.glob())?;

    let flags: serde_json::Map<String, serde_json::Value> = Toolchain::ALL
        .iter()
        .map(|tc| (tc.to_string(), serde_json::json!(unit.flags(*tc))))
        .collect();
    let tools: serde_json::Map<String, serde_json::Value> = Toolchain::ALL
        .iter()
        .map(|tc| (tc.to_string(), serde_json::json!(unit.tool(*tc))))
        .collect();

    let output = serde_json::json!({
        "name": unit.name(),
        "context": unit.context().to_json(),
        "flags": flags,
        "tools": tools,
        "sources": sources,
        "artifact": unitbuild::registry::unit_dir(registry.root(), unit).join(unit.output()),
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::Success.as_i32())
}

fn run_verify(config: Option<PathBuf>) -> Result<i32> {
    let path = config_path(config);
    let registry = load_registry(&path, &[])?;

    println!("Configuration valid: {}", path.display());
    println!();
    for unit in registry.units() {
        println!("  {}", unit.name());
        println!("    Sources: {}", unit.source_patterns().join(", "));
        for tc in Toolchain::ALL {
            let flags = unit.flags(tc);
            if !flags.is_empty() {
                println!("    {} flags: {}", tc, flags.join(" "));
            }
        }
        println!("    Output: {}/{}/{}", unit.build_dir(), unit.name(), unit.output());
    }
    if registry.is_empty() {
        println!("  No units defined.");
    }

    Ok(ExitCode::Success.as_i32())
}

fn run_list(config: Option<PathBuf>) -> Result<i32> {
    let path = config_path(config);
    let registry = load_registry(&path, &[])?;

    for name in registry.names() {
        println!("{}", name);
    }
    Ok(ExitCode::Success.as_i32())
}
