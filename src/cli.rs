use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use invcache_matrix::Matrix;
use tracing::debug;

use crate::config::CacheConfig;
use crate::registry::SlotRegistry;
use crate::scenario::{Scenario, ScenarioReport, StepOutcome, run_scenario};
use crate::solve::{CacheSolver, Lookup};
use crate::utils::logger;

#[derive(Parser, Debug)]
#[command(name = "invcache", version, about = "Memoized matrix inversion")]
pub struct InvCacheCli {
    #[arg(long, short, global = true)]
    /// Log cache hits, misses and invalidations to stderr.
    verbose: bool,

    #[arg(long, global = true)]
    /// Emit results as JSON instead of text.
    json: bool,

    #[arg(long, global = true, value_name = "TOML")]
    /// Read cache configuration from a TOML file instead of the environment.
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl InvCacheCli {
    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replays a YAML scenario of create/set/solve steps.
    Run { path: PathBuf },
    /// Inverts the matrix stored in a YAML file (a list of rows).
    Invert { path: PathBuf },
}

pub fn run() -> Result<()> {
    let cli = InvCacheCli::parse();
    if !logger::init_logging(cli.verbose) {
        debug!("tracing subscriber already installed");
    }
    let config = load_config(cli.config.as_deref())?;
    debug!(lock_strategy = %config.lock_strategy, tolerance = config.invert.tolerance, "configuration loaded");
    let solver = CacheSolver::new(Arc::new(SlotRegistry::with_config(config)));

    match &cli.command {
        Command::Run { path } => handle_run(&cli, &solver, path),
        Command::Invert { path } => handle_invert(&cli, &solver, path),
    }
}

fn load_config(path: Option<&Path>) -> Result<CacheConfig> {
    match path {
        #[cfg(feature = "toml-config")]
        Some(path) => CacheConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        #[cfg(not(feature = "toml-config"))]
        Some(path) => anyhow::bail!(
            "cannot read {}: built without the `toml-config` feature",
            path.display()
        ),
        None => CacheConfig::from_env().context("invalid cache configuration in environment"),
    }
}

fn handle_run(cli: &InvCacheCli, solver: &CacheSolver, path: &Path) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let report = run_scenario(solver, &scenario)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn handle_invert(cli: &InvCacheCli, solver: &CacheSolver, path: &Path) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("failed to open matrix {}", path.display()))?;
    let matrix: Matrix = serde_yaml::from_reader(file)
        .with_context(|| format!("failed to parse matrix {}", path.display()))?;

    let slot = solver.create_slot(Some(matrix));
    let inverse = solver.solve(slot)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&inverse)?);
    } else {
        print!("{inverse}");
    }
    Ok(())
}

fn print_report(report: &ScenarioReport) {
    for step in &report.steps {
        let label = format!("[{}] {}", step.index, step.name);
        match &step.outcome {
            StepOutcome::Created { slot } => {
                println!("{} {label} as {slot}", "create".bold());
            }
            StepOutcome::Set { slot } => {
                println!("{} {label} ({slot} invalidated)", "set".bold());
            }
            StepOutcome::Solved {
                slot,
                lookup,
                inverse,
            } => {
                let tag = match lookup {
                    Lookup::Hit => "hit".green().bold(),
                    Lookup::Computed => "miss".yellow().bold(),
                    Lookup::Uncached => "uncached".magenta().bold(),
                    Lookup::Superseded => "superseded".cyan().bold(),
                };
                println!("{} {label} {slot} {tag}", "solve".bold());
                print!("{inverse}");
            }
            StepOutcome::Failed { slot, error } => {
                println!("{} {label} {slot} {}", "solve".bold(), error.red());
            }
        }
    }

    let metrics = &report.metrics;
    println!(
        "{} hits={} misses={} computations={} failures={} invalidations={} hit_ratio={:.2}",
        "cache".bold(),
        metrics.hits,
        metrics.misses,
        metrics.computations,
        metrics.failures,
        metrics.invalidations,
        metrics.hit_ratio()
    );
}
