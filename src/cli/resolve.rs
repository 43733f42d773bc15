//! Resolve package requests against a repository file.
//!
//! The repository is a TOML file of `[[package]]` tables; solver settings
//! come from an optional TOML configuration file and can be overridden on the
//! command line.
//!
//! ```bash
//! pkgsolve resolve --repo packages.toml pyfoo '!python-2.6.8'
//! pkgsolve resolve --repo packages.toml --config solver.toml --max-fails 10 pybah
//! pkgsolve resolve --repo packages.toml --graph failure.dot nopy python-2.5
//! ```
//!
//! A failed or aborted resolve exits with status 1.

use crate::config::SolverConfig;
use crate::repository::MemoryRepository;
use crate::request::PackageRequest;
use crate::solver::{ResolveGraph, ResolveOutcome, Resolver};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Resolve requests and print the result.
#[derive(Args, Debug)]
pub struct ResolveCommand {
    /// Package repository file
    #[arg(short, long)]
    repo: PathBuf,

    /// Solver configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many failed phases
    #[arg(long)]
    max_fails: Option<usize>,

    /// Stop after this many seconds
    #[arg(long)]
    time_limit: Option<f64>,

    /// Write the resolve graph to this file (Graphviz for `.dot`, JSON otherwise)
    #[arg(long)]
    graph: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Requests such as `python-2.6`, `!pybah` or `~nada-1+`
    #[arg(required = true)]
    requests: Vec<String>,
}

impl ResolveCommand {
    /// Run the resolve.
    ///
    /// # Errors
    ///
    /// Returns an error if an input cannot be loaded or parsed, if the
    /// resolver hits a run-fatal error, or if no solution was found.
    pub fn execute(self) -> Result<()> {
        let config = self.solver_config()?;
        let repo = MemoryRepository::load(&self.repo)
            .with_context(|| format!("Failed to load repository {}", self.repo.display()))?;
        let requests = self
            .requests
            .iter()
            .map(|s| s.parse::<PackageRequest>().with_context(|| format!("Invalid request '{s}'")))
            .collect::<Result<Vec<_>>>()?;

        let mut resolver = Resolver::new(&requests, &repo, &config)?;
        resolver.solve()?;
        tracing::debug!("final state:\n{}", resolver.dump());

        if let Some(path) = &self.graph {
            write_graph(&resolver.get_graph()?, path)?;
        }

        let outcome = resolver.outcome(false)?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            print_outcome(&resolver, &outcome);
        }

        match outcome {
            ResolveOutcome::Solved {
                ..
            } => Ok(()),
            ResolveOutcome::Failed(failure) => Err(anyhow::anyhow!(
                "Resolve {} after {} step(s): {}",
                failure.status,
                resolver.num_solves(),
                first_line(&failure.description)
            )),
        }
    }

    fn solver_config(&self) -> Result<SolverConfig> {
        let mut config = match &self.config {
            Some(path) => SolverConfig::load(path)
                .with_context(|| format!("Failed to load solver configuration {}", path.display()))?,
            None => SolverConfig::default(),
        };
        if self.max_fails.is_some() {
            config.max_fails = self.max_fails;
        }
        if self.time_limit.is_some() {
            config.time_limit_secs = self.time_limit;
        }
        config.validate()?;
        Ok(config)
    }
}

fn print_outcome(resolver: &Resolver<'_>, outcome: &ResolveOutcome) {
    match outcome {
        ResolveOutcome::Solved {
            packages,
        } => {
            println!(
                "{} {} package(s) in {} step(s), {} failure(s)",
                "Resolved".green().bold(),
                packages.len(),
                resolver.num_solves(),
                resolver.num_fails()
            );
            for package in packages {
                println!("  {package}");
            }
        }
        ResolveOutcome::Failed(failure) => {
            println!("{} ({})", "Resolve failed".red().bold(), failure.status);
            println!("{}", failure.description);
            if !failure.rejected_phases.is_empty() {
                println!();
                println!("{}", "Rejected phases:".yellow());
                for phase in &failure.rejected_phases {
                    println!("  {phase}");
                }
            }
        }
    }
}

fn write_graph(graph: &ResolveGraph, path: &Path) -> Result<()> {
    let content = if path.extension().is_some_and(|ext| ext == "dot") { graph.to_dot() } else { graph.to_json()? };
    std::fs::write(path, content).with_context(|| format!("Failed to write graph to {}", path.display()))?;
    tracing::info!("wrote resolve graph to {}", path.display());
    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
