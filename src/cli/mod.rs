//! Command-line interface for pkgsolve.
//!
//! # Available Commands
//!
//! - `resolve` - Resolve a list of package requests against a repository file
//! - `range` - Print the canonical form of a version range and test versions
//!   against it
//!
//! # Examples
//!
//! ```bash
//! # Resolve two requests
//! pkgsolve resolve --repo packages.toml python-2.6 '!pybah'
//!
//! # Machine-readable result and a diagnostic graph
//! pkgsolve resolve --repo packages.toml --json --graph graph.json pyfoo
//!
//! # Range algebra
//! pkgsolve range '3+<5|1' 1 4.2 6
//! ```
//!
//! # Logging
//!
//! Logging goes to stderr through `tracing-subscriber`. `RUST_LOG` wins when
//! set; otherwise `--verbose` enables debug output, `--quiet` turns logging
//! off, and the default shows warnings only.

pub mod range;
pub mod resolve;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Runtime settings derived from the global flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Log filter used when `RUST_LOG` is not set. `None` disables logging.
    pub log_level: Option<String>,
}

impl CliConfig {
    /// Create a configuration with logging disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log filter.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// The filter to install, if any.
    #[must_use]
    pub fn env_filter(&self) -> Option<EnvFilter> {
        if std::env::var("RUST_LOG").is_ok() {
            return Some(EnvFilter::from_default_env());
        }
        self.log_level.as_deref().map(EnvFilter::new)
    }

    /// Install the global tracing subscriber.
    ///
    /// Only the first call in a process has an effect.
    pub fn init_logging(&self) {
        if let Some(filter) = self.env_filter() {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init();
        }
    }
}

/// Phase-based backtracking package solver.
#[derive(Parser, Debug)]
#[command(
    name = "pkgsolve",
    about = "Resolve package requests against a package repository",
    version,
    author
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging of every solver operation.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Disable logging.
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve package requests.
    Resolve(resolve::ResolveCommand),

    /// Show a canonical version range and test versions against it.
    Range(range::RangeCommand),
}

impl Cli {
    /// Execute the parsed command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails, including an unsuccessful
    /// resolve.
    pub fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(&config)
    }

    /// Build a [`CliConfig`] from the global flags.
    ///
    /// ```rust,ignore
    /// let cli = Cli::parse_from(["pkgsolve", "--verbose", "range", "1+"]);
    /// assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));
    /// ```
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        if self.verbose {
            CliConfig::new().with_log_level("debug")
        } else if self.quiet {
            CliConfig::new()
        } else {
            CliConfig::new().with_log_level("warn")
        }
    }

    /// Execute with an explicit configuration.
    ///
    /// # Errors
    ///
    /// As [`Self::execute`].
    pub fn execute_with_config(self, config: &CliConfig) -> Result<()> {
        config.init_logging();

        match self.command {
            Commands::Resolve(cmd) => cmd.execute(),
            Commands::Range(cmd) => cmd.execute(),
        }
    }
}
