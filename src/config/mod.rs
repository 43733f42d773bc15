//! Solver configuration.
//!
//! Settings are read from a TOML file; every key is optional.
//!
//! ```toml
//! variant_select_mode = "version_priority"   # or "intersection_priority"
//! optimised = true
//! max_fails = 50
//! time_limit_secs = 10.0
//! prune_unfailed = true
//!
//! [[package_orderers]]
//! type = "version_split"
//! packages = ["python"]
//! first_version = "2.6.0"
//! ```
//!
//! `package_orderers` are kept as raw tables until
//! [`SolverConfig::orderers`] builds them through an
//! [`OrdererRegistry`], so custom orderer types can be registered before the
//! configuration is interpreted.

use crate::core::SolveError;
use crate::order::{OrdererRegistry, PackageOrderList};
use crate::solver::VariantSelectMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const fn default_true() -> bool {
    true
}

/// Tunable solver behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverConfig {
    /// How variants within one package version are ranked.
    #[serde(default)]
    pub variant_select_mode: VariantSelectMode,

    /// Track which scope pairs need reducing instead of re-checking every
    /// pair each round. Results are identical either way.
    #[serde(default = "default_true")]
    pub optimised: bool,

    /// Stop once this many phases have failed. Unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fails: Option<usize>,

    /// Wall-clock budget for one solve, in seconds. Unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<f64>,

    /// Drop nodes unrelated to the failure from failure graphs.
    #[serde(default = "default_true")]
    pub prune_unfailed: bool,

    /// Package orderer tables, in priority order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_orderers: Vec<toml::Table>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            variant_select_mode: VariantSelectMode::default(),
            optimised: true,
            max_fails: None,
            time_limit_secs: None,
            prune_unfailed: true,
            package_orderers: Vec::new(),
        }
    }
}

impl SolverConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::ParseError`] for malformed TOML or unknown keys,
    /// and [`SolveError::ConfigError`] for out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self, SolveError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// As [`Self::from_toml_str`], plus [`SolveError::IoError`] if the file
    /// cannot be read.
    pub fn load(path: &Path) -> Result<Self, SolveError> {
        let content = std::fs::read_to_string(path).map_err(|e| SolveError::IoError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            SolveError::ParseError {
                reason, ..
            } => SolveError::ParseError {
                file: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::ConfigError`] for a negative or non-finite time
    /// limit.
    pub fn validate(&self) -> Result<(), SolveError> {
        match self.time_limit_secs {
            Some(secs) if !secs.is_finite() || secs < 0.0 => Err(SolveError::ConfigError {
                message: format!("time_limit_secs must be a non-negative number, got {secs}"),
            }),
            _ => Ok(()),
        }
    }

    /// The time budget as a [`Duration`].
    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.filter(|s| s.is_finite() && *s >= 0.0).map(Duration::from_secs_f64)
    }

    /// Build the configured orderers.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::ConfigError`] for any table the registry cannot
    /// build.
    pub fn orderers(&self, registry: &OrdererRegistry) -> Result<PackageOrderList, SolveError> {
        registry.build_list(&self.package_orderers)
    }
}
