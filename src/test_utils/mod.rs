//! Test utilities for pkgsolve
//!
//! This module provides a shared fixture repository and helpers for running
//! resolves in unit and integration tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use pkgsolve::config::SolverConfig;
//! use pkgsolve::solver::SolverStatus;
//! use pkgsolve::test_utils::{fixture_repository, solve};
//!
//! let repo = fixture_repository();
//! let (status, packages) = solve(&repo, &["pyfoo"], &SolverConfig::default());
//! assert_eq!(status, SolverStatus::Solved);
//! assert_eq!(packages, vec!["python-2.6.8[]", "pyfoo-3.1.0[]"]);
//! ```

use crate::config::SolverConfig;
use crate::repository::MemoryRepository;
use crate::request::PackageRequest;
use crate::solver::{Resolver, SolverStatus};
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has any effect. The provided level wins over
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=pkgsolve=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// Packages used across the solver tests.
///
/// `python` has four versions; `pyfoo`, `pybah` and friends depend on
/// different python ranges; `pymum`, `pydad` and `pyson` form cycles in
/// some versions; `pyvariants` has two variants.
pub const FIXTURE_REPOSITORY_TOML: &str = r#"
[[package]]
name = "nada"

[[package]]
name = "nopy"
version = "2.1"
requires = ["~python-2.6+"]

[[package]]
name = "python"
version = "2.5.2"

[[package]]
name = "python"
version = "2.6.0"

[[package]]
name = "python"
version = "2.6.8"

[[package]]
name = "python"
version = "2.7.0"

[[package]]
name = "pyfoo"
version = "3.0.0"
requires = ["python-2.5"]

[[package]]
name = "pyfoo"
version = "3.1.0"
requires = ["python-2.6"]

[[package]]
name = "pybah"
version = "4"
requires = ["python-2.6"]

[[package]]
name = "pybah"
version = "5"
requires = ["python-2.5"]

[[package]]
name = "pyodd"
version = "1"
requires = ["pyfoo"]

[[package]]
name = "pyodd"
version = "2"
requires = ["pybah"]

[[package]]
name = "bahish"
version = "1"
requires = ["pybah-4", "!python-2.6"]

[[package]]
name = "bahish"
version = "2"
requires = ["pybah-5"]

[[package]]
name = "pysplit"
version = "5"

[[package]]
name = "pysplit"
version = "6"
requires = ["python-2.6"]

[[package]]
name = "pysplit"
version = "7"
requires = ["python-2.7"]

[[package]]
name = "pyvariants"
version = "2"
variants = [["python-2.7.0"], ["python-2.6.8", "nada"]]

[[package]]
name = "pymum"
version = "1"
requires = ["pydad-1"]

[[package]]
name = "pymum"
version = "2"
requires = ["pydad-2"]

[[package]]
name = "pymum"
version = "3"
requires = ["pydad-3"]

[[package]]
name = "pydad"
version = "1"
requires = ["pyson-1"]

[[package]]
name = "pydad"
version = "2"
requires = ["pymum-3"]

[[package]]
name = "pydad"
version = "3"
requires = ["pymum-3"]

[[package]]
name = "pyson"
version = "1"
requires = ["pymum-1"]
"#;

/// The fixture repository.
///
/// # Panics
///
/// Never, unless [`FIXTURE_REPOSITORY_TOML`] is broken.
#[must_use]
pub fn fixture_repository() -> MemoryRepository {
    MemoryRepository::from_toml_str(FIXTURE_REPOSITORY_TOML).expect("fixture repository should parse")
}

/// Parse request strings.
///
/// # Panics
///
/// If any string is not a valid request.
#[must_use]
pub fn requests(items: &[&str]) -> Vec<PackageRequest> {
    items.iter().map(|s| s.parse().unwrap_or_else(|e| panic!("bad request '{s}': {e}"))).collect()
}

/// Run a full resolve and return the final status with the resolved
/// variants, dependencies first.
///
/// # Panics
///
/// If the resolver reports a run-fatal error.
#[must_use]
pub fn solve(repo: &MemoryRepository, items: &[&str], config: &SolverConfig) -> (SolverStatus, Vec<String>) {
    let requests = requests(items);
    let mut resolver =
        Resolver::new(&requests, repo, config).unwrap_or_else(|e| panic!("resolver for {items:?} failed: {e}"));
    resolver.solve().unwrap_or_else(|e| panic!("solve of {items:?} failed: {e}"));

    let packages = resolver
        .resolved_packages()
        .unwrap_or_default()
        .iter()
        .map(ToString::to_string)
        .collect();
    (resolver.status(), packages)
}
