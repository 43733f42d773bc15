//! Common test utilities for pkgsolve integration tests
//!
//! Resolve assertions check a request list three ways: with the optimised
//! solver, with the unoptimised solver, and with every ordering of the
//! requests.

// Allow dead code because these utilities are used across different test files
// and not all utilities are used in every test file
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use pkgsolve::config::SolverConfig;
use pkgsolve::repository::MemoryRepository;
use pkgsolve::solver::{FailureReason, Resolver, SolverStatus};
use pkgsolve::test_utils::{FIXTURE_REPOSITORY_TOML, fixture_repository, requests, solve};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Solver fixture: the shared repository plus a configuration.
pub struct SolverFixture {
    pub repo: MemoryRepository,
    pub config: SolverConfig,
}

impl SolverFixture {
    /// Fixture repository with the default configuration
    pub fn new() -> Self {
        pkgsolve::test_utils::init_test_logging(None);
        Self {
            repo: fixture_repository(),
            config: SolverConfig::default(),
        }
    }

    /// Same fixture with another configuration
    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    /// A repository of its own, written as `[[package]]` tables
    pub fn with_repository(repo_toml: &str) -> Self {
        Self {
            repo: MemoryRepository::from_toml_str(repo_toml).expect("test repository should parse"),
            ..Self::new()
        }
    }

    fn unoptimised(&self) -> SolverConfig {
        SolverConfig {
            optimised: false,
            ..self.config.clone()
        }
    }

    /// Assert that `reqs` resolve to `expected`, dependencies first.
    pub fn assert_solve(&self, reqs: &[&str], expected: &[&str]) {
        let (status, packages) = solve(&self.repo, reqs, &self.config);
        assert_eq!(status, SolverStatus::Solved, "{reqs:?} should solve");
        assert_eq!(packages, expected, "resolve of {reqs:?}");

        let (status, unoptimised) = solve(&self.repo, reqs, &self.unoptimised());
        assert_eq!(status, SolverStatus::Solved, "{reqs:?} should solve unoptimised");
        assert_eq!(unoptimised, packages, "unoptimised resolve of {reqs:?}");

        for order in permutations(reqs) {
            let (status, _) = solve(&self.repo, &order, &self.config);
            assert_eq!(status, SolverStatus::Solved, "{order:?} should solve");
        }
    }

    /// Assert that `reqs` fail, for the same reason with or without
    /// optimisation, and return that reason.
    pub fn assert_fail(&self, reqs: &[&str]) -> FailureReason {
        let reason = self.fail_reason(reqs, &self.config);
        let unoptimised = self.fail_reason(reqs, &self.unoptimised());
        assert_eq!(unoptimised, reason, "unoptimised failure of {reqs:?}");

        for order in permutations(reqs) {
            let (status, _) = solve(&self.repo, &order, &self.config);
            assert_eq!(status, SolverStatus::Failed, "{order:?} should fail");
        }
        reason
    }

    fn fail_reason(&self, reqs: &[&str], config: &SolverConfig) -> FailureReason {
        let requests = requests(reqs);
        let mut resolver = Resolver::new(&requests, &self.repo, config).unwrap();
        resolver.solve().unwrap();
        assert_eq!(resolver.status(), SolverStatus::Failed, "{reqs:?} should fail:\n{}", resolver.dump());
        resolver.failure_reason(None).unwrap().clone()
    }
}

/// Every ordering of `items`.
pub fn permutations<'a>(items: &[&'a str]) -> Vec<Vec<&'a str>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut result = Vec::new();
    for (i, first) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, *first);
            result.push(tail);
        }
    }
    result
}

/// A temporary directory holding repository and configuration files for
/// running the binary.
pub struct TestProject {
    _temp_dir: TempDir, // Keep alive for RAII cleanup
    project_dir: PathBuf,
}

impl TestProject {
    /// Create a project with the fixture repository in `packages.toml`
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let project_dir = temp_dir.path().to_path_buf();
        fs::write(project_dir.join("packages.toml"), FIXTURE_REPOSITORY_TOML)
            .context("Failed to write fixture repository")?;
        Ok(Self {
            _temp_dir: temp_dir,
            project_dir,
        })
    }

    /// Get the project directory path
    pub fn project_path(&self) -> &Path {
        &self.project_dir
    }

    /// Path of the repository file
    pub fn repo_path(&self) -> PathBuf {
        self.project_dir.join("packages.toml")
    }

    /// Write a file relative to the project directory
    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.project_dir.join(name);
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// The binary, run from the project directory without colors
    pub fn pkgsolve(&self) -> Command {
        let mut cmd = Command::cargo_bin("pkgsolve").expect("pkgsolve binary should be built");
        cmd.current_dir(&self.project_dir).env("NO_COLOR", "1").env_remove("RUST_LOG");
        cmd
    }

    /// `pkgsolve resolve --repo packages.toml`, ready for more arguments
    pub fn resolve(&self) -> Command {
        let mut cmd = self.pkgsolve();
        cmd.arg("resolve").arg("--repo").arg(self.repo_path());
        cmd
    }
}
