//! pkgsolve - version range algebra and a backtracking package solver
//!
//! Given a set of package requests (`python-2.6`, `!pybah`, `~nada-1+`) and a
//! repository of packages, each with a version, requirements and optional
//! variants, the solver picks one variant per required package family so that
//! every request and every requirement of every chosen variant holds.
//!
//! # Core Modules
//!
//! ## Version Algebra
//! - [`version`] - Versions, bounds and ranges with union, intersection,
//!   inverse and containment
//! - [`request`] - Package requests and merged request lists
//!
//! ## Solving
//! - [`repository`] - The package repository trait and an in-memory, TOML
//!   loaded implementation
//! - [`order`] - Package orderers that change which versions are tried first
//! - [`solver`] - Phases, scopes, the resolver loop and diagnostic graphs
//!
//! ## Supporting Modules
//! - [`config`] - Solver configuration
//! - [`core`] - Error types and user-facing error context
//! - [`cli`] - The `pkgsolve` command line
//!
//! # Request Syntax
//!
//! ```text
//! python            any version of python
//! python-2.6        python 2.6 or any 2.6.x
//! python-2.6+<3     python from 2.6 up to, not including, 3
//! python==2.6       exactly 2.6
//! !python-2.7       no python 2.7 (python is not required)
//! ~python-2.6+      if python is used, it must be 2.6 or later
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use pkgsolve::config::SolverConfig;
//! use pkgsolve::repository::MemoryRepository;
//! use pkgsolve::solver::{ResolveOutcome, Resolver};
//!
//! # fn main() -> anyhow::Result<()> {
//! let repo = MemoryRepository::load(std::path::Path::new("packages.toml"))?;
//! let requests = vec!["pyfoo".parse()?, "!python-2.6.8".parse()?];
//! let mut resolver = Resolver::new(&requests, &repo, &SolverConfig::default())?;
//! resolver.solve()?;
//!
//! match resolver.outcome(false)? {
//!     ResolveOutcome::Solved { packages } => {
//!         for package in packages {
//!             println!("{package}");
//!         }
//!     }
//!     ResolveOutcome::Failed(failure) => eprintln!("{}", failure.description),
//! }
//! # Ok(())
//! # }
//! ```

// Version algebra
pub mod request;
pub mod version;

// Solving
pub mod order;
pub mod repository;
pub mod solver;

// Supporting modules
pub mod cli;
pub mod config;
pub mod core;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
