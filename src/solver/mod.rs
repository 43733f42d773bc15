//! Phase-based backtracking package solver.
//!
//! Given a list of package requests and a [`PackageRepository`], the
//! [`Resolver`] finds one variant per required family such that every
//! request, and every requirement of every chosen variant, is satisfied.
//!
//! # Algorithm
//!
//! The solve state is a [`ResolvePhase`]: one [`PackageScope`] per family,
//! each holding the candidate variants still in play. A phase repeats four
//! deductions until nothing changes:
//!
//! 1. **Extract** a requirement shared by every candidate of a scope.
//! 2. **Intersect** existing scopes with the extracted requirements.
//! 3. **Add** scopes for newly required families.
//! 4. **Reduce** each scope by dropping candidates whose requirements
//!    conflict with another scope's request.
//!
//! When no deduction applies and some scope still has several candidates,
//! the phase is exhausted and is split in two: a primary phase that tries
//! the best few candidates of one scope, and a fallback holding the rest.
//! The resolver keeps the phases on a stack and backtracks to the fallback
//! when the primary fails.
//!
//! ```rust,no_run
//! use pkgsolve::config::SolverConfig;
//! use pkgsolve::repository::MemoryRepository;
//! use pkgsolve::request::PackageRequest;
//! use pkgsolve::solver::{Resolver, SolverStatus};
//! # fn main() -> Result<(), pkgsolve::core::SolveError> {
//! let repo = MemoryRepository::load(std::path::Path::new("packages.toml"))?;
//! let requests: Vec<PackageRequest> = vec!["python-2.6".parse()?, "!pybah".parse()?];
//! let mut resolver = Resolver::new(&requests, &repo, &SolverConfig::default())?;
//! resolver.solve()?;
//! if resolver.status() == SolverStatus::Solved {
//!     for variant in resolver.resolved_packages().unwrap_or_default() {
//!         println!("{variant}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`PackageRepository`]: crate::repository::PackageRepository

pub mod dependency_graph;
pub mod graph;
pub mod phase;
pub mod resolver;
pub mod scope;
pub mod slice;
pub mod types;
pub mod variant;

pub use graph::{EdgeKind, GraphEdge, GraphNode, NodeKind, ResolveGraph};
pub use phase::ResolvePhase;
pub use resolver::{ResolveFailure, ResolveOutcome, ResolvedPackage, Resolver, SolveCallback};
pub use scope::PackageScope;
pub use slice::VariantSlice;
pub use types::{
    CallbackReturn, DependencyConflict, FailureReason, Narrowed, Reduction, SolverState, SolverStatus,
    VariantSelectMode,
};
pub use variant::{Variant, VariantCache, VariantList};

#[cfg(test)]
mod tests;
