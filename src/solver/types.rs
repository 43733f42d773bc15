//! Public types for solver state and failure reporting.

use crate::request::{PackageRequest, VersionedObject};
use crate::version::{Version, VersionRange};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How variants of the same package version are ranked before a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantSelectMode {
    /// Prefer the variant whose requested families have the highest versions,
    /// then the one adding the fewest extra families.
    #[default]
    VersionPriority,

    /// Prefer the variant sharing the most families with the request, then
    /// fall back to version priority.
    IntersectionPriority,
}

/// Status of a phase, or of the resolver as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    /// The solve has not yet started
    Pending,

    /// Every scope holds exactly one variant
    Solved,

    /// No further deduction is possible without a split
    Exhausted,

    /// The phase (or the whole solve) cannot succeed
    Failed,

    /// Solved, but the chosen packages depend on each other in a cycle
    Cyclic,

    /// The solve has started but is not finished
    Unsolved,
}

impl SolverStatus {
    /// Snake-case name, as used in dumps and JSON output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Solved => "solved",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
            Self::Cyclic => "cyclic",
            Self::Unsolved => "unsolved",
        }
    }

    /// Human-readable explanation of the status.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Pending => "The solve has not yet started.",
            Self::Solved => "The solve has completed successfully.",
            Self::Exhausted => "The current solve is exhausted and must be split to continue further.",
            Self::Failed => "The solve is not possible.",
            Self::Cyclic => "The solve contains a cycle.",
            Self::Unsolved => "The solve has started, but is not yet solved.",
        }
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a solve callback wants the resolver to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackReturn {
    /// Continue solving
    KeepGoing,

    /// Stop solving; the resolver stays unsolved
    Abort(String),

    /// Stop solving and report the most recent failure. Ignored while no
    /// phase has failed yet.
    Fail(String),
}

/// Snapshot handed to the solve callback after each step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverState {
    /// Solve steps executed so far
    pub num_solves: usize,
    /// Failed phases so far
    pub num_fails: usize,
    /// Summary of the most recent phase that has not failed
    pub phase: String,
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "solve #{} ({} fails so far): {}", self.num_solves, self.num_fails, self.phase)
    }
}

/// Result of narrowing an immutable value.
///
/// Narrowing operations never modify their receiver. They report whether
/// anything changed so callers can keep sharing the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narrowed<T> {
    /// Nothing was removed
    Unchanged,
    /// Some, but not all, candidates were removed
    Changed(T),
    /// Every candidate was removed
    Empty,
}

impl<T> Narrowed<T> {
    /// Apply `f` to a changed value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Narrowed<U> {
        match self {
            Self::Unchanged => Narrowed::Unchanged,
            Self::Changed(value) => Narrowed::Changed(f(value)),
            Self::Empty => Narrowed::Empty,
        }
    }

    /// True for [`Narrowed::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// True for [`Narrowed::Unchanged`].
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// A request pinned to the versions `from_version(version)` describes.
pub(crate) fn version_request(name: &str, version: &Version) -> PackageRequest {
    let range = VersionRange::from_version(version, None)
        .unwrap_or_else(|_| VersionRange::from_versions(std::iter::once(version)));
    PackageRequest::new(name, range)
}

/// A variant removed because one of its requirements conflicts with another
/// scope's request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    /// Family of the removed variant
    pub name: String,
    /// Version of the removed variant
    pub version: Version,
    /// Index of the removed variant, if the package has variants
    pub variant_index: Option<usize>,
    /// The variant's requirement that conflicted
    pub dependency: PackageRequest,
    /// The request it conflicted with
    pub conflicting_request: PackageRequest,
}

impl Reduction {
    /// `name-version[index]`, or `name-version[]` without variants.
    #[must_use]
    pub fn reducee_str(&self) -> String {
        let object = VersionedObject::new(self.name.clone(), self.version.clone());
        match self.variant_index {
            Some(index) => format!("{object}[{index}]"),
            None => format!("{object}[]"),
        }
    }

    /// The removed package, its dependency and the conflicting request.
    #[must_use]
    pub fn involved_requirements(&self) -> Vec<PackageRequest> {
        vec![
            version_request(&self.name, &self.version),
            self.dependency.clone(),
            self.conflicting_request.clone(),
        ]
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --> {} <--!--> {}", self.reducee_str(), self.dependency, self.conflicting_request)
    }
}

/// A dependency common to a whole scope that conflicts with another request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyConflict {
    /// The merged dependency
    pub dependency: PackageRequest,
    /// The request it conflicts with
    pub conflicting_request: PackageRequest,
}

impl DependencyConflict {
    /// Pair a dependency with the request it conflicts with.
    #[must_use]
    pub const fn new(dependency: PackageRequest, conflicting_request: PackageRequest) -> Self {
        Self {
            dependency,
            conflicting_request,
        }
    }
}

impl fmt::Display for DependencyConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <--!--> {}", self.dependency, self.conflicting_request)
    }
}

/// Why a phase failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Every variant of one scope was reduced away
    TotalReduction(Vec<Reduction>),

    /// Requests that cannot both hold
    DependencyConflicts(Vec<DependencyConflict>),

    /// The solved packages depend on each other in a cycle
    Cycle(Vec<VersionedObject>),

    /// A family added during the phase has no matching package
    PackageNotFound(PackageRequest),
}

impl FailureReason {
    /// One-line description, prefixed with the kind of failure.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::TotalReduction(_) => format!("A package was completely reduced: {self}"),
            Self::DependencyConflicts(_) => format!("The following package conflicts occurred: {self}"),
            Self::Cycle(_) => format!("A cyclic dependency was detected: {self}"),
            Self::PackageNotFound(_) => format!("Package could not be found: {self}"),
        }
    }

    /// Requests that took part in the failure.
    #[must_use]
    pub fn involved_requirements(&self) -> Vec<PackageRequest> {
        match self {
            Self::TotalReduction(reductions) => {
                reductions.iter().flat_map(Reduction::involved_requirements).collect()
            }
            Self::DependencyConflicts(conflicts) => conflicts
                .iter()
                .flat_map(|c| [c.dependency.clone(), c.conflicting_request.clone()])
                .collect(),
            Self::Cycle(packages) => packages.iter().map(|p| version_request(p.name(), p.version())).collect(),
            Self::PackageNotFound(request) => vec![request.clone()],
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TotalReduction(reductions) => {
                let parts: Vec<String> = reductions.iter().map(|r| format!("({r})")).collect();
                f.write_str(&parts.join(" "))
            }
            Self::DependencyConflicts(conflicts) => {
                let parts: Vec<String> = conflicts.iter().map(|c| format!("({c})")).collect();
                f.write_str(&parts.join(" "))
            }
            Self::Cycle(packages) => {
                let mut parts: Vec<String> = packages.iter().map(ToString::to_string).collect();
                if let Some(first) = packages.first() {
                    parts.push(first.to_string());
                }
                f.write_str(&parts.join(" --> "))
            }
            Self::PackageNotFound(request) => write!(f, "{request}"),
        }
    }
}
