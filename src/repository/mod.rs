//! Package metadata sources.
//!
//! The solver never fetches or builds anything. It asks a
//! [`PackageRepository`] for the packages of a family and works from the
//! returned [`PackageMetadata`]. The repository is queried at most once per
//! family per solve.
//!
//! [`MemoryRepository`] is the bundled implementation. It can be filled in
//! code or loaded from a TOML file:
//!
//! ```toml
//! [[package]]
//! name = "pyfoo"
//! version = "3.1.0"
//! requires = ["python-2.6"]
//!
//! [[package]]
//! name = "pyvariants"
//! version = "2"
//! variants = [["python-2.7.0"], ["python-2.6.8", "nada"]]
//! timestamp = 1400000000
//! ```

use crate::core::SolveError;
use crate::request::PackageRequest;
use crate::version::{Version, VersionRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Metadata for one version of one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Family name
    pub name: String,
    /// Package version; empty for unversioned packages
    #[serde(default)]
    pub version: Version,
    /// Where the package lives, reported back in resolve results
    #[serde(default = "default_location")]
    pub location: String,
    /// Requirements shared by every variant
    #[serde(default)]
    pub requires: Vec<PackageRequest>,
    /// Per-variant requirements, in declaration order
    #[serde(default)]
    pub variants: Vec<Vec<PackageRequest>>,
    /// Release time in seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

fn default_location() -> String {
    "memory".to_string()
}

impl PackageMetadata {
    /// Create metadata for `name-version` with no requirements.
    #[must_use]
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            location: default_location(),
            requires: Vec::new(),
            variants: Vec::new(),
            timestamp: None,
        }
    }

    /// Builder-style setter for the shared requirements.
    #[must_use]
    pub fn with_requires(mut self, requires: Vec<PackageRequest>) -> Self {
        self.requires = requires;
        self
    }

    /// Builder-style setter for the variant requirements.
    #[must_use]
    pub fn with_variants(mut self, variants: Vec<Vec<PackageRequest>>) -> Self {
        self.variants = variants;
        self
    }

    /// Builder-style setter for the release timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Builder-style setter for the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// `name-version`, or just the name when unversioned.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.version.is_empty() {
            self.name.clone()
        } else {
            format!("{}-{}", self.name, self.version)
        }
    }
}

/// A source of package metadata.
pub trait PackageRepository {
    /// Every family the repository knows about.
    fn family_names(&self) -> Vec<String>;

    /// The packages of `family` whose version lies in `range`, in any order.
    ///
    /// An unknown family yields an empty list; the caller decides whether
    /// that is an error.
    ///
    /// # Errors
    ///
    /// Implementations return [`SolveError::RepositoryError`] when the
    /// underlying store cannot be read.
    fn packages(&self, family: &str, range: &VersionRange) -> Result<Vec<PackageMetadata>, SolveError>;
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryFile {
    #[serde(default)]
    package: Vec<PackageMetadata>,
}

/// An in-memory package repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    families: BTreeMap<String, Vec<PackageMetadata>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package. A package with the same name and version replaces the
    /// existing one.
    pub fn add(&mut self, package: PackageMetadata) {
        let packages = self.families.entry(package.name.clone()).or_default();
        packages.retain(|p| p.version != package.version);
        packages.push(package);
    }

    /// Number of packages across all families.
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.values().map(Vec::len).sum()
    }

    /// True if the repository holds no packages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Parse a repository from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::ParseError`] for malformed TOML, including bad
    /// versions or requests inside it.
    pub fn from_toml_str(content: &str) -> Result<Self, SolveError> {
        let file: RepositoryFile = toml::from_str(content)?;
        let mut repo = Self::new();
        for package in file.package {
            repo.add(package);
        }
        Ok(repo)
    }

    /// Load a repository file.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::IoError`] if the file cannot be read and
    /// [`SolveError::ParseError`] if it is not a valid repository.
    pub fn load(path: &Path) -> Result<Self, SolveError> {
        let content = std::fs::read_to_string(path).map_err(|e| SolveError::IoError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let repo = Self::from_toml_str(&content).map_err(|e| match e {
            SolveError::ParseError {
                reason, ..
            } => SolveError::ParseError {
                file: path.display().to_string(),
                reason,
            },
            other => other,
        })?;
        debug!("Loaded {} packages from {}", repo.len(), path.display());
        Ok(repo)
    }
}

impl PackageRepository for MemoryRepository {
    fn family_names(&self) -> Vec<String> {
        self.families.keys().cloned().collect()
    }

    fn packages(&self, family: &str, range: &VersionRange) -> Result<Vec<PackageMetadata>, SolveError> {
        Ok(self
            .families
            .get(family)
            .map(|packages| packages.iter().filter(|p| range.contains_version(&p.version)).cloned().collect())
            .unwrap_or_default())
    }
}
