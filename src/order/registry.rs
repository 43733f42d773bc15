//! Construction of orderers from configuration tables.
//!
//! Each orderer type is registered under its `type` tag with a constructor
//! function. The registry is an ordinary value: build it once with
//! [`OrdererRegistry::with_builtin`], add custom constructors if needed, and
//! pass it by reference to whatever loads configuration.
//!
//! ```toml
//! [[package_orderers]]
//! type = "version_split"
//! packages = ["python"]
//! first_version = "2.6.0"
//!
//! [[package_orderers]]
//! type = "per_family"
//! orderers = [{ type = "sorted", descending = false, packages = ["foo"] }]
//! default_order = { type = "no_order" }
//! ```
//!
//! A top-level entry with a `packages` list only applies to those families.

use super::{PackageOrder, PackageOrderList};
use crate::core::SolveError;
use crate::version::Version;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::debug;

/// Builds one orderer from its configuration table (without the `type` and
/// `packages` keys).
pub type OrdererConstructor = fn(&toml::Table, &OrdererRegistry) -> Result<PackageOrder, SolveError>;

/// Table of orderer constructors keyed by type tag.
#[derive(Debug, Clone, Default)]
pub struct OrdererRegistry {
    constructors: BTreeMap<String, OrdererConstructor>,
}

#[derive(Deserialize)]
struct SortedFields {
    descending: bool,
}

#[derive(Deserialize)]
struct VersionSplitFields {
    first_version: Version,
}

#[derive(Deserialize)]
struct SoftTimestampFields {
    timestamp: u64,
    #[serde(default)]
    rank: usize,
}

#[derive(Deserialize)]
struct PerFamilyFields {
    orderers: Vec<toml::Table>,
    #[serde(default)]
    default_order: Option<toml::Table>,
}

fn fields<T: DeserializeOwned>(kind: &str, table: &toml::Table) -> Result<T, SolveError> {
    toml::Value::Table(table.clone()).try_into().map_err(|e: toml::de::Error| SolveError::ConfigError {
        message: format!("invalid '{kind}' orderer: {e}"),
    })
}

fn build_no_order(_: &toml::Table, _: &OrdererRegistry) -> Result<PackageOrder, SolveError> {
    Ok(PackageOrder::NoOrder)
}

fn build_sorted(table: &toml::Table, _: &OrdererRegistry) -> Result<PackageOrder, SolveError> {
    let f: SortedFields = fields("sorted", table)?;
    Ok(PackageOrder::Sorted {
        descending: f.descending,
    })
}

fn build_version_split(table: &toml::Table, _: &OrdererRegistry) -> Result<PackageOrder, SolveError> {
    let f: VersionSplitFields = fields("version_split", table)?;
    Ok(PackageOrder::VersionSplit {
        first_version: f.first_version,
    })
}

fn build_soft_timestamp(table: &toml::Table, _: &OrdererRegistry) -> Result<PackageOrder, SolveError> {
    let f: SoftTimestampFields = fields("soft_timestamp", table)?;
    Ok(PackageOrder::SoftTimestamp {
        timestamp: f.timestamp,
        rank: f.rank,
    })
}

fn build_per_family(table: &toml::Table, registry: &OrdererRegistry) -> Result<PackageOrder, SolveError> {
    let f: PerFamilyFields = fields("per_family", table)?;

    let mut orderers = BTreeMap::new();
    for entry in &f.orderers {
        let families = packages_of(entry)?.ok_or_else(|| SolveError::ConfigError {
            message: "every 'per_family' entry needs a 'packages' list".to_string(),
        })?;
        let orderer = registry.build(entry)?;
        for family in families {
            orderers.insert(family, orderer.clone());
        }
    }

    let default_order = f.default_order.as_ref().map(|t| registry.build(t)).transpose()?.map(Box::new);

    Ok(PackageOrder::PerFamily {
        orderers,
        default_order,
    })
}

fn packages_of(table: &toml::Table) -> Result<Option<Vec<String>>, SolveError> {
    table
        .get("packages")
        .map(|value| {
            value.clone().try_into::<Vec<String>>().map_err(|e| SolveError::ConfigError {
                message: format!("'packages' must be a list of family names: {e}"),
            })
        })
        .transpose()
}

impl OrdererRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in orderer type.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("no_order", build_no_order);
        registry.register("sorted", build_sorted);
        registry.register("per_family", build_per_family);
        registry.register("version_split", build_version_split);
        registry.register("soft_timestamp", build_soft_timestamp);
        registry
    }

    /// Register a constructor under `name`, replacing any existing one.
    pub fn register(&mut self, name: impl Into<String>, constructor: OrdererConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    /// Registered type tags.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Build the orderer a table describes. `packages` is ignored here.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::ConfigError`] for a missing or unknown `type`,
    /// or fields the orderer type does not accept.
    pub fn build(&self, table: &toml::Table) -> Result<PackageOrder, SolveError> {
        let kind = table.get("type").and_then(toml::Value::as_str).ok_or_else(|| SolveError::ConfigError {
            message: "orderer entry is missing a 'type' string".to_string(),
        })?;

        let constructor = self.constructors.get(kind).ok_or_else(|| SolveError::ConfigError {
            message: format!("unknown orderer type '{kind}' (known: {})", self.names().join(", ")),
        })?;

        let mut rest = table.clone();
        rest.remove("type");
        rest.remove("packages");
        constructor(&rest, self)
    }

    /// Build a top-level orderer list. Entries with a `packages` list only
    /// apply to those families.
    ///
    /// # Errors
    ///
    /// Fails on the first entry that cannot be built.
    pub fn build_list(&self, tables: &[toml::Table]) -> Result<PackageOrderList, SolveError> {
        let mut orderers = Vec::with_capacity(tables.len());
        for table in tables {
            let orderer = self.build(table)?;
            let orderer = match packages_of(table)? {
                Some(families) => PackageOrder::PerFamily {
                    orderers: families.into_iter().map(|f| (f, orderer.clone())).collect(),
                    default_order: None,
                },
                None => orderer,
            };
            debug!("Configured package orderer: {}", orderer);
            orderers.push(orderer);
        }
        Ok(PackageOrderList::new(orderers))
    }
}
