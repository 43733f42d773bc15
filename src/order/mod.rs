//! Package orderers.
//!
//! By default the solver tries the versions of a family newest first. An
//! orderer changes that preference for some or all families. Orderers are a
//! closed set described by [`PackageOrder`]; they are built from
//! configuration tables through an [`OrdererRegistry`].
//!
//! # Orderers
//!
//! | Type | Effect |
//! |---|---|
//! | `no_order` | keeps the repository order |
//! | `sorted` | sorts by version, ascending or descending |
//! | `per_family` | applies a different orderer per family |
//! | `version_split` | prefers versions at or below `first_version`, newest first, then the rest |
//! | `soft_timestamp` | prefers packages released before `timestamp`, optionally allowing newer versions below `rank` |
//!
//! An orderer may decline to reorder a list by returning `None`, in which
//! case the next orderer is tried and, failing all, the default descending
//! order is used. Returning the list unchanged is not the same thing: it
//! stops the search.

pub mod registry;

pub use registry::{OrdererConstructor, OrdererRegistry};

use crate::repository::PackageMetadata;
use crate::version::Version;
use std::collections::BTreeMap;
use std::fmt;

/// A rule for ordering the versions of a package family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOrder {
    /// Leave the order untouched
    NoOrder,
    /// Sort by version
    Sorted {
        /// Newest first when true
        descending: bool,
    },
    /// Per-family orderers with an optional fallback
    PerFamily {
        /// Orderer for each named family
        orderers: BTreeMap<String, PackageOrder>,
        /// Orderer for every other family
        default_order: Option<Box<PackageOrder>>,
    },
    /// Versions at or below `first_version` first
    VersionSplit {
        /// Highest preferred version
        first_version: Version,
    },
    /// Packages released before `timestamp` first
    SoftTimestamp {
        /// Cutoff, seconds since the epoch
        timestamp: u64,
        /// When non-zero, versions that differ only at this token rank or
        /// below may pass the cutoff
        rank: usize,
    },
}

impl PackageOrder {
    /// The type tag used in configuration.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NoOrder => "no_order",
            Self::Sorted { .. } => "sorted",
            Self::PerFamily { .. } => "per_family",
            Self::VersionSplit { .. } => "version_split",
            Self::SoftTimestamp { .. } => "soft_timestamp",
        }
    }

    /// Reorder the packages of one family.
    ///
    /// Returns `None` when this orderer has no opinion about the family.
    #[must_use]
    pub fn reorder(&self, packages: &[PackageMetadata]) -> Option<Vec<PackageMetadata>> {
        match self {
            Self::NoOrder => Some(packages.to_vec()),
            Self::Sorted {
                descending,
            } => {
                let mut sorted = packages.to_vec();
                sorted.sort_by(|a, b| a.version.cmp(&b.version));
                if *descending {
                    sorted.reverse();
                }
                Some(sorted)
            }
            Self::PerFamily {
                orderers,
                default_order,
            } => {
                let family = &packages.first()?.name;
                let orderer = orderers.get(family).or(default_order.as_deref())?;
                orderer.reorder(packages)
            }
            Self::VersionSplit {
                first_version,
            } => Some(version_split(packages, first_version)),
            Self::SoftTimestamp {
                timestamp,
                rank,
            } => soft_timestamp(packages, *timestamp, *rank),
        }
    }
}

fn descending(packages: &[PackageMetadata]) -> Vec<PackageMetadata> {
    let mut sorted = packages.to_vec();
    sorted.sort_by(|a, b| b.version.cmp(&a.version));
    sorted
}

fn version_split(packages: &[PackageMetadata], first_version: &Version) -> Vec<PackageMetadata> {
    let sorted = descending(packages);
    let split = sorted.iter().position(|p| p.version <= *first_version).unwrap_or(sorted.len());
    let mut ordered = sorted[split..].to_vec();
    ordered.extend_from_slice(&sorted[..split]);
    ordered
}

fn soft_timestamp(packages: &[PackageMetadata], cutoff: u64, rank: usize) -> Option<Vec<PackageMetadata>> {
    let sorted = descending(packages);

    let mut first_after = None;
    for (i, package) in sorted.iter().enumerate() {
        match package.timestamp.filter(|t| *t != 0) {
            Some(t) if t > cutoff => first_after = Some(i),
            Some(_) => break,
            None => {}
        }
    }
    let first_after = first_after?;

    let mut before = sorted[first_after + 1..].to_vec();
    let mut after: Vec<PackageMetadata> = sorted[..=first_after].iter().rev().cloned().collect();

    if rank == 0 {
        before.extend(after);
        return Some(before);
    }

    let prefix = |p: &PackageMetadata| p.version.trim(rank - 1);

    if let Some(first_before) = before.first() {
        let first_prefix = prefix(first_before);
        match after.iter().position(|p| prefix(p) != first_prefix) {
            None => return Some(sorted),
            Some(0) => {}
            Some(i) => {
                let mut moved: Vec<PackageMetadata> = after.drain(..i).rev().collect();
                moved.append(&mut before);
                before = moved;
            }
        }
    }

    let mut ordered = before;
    let mut group: Vec<PackageMetadata> = Vec::new();
    let mut group_prefix: Option<Version> = None;
    for package in after {
        let p = prefix(&package);
        if group_prefix.as_ref() != Some(&p) {
            ordered.extend(group.drain(..).rev());
            group_prefix = Some(p);
        }
        group.push(package);
    }
    ordered.extend(group.into_iter().rev());

    Some(ordered)
}

impl fmt::Display for PackageOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOrder => f.write_str("no_order"),
            Self::Sorted {
                descending,
            } => write!(f, "sorted(descending={descending})"),
            Self::PerFamily {
                orderers,
                default_order,
            } => {
                let families: Vec<String> = orderers.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "per_family({})", families.join(", "))?;
                if let Some(default) = default_order {
                    write!(f, " default {default}")?;
                }
                Ok(())
            }
            Self::VersionSplit {
                first_version,
            } => write!(f, "version_split({first_version})"),
            Self::SoftTimestamp {
                timestamp,
                rank,
            } => write!(f, "soft_timestamp({timestamp}, rank={rank})"),
        }
    }
}

/// An ordered list of orderers; the first one with an opinion wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageOrderList {
    orderers: Vec<PackageOrder>,
}

impl PackageOrderList {
    /// Create a list from orderers in priority order.
    #[must_use]
    pub const fn new(orderers: Vec<PackageOrder>) -> Self {
        Self {
            orderers,
        }
    }

    /// True if no orderers are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orderers.is_empty()
    }

    /// The orderers, in priority order.
    #[must_use]
    pub fn orderers(&self) -> &[PackageOrder] {
        &self.orderers
    }

    /// Reorder with the first orderer that has an opinion.
    #[must_use]
    pub fn reorder(&self, packages: &[PackageMetadata]) -> Option<Vec<PackageMetadata>> {
        if packages.is_empty() {
            return None;
        }
        self.orderers.iter().find_map(|o| o.reorder(packages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, version: &str) -> PackageMetadata {
        PackageMetadata::new(name, version.parse().unwrap())
    }

    fn timed(version: &str, timestamp: u64) -> PackageMetadata {
        pkg("foo", version).with_timestamp(timestamp)
    }

    fn versions(packages: &[PackageMetadata]) -> Vec<String> {
        packages.iter().map(|p| p.version.to_string()).collect()
    }

    fn family(list: &[&str]) -> Vec<PackageMetadata> {
        list.iter().map(|v| pkg("foo", v)).collect()
    }

    #[test]
    fn test_no_order() {
        let packages = family(&["2", "5", "1"]);
        assert_eq!(versions(&PackageOrder::NoOrder.reorder(&packages).unwrap()), vec!["2", "5", "1"]);
    }

    #[test]
    fn test_sorted() {
        let packages = family(&["2", "5", "1"]);
        let asc = PackageOrder::Sorted {
            descending: false,
        };
        let desc = PackageOrder::Sorted {
            descending: true,
        };
        assert_eq!(versions(&asc.reorder(&packages).unwrap()), vec!["1", "2", "5"]);
        assert_eq!(versions(&desc.reorder(&packages).unwrap()), vec!["5", "2", "1"]);
    }

    #[test]
    fn test_version_split() {
        let packages = family(&["1", "2", "3", "4", "5"]);
        let order = PackageOrder::VersionSplit {
            first_version: "3".parse().unwrap(),
        };
        assert_eq!(versions(&order.reorder(&packages).unwrap()), vec!["3", "2", "1", "5", "4"]);
    }

    #[test]
    fn test_per_family() {
        let mut orderers = BTreeMap::new();
        orderers.insert(
            "foo".to_string(),
            PackageOrder::Sorted {
                descending: false,
            },
        );
        let order = PackageOrder::PerFamily {
            orderers,
            default_order: None,
        };
        assert_eq!(versions(&order.reorder(&family(&["2", "1"])).unwrap()), vec!["1", "2"]);
        assert!(order.reorder(&[pkg("bar", "1")]).is_none());
        assert!(order.reorder(&[]).is_none());

        let with_default = PackageOrder::PerFamily {
            orderers: BTreeMap::new(),
            default_order: Some(Box::new(PackageOrder::NoOrder)),
        };
        assert!(with_default.reorder(&[pkg("bar", "1")]).is_some());
    }

    #[test]
    fn test_soft_timestamp_simple() {
        let packages = vec![timed("1", 100), timed("2", 200), timed("3", 300), timed("4", 400)];
        let order = PackageOrder::SoftTimestamp {
            timestamp: 250,
            rank: 0,
        };
        assert_eq!(versions(&order.reorder(&packages).unwrap()), vec!["2", "1", "3", "4"]);
    }

    #[test]
    fn test_soft_timestamp_all_before_cutoff() {
        let packages = vec![timed("1", 100), timed("2", 200)];
        let order = PackageOrder::SoftTimestamp {
            timestamp: 1000,
            rank: 0,
        };
        assert!(order.reorder(&packages).is_none());
    }

    #[test]
    fn test_soft_timestamp_with_rank() {
        let packages = vec![
            timed("2.2.1", 800),
            timed("2.2.0", 700),
            timed("2.1.1", 600),
            timed("2.1.0", 500),
            timed("2.0.6", 400),
            timed("2.0.5", 300),
            timed("2.0.0", 200),
            timed("1.9.0", 100),
        ];
        let order = PackageOrder::SoftTimestamp {
            timestamp: 250,
            rank: 3,
        };
        assert_eq!(
            versions(&order.reorder(&packages).unwrap()),
            vec!["2.0.6", "2.0.5", "2.0.0", "1.9.0", "2.1.1", "2.1.0", "2.2.1", "2.2.0"]
        );
    }

    #[test]
    fn test_soft_timestamp_rank_within_prefix() {
        let packages = vec![timed("1.0.2", 300), timed("1.0.1", 200), timed("1.0.0", 100)];
        let order = PackageOrder::SoftTimestamp {
            timestamp: 150,
            rank: 3,
        };
        assert_eq!(versions(&order.reorder(&packages).unwrap()), vec!["1.0.2", "1.0.1", "1.0.0"]);
    }

    #[test]
    fn test_order_list_first_opinion_wins() {
        let list = PackageOrderList::new(vec![
            PackageOrder::PerFamily {
                orderers: BTreeMap::new(),
                default_order: None,
            },
            PackageOrder::Sorted {
                descending: false,
            },
        ]);
        assert_eq!(versions(&list.reorder(&family(&["2", "1"])).unwrap()), vec!["1", "2"]);
        assert!(PackageOrderList::default().reorder(&family(&["1"])).is_none());
    }
}
