//! Merged request lists.

use super::PackageRequest;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A list of requests reduced to one merged request per family.
///
/// Requests are folded left to right. The first pair that cannot be merged
/// stops the fold and is kept as the list's conflict; a conflicted list has
/// no requirements. Family order is the order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct PackageRequestList {
    requirements: Vec<PackageRequest>,
    by_name: BTreeMap<String, PackageRequest>,
    names: BTreeSet<String>,
    conflict_names: BTreeSet<String>,
    conflict: Option<(PackageRequest, PackageRequest)>,
}

impl PackageRequestList {
    /// Merge `requests` into a list.
    #[must_use]
    pub fn new<'a>(requests: impl IntoIterator<Item = &'a PackageRequest>) -> Self {
        let mut order: Vec<&str> = Vec::new();
        let mut by_name: BTreeMap<String, PackageRequest> = BTreeMap::new();

        for request in requests {
            match by_name.get(request.name()) {
                Some(existing) => match existing.merged(request) {
                    Some(merged) => {
                        by_name.insert(request.name().to_string(), merged);
                    }
                    None => {
                        return Self {
                            conflict: Some((existing.clone(), request.clone())),
                            ..Self::default()
                        };
                    }
                },
                None => {
                    order.push(request.name());
                    by_name.insert(request.name().to_string(), request.clone());
                }
            }
        }

        let requirements: Vec<PackageRequest> =
            order.iter().filter_map(|name| by_name.get(*name).cloned()).collect();

        let (conflicts, positives): (Vec<&PackageRequest>, Vec<&PackageRequest>) =
            requirements.iter().partition(|r| r.conflict());

        Self {
            names: positives.iter().map(|r| r.name().to_string()).collect(),
            conflict_names: conflicts.iter().map(|r| r.name().to_string()).collect(),
            requirements,
            by_name,
            conflict: None,
        }
    }

    /// Merged requests in family first-appearance order; empty on conflict.
    #[must_use]
    pub fn requirements(&self) -> &[PackageRequest] {
        &self.requirements
    }

    /// The first pair of requests that could not be merged.
    #[must_use]
    pub fn conflict(&self) -> Option<&(PackageRequest, PackageRequest)> {
        self.conflict.as_ref()
    }

    /// The merged request for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PackageRequest> {
        self.by_name.get(name)
    }

    /// Families with a positive merged request.
    #[must_use]
    pub const fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Families with a conflict merged request.
    #[must_use]
    pub const fn conflict_names(&self) -> &BTreeSet<String> {
        &self.conflict_names
    }

    /// Iterate over the merged requests.
    pub fn iter(&self) -> std::slice::Iter<'_, PackageRequest> {
        self.requirements.iter()
    }

    /// True if there are no requests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Number of merged requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requirements.len()
    }
}

impl PartialEq for PackageRequestList {
    fn eq(&self, other: &Self) -> bool {
        self.by_name == other.by_name && self.conflict == other.conflict
    }
}

impl Eq for PackageRequestList {}

impl<'a> IntoIterator for &'a PackageRequestList {
    type Item = &'a PackageRequest;
    type IntoIter = std::slice::Iter<'a, PackageRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for PackageRequestList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((a, b)) = &self.conflict {
            return write!(f, "{a} <--!--> {b}");
        }
        for (i, request) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{request}")?;
        }
        Ok(())
    }
}
