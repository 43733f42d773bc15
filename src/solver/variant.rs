//! Package variants and the per-family variant cache.
//!
//! A package version with no declared variants contributes a single variant
//! without an index. A package with variants contributes one variant per
//! entry, each requiring the package's own requirements followed by the
//! entry's.
//!
//! The repository is asked for a family's packages once per resolver run.
//! Variants are built the first time a version falls inside a requested
//! range, so a malformed package only fails a solve that actually reaches it.

use super::slice::VariantSlice;
use crate::core::SolveError;
use crate::order::PackageOrderList;
use crate::repository::{PackageMetadata, PackageRepository};
use crate::request::{PackageRequest, PackageRequestList, VersionedObject};
use crate::version::{Version, VersionRange};
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strsim::levenshtein;
use tracing::{debug, trace};

/// Maximum edit distance, as a percentage of the name length, for a family
/// to be suggested in a not-found error.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// One installable shape of a package version.
#[derive(Debug, Clone)]
pub struct Variant {
    name: String,
    version: Version,
    location: String,
    requires: PackageRequestList,
    index: Option<usize>,
}

impl Variant {
    /// Create a variant from its requirements.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::InternalConflict`] if the requirements cannot
    /// be merged.
    pub fn new(
        name: impl Into<String>,
        version: Version,
        location: impl Into<String>,
        requires: &[PackageRequest],
        index: Option<usize>,
    ) -> Result<Self, SolveError> {
        let variant = Self {
            name: name.into(),
            version,
            location: location.into(),
            requires: PackageRequestList::new(requires),
            index,
        };

        if let Some((first, second)) = variant.requires.conflict() {
            return Err(SolveError::InternalConflict {
                variant: variant.to_string(),
                conflict: format!("{first} <--!--> {second}"),
            });
        }
        Ok(variant)
    }

    /// Family name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package version.
    #[must_use]
    pub const fn version(&self) -> &Version {
        &self.version
    }

    /// Where the package lives.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Index within the package's variants, `None` for packages without
    /// variants.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.index
    }

    /// Merged requirements.
    #[must_use]
    pub const fn requires(&self) -> &PackageRequestList {
        &self.requires
    }

    /// The merged requirement on `family`, if any.
    #[must_use]
    pub fn get(&self, family: &str) -> Option<&PackageRequest> {
        self.requires.get(family)
    }

    /// Families this variant positively requires.
    #[must_use]
    pub const fn request_fams(&self) -> &BTreeSet<String> {
        self.requires.names()
    }

    /// Families this variant places conflict requests on.
    #[must_use]
    pub const fn conflict_request_fams(&self) -> &BTreeSet<String> {
        self.requires.conflict_names()
    }

    /// `name-version` of this variant.
    #[must_use]
    pub fn versioned_object(&self) -> VersionedObject {
        VersionedObject::new(self.name.clone(), self.version.clone())
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version && self.index == other.index
    }
}

impl Eq for Variant {}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{index}]", self.versioned_object()),
            None => write!(f, "{}[]", self.versioned_object()),
        }
    }
}

fn expand_variants(package: &PackageMetadata) -> Result<Vec<Arc<Variant>>, SolveError> {
    if package.variants.is_empty() {
        let variant =
            Variant::new(package.name.clone(), package.version.clone(), package.location.clone(), &package.requires, None)?;
        return Ok(vec![Arc::new(variant)]);
    }

    package
        .variants
        .iter()
        .enumerate()
        .map(|(index, extra)| {
            let requires: Vec<PackageRequest> = package.requires.iter().chain(extra).cloned().collect();
            Variant::new(package.name.clone(), package.version.clone(), package.location.clone(), &requires, Some(index))
                .map(Arc::new)
        })
        .collect()
}

#[derive(Debug)]
struct VariantEntry {
    package: PackageMetadata,
    variants: OnceCell<Vec<Arc<Variant>>>,
}

impl VariantEntry {
    fn variants(&self) -> Result<&[Arc<Variant>], SolveError> {
        if self.variants.get().is_none() {
            let built = expand_variants(&self.package)?;
            trace!("Loaded {} variant(s) of {}", built.len(), self.package.qualified_name());
            let _ = self.variants.set(built);
        }
        Ok(self.variants.get().map(Vec::as_slice).unwrap_or_default())
    }
}

/// Every package of one family, in preference order.
///
/// The default order is version-descending. A configured orderer may
/// replace it, in which case range tests fall back to per-entry checks.
#[derive(Debug)]
pub struct VariantList {
    family: String,
    entries: Vec<VariantEntry>,
    descending: bool,
}

impl VariantList {
    /// Order `packages` and wrap them in a list.
    #[must_use]
    pub fn new(family: impl Into<String>, packages: Vec<PackageMetadata>, orderers: &PackageOrderList) -> Self {
        let (packages, descending) = match orderers.reorder(&packages) {
            Some(ordered) => (ordered, false),
            None => {
                let mut sorted = packages;
                sorted.sort_by(|a, b| b.version.cmp(&a.version));
                (sorted, true)
            }
        };

        Self {
            family: family.into(),
            entries: packages
                .into_iter()
                .map(|package| VariantEntry {
                    package,
                    variants: OnceCell::new(),
                })
                .collect(),
            descending,
        }
    }

    /// Family name.
    #[must_use]
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Number of package versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the family has no packages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the list is in plain version-descending order.
    #[must_use]
    pub const fn is_descending(&self) -> bool {
        self.descending
    }

    /// Versions in list order.
    #[must_use]
    pub fn versions(&self) -> Vec<&Version> {
        self.entries.iter().map(|e| &e.package.version).collect()
    }

    /// The variants of every package whose version lies in `range`, in list
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::InternalConflict`] if a matching package has
    /// conflicting requirements.
    pub fn intersection(&self, range: &VersionRange) -> Result<Vec<Arc<Variant>>, SolveError> {
        let mut variants = Vec::new();
        if self.descending {
            for entry in range.iter_intersecting(self.entries.iter(), |e| &e.package.version, true) {
                variants.extend_from_slice(entry.variants()?);
            }
        } else {
            for entry in self.entries.iter().filter(|e| range.contains_version(&e.package.version)) {
                variants.extend_from_slice(entry.variants()?);
            }
        }
        Ok(variants)
    }
}

/// Lazily loaded variant lists, one per family.
pub struct VariantCache<'r> {
    repository: &'r dyn PackageRepository,
    orderers: PackageOrderList,
    lists: RefCell<BTreeMap<String, Rc<VariantList>>>,
    load_time: Cell<Duration>,
}

impl<'r> VariantCache<'r> {
    /// Create an empty cache over `repository`.
    #[must_use]
    pub fn new(repository: &'r dyn PackageRepository, orderers: PackageOrderList) -> Self {
        Self {
            repository,
            orderers,
            lists: RefCell::new(BTreeMap::new()),
            load_time: Cell::new(Duration::ZERO),
        }
    }

    /// The variant list of `family`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::PackageFamilyNotFound`] if the repository has no
    /// packages for the family, or the repository's own error.
    pub fn variant_list(&self, family: &str) -> Result<Rc<VariantList>, SolveError> {
        if let Some(list) = self.lists.borrow().get(family) {
            return Ok(Rc::clone(list));
        }

        let start = Instant::now();
        let packages = self.repository.packages(family, &VersionRange::any())?;
        if packages.is_empty() {
            return Err(SolveError::PackageFamilyNotFound {
                family: family.to_string(),
                similar: self.similar_families(family),
            });
        }

        let list = Rc::new(VariantList::new(family, packages, &self.orderers));
        debug!("Loaded {} package(s) of family {}", list.len(), family);
        self.lists.borrow_mut().insert(family.to_string(), Rc::clone(&list));
        self.load_time.set(self.load_time.get() + start.elapsed());
        Ok(list)
    }

    /// A slice of the variants of `family` within `range`, or `None` if no
    /// package matches.
    ///
    /// # Errors
    ///
    /// As [`Self::variant_list`], plus [`SolveError::InternalConflict`] for
    /// a matching package with conflicting requirements.
    pub fn get_variant_slice(&self, family: &str, range: &VersionRange) -> Result<Option<VariantSlice>, SolveError> {
        let list = self.variant_list(family)?;
        let start = Instant::now();
        let variants = list.intersection(range)?;
        self.load_time.set(self.load_time.get() + start.elapsed());

        if variants.is_empty() {
            return Ok(None);
        }
        Ok(Some(VariantSlice::new(family, variants, list.is_descending())))
    }

    /// Time spent loading packages and building variants.
    #[must_use]
    pub fn load_time(&self) -> Duration {
        self.load_time.get()
    }

    /// Families loaded so far.
    #[must_use]
    pub fn loaded_families(&self) -> Vec<String> {
        self.lists.borrow().keys().cloned().collect()
    }

    fn similar_families(&self, family: &str) -> Vec<String> {
        let mut scored: Vec<(String, usize)> = self
            .repository
            .family_names()
            .into_iter()
            .map(|name| {
                let distance = levenshtein(family, &name);
                (name, distance)
            })
            .collect();

        scored.sort_by_key(|(_, distance)| *distance);

        scored
            .into_iter()
            .filter(|(_, distance)| *distance <= family.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
            .take(3)
            .map(|(name, _)| name)
            .collect()
    }
}

impl fmt::Debug for VariantCache<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantCache")
            .field("families", &self.loaded_families())
            .field("orderers", &self.orderers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::PackageOrder;
    use crate::repository::MemoryRepository;

    fn req(s: &str) -> PackageRequest {
        s.parse().unwrap()
    }

    fn repo() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        for v in ["2.5.2", "2.6.0", "2.6.8", "2.7.0"] {
            repo.add(PackageMetadata::new("python", v.parse().unwrap()));
        }
        repo.add(
            PackageMetadata::new("pyvariants", "2".parse().unwrap())
                .with_requires(vec![req("nada")])
                .with_variants(vec![vec![req("python-2.7.0")], vec![req("python-2.6.8")]]),
        );
        repo.add(PackageMetadata::new("broken", "1".parse().unwrap()).with_requires(vec![req("foo-1"), req("foo-2")]));
        repo.add(PackageMetadata::new("broken", "2".parse().unwrap()));
        repo
    }

    #[test]
    fn test_variant_display_and_accessors() {
        let plain = Variant::new("nada", Version::empty(), "memory", &[], None).unwrap();
        assert_eq!(plain.to_string(), "nada[]");

        let indexed = Variant::new("foo", "1.0".parse().unwrap(), "/pkgs", &[req("bar-2"), req("!baz")], Some(1)).unwrap();
        assert_eq!(indexed.to_string(), "foo-1.0[1]");
        assert_eq!(indexed.location(), "/pkgs");
        assert!(indexed.request_fams().contains("bar"));
        assert!(indexed.conflict_request_fams().contains("baz"));
        assert_eq!(indexed.get("bar").unwrap().to_string(), "bar-2");
    }

    #[test]
    fn test_internal_conflict() {
        let result = Variant::new("foo", "1".parse().unwrap(), "memory", &[req("bar-1"), req("bar-2")], None);
        assert!(matches!(result, Err(SolveError::InternalConflict { .. })));
    }

    #[test]
    fn test_variant_list_is_descending() {
        let repo = repo();
        let cache = VariantCache::new(&repo, PackageOrderList::default());
        let list = cache.variant_list("python").unwrap();
        let versions: Vec<String> = list.versions().iter().map(ToString::to_string).collect();
        assert_eq!(versions, vec!["2.7.0", "2.6.8", "2.6.0", "2.5.2"]);
        assert!(list.is_descending());

        let range: VersionRange = "2.6".parse().unwrap();
        let found: Vec<String> = list.intersection(&range).unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(found, vec!["python-2.6.8[]", "python-2.6.0[]"]);
    }

    #[test]
    fn test_package_variants_expand() {
        let repo = repo();
        let cache = VariantCache::new(&repo, PackageOrderList::default());
        let slice = cache.get_variant_slice("pyvariants", &VersionRange::any()).unwrap().unwrap();
        let variants = slice.variants();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].index(), Some(0));
        assert_eq!(variants[1].to_string(), "pyvariants-2[1]");
        assert!(variants[1].request_fams().contains("nada"));
        assert_eq!(variants[1].get("python").unwrap().to_string(), "python-2.6.8");
    }

    #[test]
    fn test_missing_family_suggests_similar() {
        let repo = repo();
        let cache = VariantCache::new(&repo, PackageOrderList::default());
        match cache.variant_list("pyhton") {
            Err(SolveError::PackageFamilyNotFound {
                family,
                similar,
            }) => {
                assert_eq!(family, "pyhton");
                assert_eq!(similar, vec!["python".to_string()]);
            }
            other => panic!("expected family not found, got {other:?}"),
        }
    }

    #[test]
    fn test_no_matching_version() {
        let repo = repo();
        let cache = VariantCache::new(&repo, PackageOrderList::default());
        let range: VersionRange = "3".parse().unwrap();
        assert!(cache.get_variant_slice("python", &range).unwrap().is_none());
    }

    #[test]
    fn test_broken_package_only_fails_when_reached() {
        let repo = repo();
        let cache = VariantCache::new(&repo, PackageOrderList::default());
        let two: VersionRange = "2".parse().unwrap();
        assert!(cache.get_variant_slice("broken", &two).unwrap().is_some());
        let one: VersionRange = "1".parse().unwrap();
        assert!(matches!(cache.get_variant_slice("broken", &one), Err(SolveError::InternalConflict { .. })));
    }

    #[test]
    fn test_orderer_changes_list_order() {
        let repo = repo();
        let orderers = PackageOrderList::new(vec![PackageOrder::VersionSplit {
            first_version: "2.6.0".parse().unwrap(),
        }]);
        let cache = VariantCache::new(&repo, orderers);
        let list = cache.variant_list("python").unwrap();
        assert!(!list.is_descending());
        let versions: Vec<String> = list.versions().iter().map(ToString::to_string).collect();
        assert_eq!(versions, vec!["2.6.0", "2.5.2", "2.7.0", "2.6.8"]);

        let range: VersionRange = "2.6+".parse().unwrap();
        let found: Vec<String> = list.intersection(&range).unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(found, vec!["python-2.6.0[]", "python-2.7.0[]", "python-2.6.8[]"]);
        assert_eq!(cache.loaded_families(), vec!["python".to_string()]);
    }
}
