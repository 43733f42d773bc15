//! Variant slices: the candidate set of one family within a phase.
//!
//! A slice never changes after construction. Every narrowing operation
//! returns a new slice (or reports that nothing changed) so that phases can
//! share slices freely.

use super::types::{Narrowed, Reduction, VariantSelectMode};
use super::variant::Variant;
use crate::request::PackageRequest;
use crate::version::VersionRange;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// A subset of a family's variants plus summaries derived from it.
#[derive(Debug, Clone)]
pub struct VariantSlice {
    family: String,
    variants: Vec<Arc<Variant>>,
    range: VersionRange,
    common_fams: BTreeSet<String>,
    fam_requires: BTreeSet<String>,
    extracted_fams: BTreeSet<String>,
    descending: bool,
}

type SortKey = (usize, Vec<(Reverse<usize>, VersionRange)>, Reverse<usize>, Vec<(VersionRange, String)>, Option<usize>);

impl VariantSlice {
    /// Build a slice from a non-empty variant list.
    ///
    /// `descending` declares that `variants` are in version-descending
    /// order, which allows one-pass range tests.
    #[must_use]
    pub fn new(family: impl Into<String>, variants: Vec<Arc<Variant>>, descending: bool) -> Self {
        let range = VersionRange::from_versions(variants.iter().map(|v| v.version()));

        let mut common_fams: BTreeSet<String> = variants.first().map(|v| v.request_fams().clone()).unwrap_or_default();
        let mut fam_requires = BTreeSet::new();
        for variant in &variants {
            common_fams.retain(|fam| variant.request_fams().contains(fam));
            fam_requires.extend(variant.request_fams().iter().cloned());
            fam_requires.extend(variant.conflict_request_fams().iter().cloned());
        }

        Self {
            family: family.into(),
            variants,
            range,
            common_fams,
            fam_requires,
            extracted_fams: BTreeSet::new(),
            descending,
        }
    }

    fn with_variants(&self, variants: Vec<Arc<Variant>>) -> Self {
        Self::new(self.family.clone(), variants, self.descending)
    }

    /// Family name.
    #[must_use]
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Candidate variants, in preference order.
    #[must_use]
    pub fn variants(&self) -> &[Arc<Variant>] {
        &self.variants
    }

    /// The exact versions of all candidates.
    #[must_use]
    pub const fn range(&self) -> &VersionRange {
        &self.range
    }

    /// Number of candidate variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// True if the slice holds no variants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Families every candidate requires.
    #[must_use]
    pub const fn common_fams(&self) -> &BTreeSet<String> {
        &self.common_fams
    }

    /// Families any candidate mentions, positively or as a conflict.
    #[must_use]
    pub const fn fam_requires(&self) -> &BTreeSet<String> {
        &self.fam_requires
    }

    /// Common families already extracted.
    #[must_use]
    pub const fn extracted_fams(&self) -> &BTreeSet<String> {
        &self.extracted_fams
    }

    /// True while some common family has not been extracted yet.
    #[must_use]
    pub fn is_extractable(&self) -> bool {
        !self.extracted_fams.is_superset(&self.common_fams)
    }

    /// Drop the candidates whose version lies outside `range`.
    #[must_use]
    pub fn intersect(&self, range: &VersionRange) -> Narrowed<Self> {
        trace!("intersecting {} wrt range '{}'", self, range);
        if range.is_any() {
            return Narrowed::Unchanged;
        }

        let variants: Vec<Arc<Variant>> = if self.descending {
            let groups = self.variants.chunk_by(|a, b| a.version() == b.version());
            range.iter_intersecting(groups, |g| g[0].version(), true).flatten().cloned().collect()
        } else {
            self.variants.iter().filter(|v| range.contains_version(v.version())).cloned().collect()
        };

        if variants.is_empty() {
            Narrowed::Empty
        } else if variants.len() < self.variants.len() {
            Narrowed::Changed(self.with_variants(variants))
        } else {
            Narrowed::Unchanged
        }
    }

    /// Drop the candidates whose requirement on `request`'s family conflicts
    /// with `request`, reporting each removal.
    #[must_use]
    pub fn reduce_by(&self, request: &PackageRequest) -> (Narrowed<Self>, Vec<Reduction>) {
        if request.range().is_none() || !self.fam_requires.contains(request.name()) {
            return (Narrowed::Unchanged, Vec::new());
        }
        trace!("reducing {} wrt {}", self, short_request_str(request));

        let mut variants = Vec::new();
        let mut reductions = Vec::new();

        for variant in &self.variants {
            match variant.get(request.name()) {
                Some(dependency) if dependency.conflicts_with(request) => {
                    let reduction = Reduction {
                        name: variant.name().to_string(),
                        version: variant.version().clone(),
                        variant_index: variant.index(),
                        dependency: dependency.clone(),
                        conflicting_request: request.clone(),
                    };
                    debug!("removed {} (dep({}) <--!--> {})", reduction.reducee_str(), dependency, request);
                    reductions.push(reduction);
                }
                _ => variants.push(Arc::clone(variant)),
            }
        }

        if variants.is_empty() {
            (Narrowed::Empty, reductions)
        } else if reductions.is_empty() {
            (Narrowed::Unchanged, reductions)
        } else {
            (Narrowed::Changed(self.with_variants(variants)), reductions)
        }
    }

    /// Extract the first common family not yet extracted.
    ///
    /// The request's range is the union of every candidate's range for the
    /// family, so every candidate still satisfies it. Conflict requirements
    /// are never extracted; they only take part in reduction.
    #[must_use]
    pub fn extract(&self) -> Option<(Self, PackageRequest)> {
        let family = self.common_fams.difference(&self.extracted_fams).next()?.clone();

        let mut ranges: Vec<&VersionRange> = Vec::new();
        for range in self.variants.iter().filter_map(|v| v.get(&family).and_then(PackageRequest::range)) {
            if ranges.last() != Some(&range) {
                ranges.push(range);
            }
        }
        let (first, rest) = ranges.split_first()?;
        let union = first.union_all(rest.iter().copied());

        let mut slice = self.clone();
        slice.extracted_fams.insert(family.clone());
        Some((slice, PackageRequest::new(family, union)))
    }

    /// Split into a leading block and the rest.
    ///
    /// Candidates are first ranked with [`Self::sort_variants`]. The leading
    /// block starts with the best candidate; with more than two candidates it
    /// grows while the candidates still share some family that has not been
    /// extracted yet. Returns `None` for a single candidate.
    #[must_use]
    pub fn split(&self, requests: &[PackageRequest], mode: VariantSelectMode) -> Option<(Self, Self)> {
        if self.variants.len() == 1 {
            return None;
        }

        let variants = self.sort_variants(requests, mode);
        let mut nleading = 1;
        let mut split_fams = None;

        if variants.len() > 2 {
            let mut fams: BTreeSet<String> = variants[0].request_fams().difference(&self.extracted_fams).cloned().collect();
            if !fams.is_empty() {
                for (j, variant) in variants.iter().enumerate().skip(1) {
                    let next_fams: BTreeSet<String> = variant.request_fams().intersection(&fams).cloned().collect();
                    if next_fams.is_empty() {
                        split_fams = Some(fams);
                        nleading = j;
                        break;
                    }
                    fams = next_fams;
                }
            }
        }

        let (leading, rest) = variants.split_at(nleading);
        let slice = self.with_variants(leading.to_vec());
        let next_slice = self.with_variants(rest.to_vec());

        match split_fams {
            None => debug!("split {} into {} and {} on leading variant", self, slice, next_slice),
            Some(fams) => debug!(
                "split {} into {} and {} on {} leading variants with common dependencies: {}",
                self,
                slice,
                next_slice,
                nleading,
                fams.into_iter().collect::<Vec<_>>().join(", ")
            ),
        }

        Some((slice, next_slice))
    }

    /// Candidates ranked from most to least preferred within each version.
    ///
    /// Version order is kept. Within a version, `VersionPriority` prefers
    /// higher versions of the families named in `requests` (earlier requests
    /// weigh more), then fewer additional families, then higher versions of
    /// those, then the variant index. `IntersectionPriority` first prefers
    /// more families shared with `requests`.
    #[must_use]
    pub fn sort_variants(&self, requests: &[PackageRequest], mode: VariantSelectMode) -> Vec<Arc<Variant>> {
        let key = |variant: &Variant| -> SortKey {
            let mut requested = Vec::new();
            let mut names = BTreeSet::new();
            for (i, request) in requests.iter().enumerate().filter(|(_, r)| !r.conflict()) {
                if let Some(range) = variant.get(request.name()).and_then(PackageRequest::range) {
                    requested.push((Reverse(i), range.clone()));
                    names.insert(request.name());
                }
            }

            let additional: Vec<(VersionRange, String)> = variant
                .requires()
                .iter()
                .filter(|r| !r.conflict() && !names.contains(r.name()))
                .filter_map(|r| r.range().map(|range| (range.clone(), r.name().to_string())))
                .collect();

            let shared = match mode {
                VariantSelectMode::VersionPriority => 0,
                VariantSelectMode::IntersectionPriority => requested.len(),
            };
            (shared, requested, Reverse(additional.len()), additional, variant.index())
        };

        let mut sorted = Vec::with_capacity(self.variants.len());
        for group in self.variants.chunk_by(|a, b| a.version() == b.version()) {
            let mut group = group.to_vec();
            if group.len() > 1 {
                group.sort_by_cached_key(|v| Reverse(key(v.as_ref())));
            }
            sorted.extend(group);
        }
        sorted
    }
}

impl fmt::Display for VariantSlice {
    /// `foo[2..6(3:4)]*`: 3 versions and 4 variants spanning 2..6, with
    /// families left to extract. `[foo==2[0,1]]`: two variants of `foo-2`.
    /// `[foo==2]`: a single package. `[foo==2[1]]`: a single variant.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variants.as_slice() {
            [variant] => {
                write!(f, "[{}=={}", self.family, variant.version())?;
                if let Some(index) = variant.index() {
                    write!(f, "[{index}]")?;
                }
                f.write_str("]")?;
            }
            variants => {
                let versions: BTreeSet<_> = variants.iter().map(|v| v.version()).collect();
                if versions.len() == 1 {
                    let mut indexes: Vec<Option<usize>> = variants.iter().map(|v| v.index()).collect();
                    indexes.sort_unstable();
                    let indexes: Vec<String> =
                        indexes.iter().map(|i| i.map_or_else(String::new, |i| i.to_string())).collect();
                    let version = variants.first().map(|v| v.version().to_string()).unwrap_or_default();
                    write!(f, "[{}=={}[{}]]", self.family, version, indexes.join(","))?;
                } else if versions.len() == variants.len() {
                    write!(f, "{}[{}({})]", self.family, self.range.span(), variants.len())?;
                } else {
                    write!(f, "{}[{}({}:{})]", self.family, self.range.span(), versions.len(), variants.len())?;
                }
            }
        }
        if self.is_extractable() {
            f.write_str("*")?;
        }
        Ok(())
    }
}

/// Shortened form of requests for many exact versions, `foo-1.0..1.9(5)`.
pub(crate) fn short_request_str(request: &PackageRequest) -> String {
    if !request.conflict() {
        if let Some(range) = request.range() {
            if let Some(versions) = range.to_versions() {
                if versions.len() == range.len() && versions.len() > 1 {
                    return format!("{}-{}({})", request.name(), range.span(), versions.len());
                }
            }
        }
    }
    request.to_string()
}
