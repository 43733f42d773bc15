//! Version ranges.
//!
//! A [`VersionRange`] is a set of versions stored as a sorted list of
//! disjoint [`Bound`] intervals. Every constructor merges its intervals with
//! the same union pass, so two equal ranges always hold identical interval
//! lists and compare, hash and print identically.
//!
//! Ranges behave like sets: they can be united, intersected, subtracted and
//! inverted. Operations that can produce the empty set return `Option`,
//! since an empty range cannot be written down.

use super::bound::{Bound, LowerBound, UpperBound};
use super::iter::{ContainsVersionIter, IntersectingIter, NonIntersectingIter};
use super::{parser, Version};
use crate::core::SolveError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not, Sub};
use std::str::FromStr;

/// Below this many intervals a linear scan beats binary search.
const LINEAR_SCAN_LIMIT: usize = 5;

/// A set of versions made of sorted, disjoint intervals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionRange {
    bounds: Vec<Bound>,
}

/// Bound comparison operator for [`VersionRange::from_version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    /// `==`
    Eq,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl FromStr for RangeOp {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" | "==" => Ok(Self::Eq),
            "gt" | ">" => Ok(Self::Gt),
            "gte" | ">=" => Ok(Self::Gte),
            "lt" | "<" => Ok(Self::Lt),
            "lte" | "<=" => Ok(Self::Lte),
            other => Err(SolveError::InvalidRange {
                range: other.to_string(),
                reason: format!("unknown bound operation '{other}'"),
            }),
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl VersionRange {
    /// The range holding every version.
    #[must_use]
    pub fn any() -> Self {
        Self {
            bounds: vec![Bound::any()],
        }
    }

    /// Parse a range string.
    ///
    /// # Errors
    ///
    /// [`SolveError::InvalidRange`] for syntax errors or bad versions,
    /// [`SolveError::InvalidBound`] if any part describes an empty interval.
    pub fn parse(s: &str) -> Result<Self, SolveError> {
        Ok(Self::from_bounds(parser::parse_bounds(s, false)?))
    }

    /// Parse a range string, discarding parts that describe an empty
    /// interval before the parts are merged.
    ///
    /// # Errors
    ///
    /// Fails on syntax errors, or when every part is empty.
    pub fn parse_lenient(s: &str) -> Result<Self, SolveError> {
        Ok(Self::from_bounds(parser::parse_bounds(s, true)?))
    }

    fn from_bounds(bounds: Vec<Bound>) -> Self {
        if bounds.is_empty() {
            Self::any()
        } else {
            Self {
                bounds: union_bounds(bounds),
            }
        }
    }

    /// The intervals of this range, sorted and disjoint.
    #[must_use]
    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    /// Number of intervals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Always false; an empty range is represented by `None`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// True for the "any" range.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.bounds.len() == 1 && self.bounds[0] == Bound::any()
    }

    /// True if the range has a lower limit other than the empty version.
    #[must_use]
    pub fn lower_bounded(&self) -> bool {
        self.bounds.first().is_some_and(Bound::lower_bounded)
    }

    /// True if the range has an upper limit.
    #[must_use]
    pub fn upper_bounded(&self) -> bool {
        self.bounds.last().is_some_and(Bound::upper_bounded)
    }

    /// True if the range has both a lower and an upper limit.
    #[must_use]
    pub fn bounded(&self) -> bool {
        self.lower_bounded() && self.upper_bounded()
    }

    /// The union of this range and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.union_all(std::iter::once(other))
    }

    /// The union of this range and every range in `others`.
    #[must_use]
    pub fn union_all<'a>(&self, others: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut bounds = self.bounds.clone();
        for range in others {
            bounds.extend(range.bounds.iter().cloned());
        }
        Self {
            bounds: union_bounds(bounds),
        }
    }

    /// The intersection of this range and `other`, or `None` if they share
    /// no version.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        self.intersection_all(std::iter::once(other))
    }

    /// The intersection of this range and every range in `others`.
    #[must_use]
    pub fn intersection_all<'a>(&self, others: impl IntoIterator<Item = &'a Self>) -> Option<Self> {
        let mut bounds = self.bounds.clone();
        for range in others {
            bounds = intersect_bounds(&bounds, &range.bounds);
            if bounds.is_empty() {
                return None;
            }
        }
        Some(Self {
            bounds,
        })
    }

    /// The complement of this range, or `None` for the "any" range.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        if self.is_any() {
            None
        } else {
            Some(Self {
                bounds: inverse_bounds(&self.bounds),
            })
        }
    }

    /// Versions in this range but not in `other`, or `None` if nothing is
    /// left.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Option<Self> {
        other.inverse().and_then(|inv| self.intersection(&inv))
    }

    /// True if every version in `other` is also in this range.
    #[must_use]
    pub fn issuperset(&self, other: &Self) -> bool {
        let mut lo = 0;
        for bound in &other.bounds {
            let i = lo + self.bounds[lo..].partition_point(|b| b < bound);
            if i > 0 && self.bounds[i - 1].contains_bound(bound) {
                lo = i - 1;
            } else if i < self.bounds.len() && self.bounds[i].contains_bound(bound) {
                lo = i;
            } else {
                return false;
            }
        }
        true
    }

    /// True if every version in this range is also in `other`.
    #[must_use]
    pub fn issubset(&self, other: &Self) -> bool {
        other.issuperset(self)
    }

    /// True if the two ranges share at least one version.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let (short, long) = if self.bounds.len() <= other.bounds.len() {
            (&self.bounds, &other.bounds)
        } else {
            (&other.bounds, &self.bounds)
        };

        if long.len() < LINEAR_SCAN_LIMIT {
            return short.iter().any(|a| long.iter().any(|b| a.intersects(b)));
        }

        let mut lo = 0;
        for bound in short {
            let i = lo + long[lo..].partition_point(|b| b < bound);
            if i > 0 && long[i - 1].intersects(bound) {
                return true;
            }
            if i < long.len() && long[i].intersects(bound) {
                return true;
            }
            lo = i.saturating_sub(1);
        }
        false
    }

    /// True if `version` lies in this range.
    #[must_use]
    pub fn contains_version(&self, version: &Version) -> bool {
        if self.bounds.len() < LINEAR_SCAN_LIMIT {
            self.bounds.iter().any(|b| b.contains_version(version))
        } else {
            self.locate(version).1
        }
    }

    /// Binary search for `version`: the index of the interval holding it
    /// (or of the first interval above it) and whether it is contained.
    pub(crate) fn locate(&self, version: &Version) -> (usize, bool) {
        let probe = Bound::from_parts(LowerBound::new(version.clone(), true), UpperBound::inf());
        let i = self.bounds.partition_point(|b| b < &probe);
        if i > 0 && self.bounds[i - 1].contains_version(version) {
            return (i - 1, true);
        }
        if i < self.bounds.len() && self.bounds[i].contains_version(version) {
            return (i, true);
        }
        (i, false)
    }

    /// Test each item of a version-sorted sequence for containment in one
    /// pass, yielding `(contained, item)` pairs.
    pub fn iter_intersect_test<I, F>(
        &self,
        items: I,
        key: F,
        descending: bool,
    ) -> ContainsVersionIter<'_, I::IntoIter, F>
    where
        I: IntoIterator,
        F: Fn(&I::Item) -> &Version,
    {
        ContainsVersionIter::new(self, items.into_iter(), key, descending)
    }

    /// Like [`Self::iter_intersect_test`], yielding only contained items.
    pub fn iter_intersecting<I, F>(
        &self,
        items: I,
        key: F,
        descending: bool,
    ) -> IntersectingIter<'_, I::IntoIter, F>
    where
        I: IntoIterator,
        F: Fn(&I::Item) -> &Version,
    {
        IntersectingIter::new(self, items.into_iter(), key, descending)
    }

    /// Like [`Self::iter_intersect_test`], yielding only items outside the
    /// range.
    pub fn iter_non_intersecting<I, F>(
        &self,
        items: I,
        key: F,
        descending: bool,
    ) -> NonIntersectingIter<'_, I::IntoIter, F>
    where
        I: IntoIterator,
        F: Fn(&I::Item) -> &Version,
    {
        NonIntersectingIter::new(self, items.into_iter(), key, descending)
    }

    /// Split into one range per interval, so `"3|5+"` gives `["3", "5+"]`.
    #[must_use]
    pub fn split(&self) -> Vec<Self> {
        self.bounds
            .iter()
            .map(|b| Self {
                bounds: vec![b.clone()],
            })
            .collect()
    }

    /// The single interval covering this whole range; `"2+<4|6+<8"` spans
    /// `"2+<8"`.
    #[must_use]
    pub fn span(&self) -> Self {
        match (self.bounds.first(), self.bounds.last()) {
            (Some(first), Some(last)) => Self {
                bounds: vec![Bound::from_parts(first.lower.clone(), last.upper.clone())],
            },
            _ => Self::any(),
        }
    }

    /// A single interval from `lower` to `upper`; a missing end is unbounded.
    ///
    /// # Errors
    ///
    /// Fails if the ends describe an empty interval.
    pub fn as_span(
        lower: Option<Version>,
        upper: Option<Version>,
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> Result<Self, SolveError> {
        let lower = lower.map(|v| LowerBound::new(v, lower_inclusive));
        let upper = upper.map(|v| UpperBound::new(v, upper_inclusive)).transpose()?;
        Ok(Self {
            bounds: vec![Bound::new(lower, upper)?],
        })
    }

    /// A range built from one version and a bound operator.
    ///
    /// With no operator the range holds the version and every version that
    /// extends it (`3` holds `3.1`).
    ///
    /// # Errors
    ///
    /// Fails for `<` on the empty version.
    pub fn from_version(version: &Version, op: Option<RangeOp>) -> Result<Self, SolveError> {
        let v = version.clone();
        let (lower, upper) = match op {
            None => (Some(LowerBound::new(v.clone(), true)), Some(UpperBound::new(v.next(), false)?)),
            Some(RangeOp::Eq) => (Some(LowerBound::new(v.clone(), true)), Some(UpperBound::new(v, true)?)),
            Some(RangeOp::Gt) => (Some(LowerBound::new(v, false)), None),
            Some(RangeOp::Gte) => (Some(LowerBound::new(v, true)), None),
            Some(RangeOp::Lt) => (None, Some(UpperBound::new(v, false)?)),
            Some(RangeOp::Lte) => (None, Some(UpperBound::new(v, true)?)),
        };
        Ok(Self {
            bounds: vec![Bound::new(lower, upper)?],
        })
    }

    /// The range holding exactly the given versions, e.g. `==3|==4|==5.1`.
    ///
    /// Returns the "any" range when `versions` is empty.
    #[must_use]
    pub fn from_versions<'a>(versions: impl IntoIterator<Item = &'a Version>) -> Self {
        let mut versions: Vec<&Version> = versions.into_iter().collect();
        versions.sort();
        versions.dedup();
        if versions.is_empty() {
            return Self::any();
        }
        Self {
            bounds: versions
                .into_iter()
                .map(|v| {
                    Bound::from_parts(
                        LowerBound::new(v.clone(), true),
                        UpperBound {
                            version: v.clone(),
                            inclusive: true,
                        },
                    )
                })
                .collect(),
        }
    }

    /// The versions of the exact-version intervals, or `None` if there are
    /// none.
    #[must_use]
    pub fn to_versions(&self) -> Option<Vec<Version>> {
        let versions: Vec<Version> = self
            .bounds
            .iter()
            .filter(|b| b.lower.inclusive && b.upper.inclusive && b.lower.version == b.upper.version)
            .map(|b| b.lower.version.clone())
            .collect();
        (!versions.is_empty()).then_some(versions)
    }
}

/// Sort and merge overlapping or touching intervals.
fn union_bounds(mut bounds: Vec<Bound>) -> Vec<Bound> {
    if bounds.len() < 2 {
        return bounds;
    }
    bounds.sort();

    let mut merged = Vec::new();
    let mut start = 0;
    let mut upper = bounds[0].upper.clone();

    for i in 1..bounds.len() {
        let bound = &bounds[i];
        let gap = match bound.lower.version.cmp(&upper.version) {
            Ordering::Greater => true,
            Ordering::Equal => !bound.lower.inclusive && !upper.inclusive,
            Ordering::Less => false,
        };
        if gap {
            merged.push(Bound::from_parts(bounds[start].lower.clone(), upper.clone()));
            start = i;
            upper = bound.upper.clone();
        } else if bound.upper > upper {
            upper = bound.upper.clone();
        }
    }

    merged.push(Bound::from_parts(bounds[start].lower.clone(), upper));
    merged
}

fn intersect_bounds(a: &[Bound], b: &[Bound]) -> Vec<Bound> {
    a.iter().flat_map(|x| b.iter().filter_map(move |y| x.intersection(y))).collect()
}

fn inverse_bounds(bounds: &[Bound]) -> Vec<Bound> {
    let mut lowers: Vec<Option<LowerBound>> = vec![None];
    let mut uppers: Vec<Option<UpperBound>> = Vec::new();

    for bound in bounds {
        if bound.lower.version.is_empty() && bound.lower.inclusive {
            uppers.push(None);
        } else {
            uppers.push(Some(UpperBound {
                version: bound.lower.version.clone(),
                inclusive: !bound.lower.inclusive,
            }));
        }

        if bound.upper.version.is_inf() {
            lowers.push(None);
        } else {
            lowers.push(Some(LowerBound::new(bound.upper.version.clone(), !bound.upper.inclusive)));
        }
    }
    uppers.push(None);

    lowers
        .into_iter()
        .zip(uppers)
        .filter(|(l, u)| l.is_some() || u.is_some())
        .map(|(l, u)| {
            Bound::from_parts(l.unwrap_or_else(LowerBound::min), u.unwrap_or_else(UpperBound::inf))
        })
        .collect()
}

impl FromStr for VersionRange {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, bound) in self.bounds.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{bound}")?;
        }
        Ok(())
    }
}

impl BitOr for &VersionRange {
    type Output = VersionRange;

    fn bitor(self, rhs: Self) -> VersionRange {
        self.union(rhs)
    }
}

impl BitAnd for &VersionRange {
    type Output = Option<VersionRange>;

    fn bitand(self, rhs: Self) -> Option<VersionRange> {
        self.intersection(rhs)
    }
}

impl Sub for &VersionRange {
    type Output = Option<VersionRange>;

    fn sub(self, rhs: Self) -> Option<VersionRange> {
        self.subtract(rhs)
    }
}

impl Not for &VersionRange {
    type Output = Option<VersionRange>;

    fn not(self) -> Option<VersionRange> {
        self.inverse()
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
