//! Interval endpoints.
//!
//! A [`Bound`] is one contiguous interval of versions, described by a
//! [`LowerBound`] and an [`UpperBound`]. An interval with no lower limit
//! starts at the empty version (inclusive); one with no upper limit ends at
//! the infinite version (inclusive).

use super::Version;
use crate::core::SolveError;
use std::cmp::Ordering;
use std::fmt;

/// Lower end of an interval.
///
/// At equal versions an inclusive bound sorts before an exclusive one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LowerBound {
    /// Anchor version
    pub version: Version,
    /// Whether `version` itself is part of the interval
    pub inclusive: bool,
}

impl LowerBound {
    /// Create a lower bound.
    #[must_use]
    pub const fn new(version: Version, inclusive: bool) -> Self {
        Self {
            version,
            inclusive,
        }
    }

    /// The unbounded lower end: the empty version, inclusive.
    #[must_use]
    pub fn min() -> Self {
        Self::new(Version::empty(), true)
    }

    /// True if `version` lies on or above this bound.
    #[must_use]
    pub fn contains_version(&self, version: &Version) -> bool {
        version > &self.version || (self.inclusive && version == &self.version)
    }
}

impl Ord for LowerBound {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version).then_with(|| other.inclusive.cmp(&self.inclusive))
    }
}

impl PartialOrd for LowerBound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LowerBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.version.is_empty(), self.inclusive) {
            (true, true) => Ok(()),
            (true, false) => f.write_str(">"),
            (false, true) => write!(f, "{}+", self.version),
            (false, false) => write!(f, ">{}", self.version),
        }
    }
}

/// Upper end of an interval.
///
/// At equal versions an exclusive bound sorts before an inclusive one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpperBound {
    /// Anchor version
    pub version: Version,
    /// Whether `version` itself is part of the interval
    pub inclusive: bool,
}

impl UpperBound {
    /// Create an upper bound.
    ///
    /// # Errors
    ///
    /// An exclusive upper bound on the empty version contains nothing and is
    /// rejected with [`SolveError::InvalidBound`].
    pub fn new(version: Version, inclusive: bool) -> Result<Self, SolveError> {
        if version.is_empty() && !inclusive {
            return Err(SolveError::InvalidBound {
                bound: format!("<{version}"),
            });
        }
        Ok(Self {
            version,
            inclusive,
        })
    }

    /// The unbounded upper end: the infinite version, inclusive.
    #[must_use]
    pub const fn inf() -> Self {
        Self {
            version: Version::inf(),
            inclusive: true,
        }
    }

    /// True if `version` lies on or below this bound.
    #[must_use]
    pub fn contains_version(&self, version: &Version) -> bool {
        version < &self.version || (self.inclusive && version == &self.version)
    }
}

impl fmt::Display for UpperBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inclusive {
            write!(f, "<={}", self.version)
        } else {
            write!(f, "<{}", self.version)
        }
    }
}

/// One contiguous interval of versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bound {
    /// Lower end
    pub lower: LowerBound,
    /// Upper end
    pub upper: UpperBound,
}

impl Bound {
    /// Create an interval, defaulting missing ends to unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::InvalidBound`] if the lower end lies above the
    /// upper end, or both ends sit on the same version without both being
    /// inclusive.
    pub fn new(lower: Option<LowerBound>, upper: Option<UpperBound>) -> Result<Self, SolveError> {
        let bound = Self {
            lower: lower.unwrap_or_else(LowerBound::min),
            upper: upper.unwrap_or_else(UpperBound::inf),
        };
        if bound.is_valid() {
            Ok(bound)
        } else {
            Err(SolveError::InvalidBound {
                bound: format!("{}{}", bound.lower, bound.upper),
            })
        }
    }

    /// Build an interval the caller already knows is valid.
    pub(crate) const fn from_parts(lower: LowerBound, upper: UpperBound) -> Self {
        Self {
            lower,
            upper,
        }
    }

    /// The interval holding every version.
    #[must_use]
    pub fn any() -> Self {
        Self::from_parts(LowerBound::min(), UpperBound::inf())
    }

    fn is_valid(&self) -> bool {
        match self.lower.version.cmp(&self.upper.version) {
            Ordering::Less => true,
            Ordering::Equal => self.lower.inclusive && self.upper.inclusive,
            Ordering::Greater => false,
        }
    }

    /// True unless the lower end is the empty version, inclusive.
    #[must_use]
    pub fn lower_bounded(&self) -> bool {
        self.lower != LowerBound::min()
    }

    /// True unless the upper end is infinite.
    #[must_use]
    pub fn upper_bounded(&self) -> bool {
        self.upper != UpperBound::inf()
    }

    /// True if `version` lies inside the interval.
    #[must_use]
    pub fn contains_version(&self, version: &Version) -> bool {
        self.version_containment(version) == Ordering::Equal
    }

    /// Where `version` lies relative to the interval: `Less` below it,
    /// `Equal` inside, `Greater` above.
    #[must_use]
    pub fn version_containment(&self, version: &Version) -> Ordering {
        if !self.lower.contains_version(version) {
            Ordering::Less
        } else if !self.upper.contains_version(version) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    /// True if `other` lies entirely inside this interval.
    #[must_use]
    pub fn contains_bound(&self, other: &Self) -> bool {
        self.lower <= other.lower && self.upper >= other.upper
    }

    /// True if the two intervals share at least one version.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.intersection(other).is_some()
    }

    /// The overlap of two intervals, if any.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let bound = Self::from_parts(
            self.lower.clone().max(other.lower.clone()),
            self.upper.clone().min(other.upper.clone()),
        );
        bound.is_valid().then_some(bound)
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lower, upper) = (&self.lower, &self.upper);
        if upper.version.is_inf() {
            write!(f, "{lower}")
        } else if lower.version == upper.version {
            write!(f, "=={}", lower.version)
        } else if lower.inclusive && upper.inclusive {
            if lower.version.is_empty() {
                write!(f, "<={}", upper.version)
            } else {
                write!(f, "{}..{}", lower.version, upper.version)
            }
        } else if lower.inclusive && !upper.inclusive && lower.version.next() == upper.version {
            write!(f, "{}", lower.version)
        } else {
            write!(f, "{lower}{upper}")
        }
    }
}
