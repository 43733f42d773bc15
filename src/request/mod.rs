//! Package requests.
//!
//! A [`PackageRequest`] constrains one package family. Requests come in three
//! flavors:
//!
//! - **Positive** (`foo-1+<3`): some version of `foo` in the range must be
//!   present.
//! - **Conflict** (`!foo-2`): no version of `foo` in the range may be present.
//!   `!foo` forbids `foo` entirely.
//! - **Weak** (`~foo-2+`): `foo` is not required, but if present it must be in
//!   the range. This is stored as the conflict of the inverse range, so
//!   `~foo-2+` behaves exactly like `!foo<2`. `~foo` has no effect at all and
//!   carries no range.
//!
//! # Syntax
//!
//! ```text
//! [!|~]name[(-|@|#)RANGE]
//! [!|~]name(=|<|>)...
//! ```
//!
//! The separator between name and range is cosmetic. It may be left out when
//! the range starts with `=`, `<` or `>`, as in `foo<3` or `foo==1.0`.
//!
//! # Examples
//!
//! ```rust
//! use pkgsolve::request::PackageRequest;
//!
//! let a: PackageRequest = "foo-3+".parse().unwrap();
//! let b: PackageRequest = "!foo-5+".parse().unwrap();
//! assert_eq!(a.merged(&b).unwrap().to_string(), "foo-3+<5");
//!
//! let weak: PackageRequest = "~foo-2+".parse().unwrap();
//! assert!(weak.conflict() && weak.weak());
//! assert_eq!(weak.to_string(), "~foo-2+");
//! ```

pub mod list;

pub use list::PackageRequestList;

use crate::core::SolveError;
use crate::version::{Version, VersionRange};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const NAME_SEPARATORS: [char; 3] = ['-', '@', '#'];
const RANGE_STARTS: [char; 3] = ['=', '<', '>'];

fn validate_name(input: &str, name: &str) -> Result<(), SolveError> {
    let invalid = |reason: &str| SolveError::InvalidRequest {
        request: input.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("missing package name"));
    }
    if let Some(c) = name.chars().find(|c| c.is_whitespace() || *c == '!' || *c == '~') {
        return Err(invalid(&format!("invalid character '{c}' in package name")));
    }
    Ok(())
}

/// A constraint on one package family.
#[derive(Debug, Clone)]
pub struct PackageRequest {
    name: String,
    range: Option<VersionRange>,
    conflict: bool,
    weak: bool,
    sep: char,
}

impl PackageRequest {
    /// A positive request for `name` within `range`.
    #[must_use]
    pub fn new(name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            name: name.into(),
            range: Some(range),
            conflict: false,
            weak: false,
            sep: '-',
        }
    }

    /// A positive request for any version of `name`.
    #[must_use]
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, VersionRange::any())
    }

    /// A conflict request forbidding `range` of `name`.
    #[must_use]
    pub fn conflict_with(name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            conflict: true,
            ..Self::new(name, range)
        }
    }

    /// Parse a request string.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::InvalidRequest`] for a missing or malformed name,
    /// and the range errors of [`VersionRange::parse`] for a bad range.
    pub fn parse(s: &str) -> Result<Self, SolveError> {
        let (conflict, weak, body) = if let Some(rest) = s.strip_prefix('!') {
            (true, false, rest)
        } else if let Some(rest) = s.strip_prefix('~') {
            (true, true, rest)
        } else {
            (false, false, s)
        };

        let split = body.find(|c: char| NAME_SEPARATORS.contains(&c) || RANGE_STARTS.contains(&c));

        let Some(i) = split else {
            validate_name(s, body)?;
            return Ok(Self {
                name: body.to_string(),
                range: (!weak).then(VersionRange::any),
                conflict,
                weak,
                sep: '-',
            });
        };

        let name = &body[..i];
        validate_name(s, name)?;

        let mut range_str = &body[i..];
        let mut sep = '-';
        if let Some(first) = range_str.chars().next().filter(|c| NAME_SEPARATORS.contains(c)) {
            sep = first;
            range_str = &range_str[first.len_utf8()..];
        }

        let range = VersionRange::parse(range_str)?;
        let range = if weak { range.inverse() } else { Some(range) };

        Ok(Self {
            name: name.to_string(),
            range,
            conflict,
            weak,
            sep,
        })
    }

    /// Family name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stored range. For weak requests this is the inverse of the
    /// written range; `None` only for a rangeless weak request (`~foo`).
    #[must_use]
    pub const fn range(&self) -> Option<&VersionRange> {
        self.range.as_ref()
    }

    /// True for conflict requests, weak ones included.
    #[must_use]
    pub const fn conflict(&self) -> bool {
        self.conflict
    }

    /// True for weak requests.
    #[must_use]
    pub const fn weak(&self) -> bool {
        self.weak
    }

    /// Copy with a new range, keeping name, flags and separator.
    fn with_range(&self, range: VersionRange) -> Self {
        Self {
            range: Some(range),
            ..self.clone()
        }
    }

    /// Merge two requests for the same family into one that satisfies both.
    ///
    /// Returns `None` if the families differ or the requests cannot both be
    /// satisfied, e.g. `foo-4` and `foo-6`.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Option<Self> {
        if self.name != other.name {
            return None;
        }

        let (Some(mine), Some(theirs)) = (&self.range, &other.range) else {
            return Some(if self.range.is_none() { other.clone() } else { self.clone() });
        };

        match (self.conflict, other.conflict) {
            (true, true) => {
                let union = mine.union(theirs);
                let weak = self.weak && other.weak && !union.is_any();
                Some(Self {
                    weak,
                    ..self.with_range(union)
                })
            }
            (true, false) => theirs.subtract(mine).map(|r| other.with_range(r)),
            (false, true) => mine.subtract(theirs).map(|r| self.with_range(r)),
            (false, false) => mine.intersection(theirs).map(|r| self.with_range(r)),
        }
    }

    /// True if the two requests can never both be satisfied.
    ///
    /// Requests for different families, and rangeless weak requests, never
    /// conflict. Two conflict requests never conflict with each other.
    #[must_use]
    pub fn conflicts_with(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        let (Some(mine), Some(theirs)) = (&self.range, &other.range) else {
            return false;
        };
        match (self.conflict, other.conflict) {
            (true, true) => false,
            (true, false) => mine.issuperset(theirs),
            (false, true) => theirs.issuperset(mine),
            (false, false) => !mine.intersects(theirs),
        }
    }

    /// True if a package `object` would violate this request.
    #[must_use]
    pub fn conflicts_with_version(&self, object: &VersionedObject) -> bool {
        if self.name != object.name {
            return false;
        }
        let Some(range) = &self.range else {
            return false;
        };
        range.contains_version(&object.version) == self.conflict
    }
}

impl PartialEq for PackageRequest {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.range == other.range && self.conflict == other.conflict
    }
}

impl Eq for PackageRequest {}

impl Hash for PackageRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.range.hash(state);
        self.conflict.hash(state);
    }
}

impl FromStr for PackageRequest {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.weak {
            "~"
        } else if self.conflict {
            "!"
        } else {
            ""
        };

        let shown = if self.weak {
            self.range.as_ref().and_then(VersionRange::inverse).unwrap_or_default()
        } else {
            self.range.clone().unwrap_or_default()
        };

        write!(f, "{prefix}{}", self.name)?;
        if !shown.is_any() {
            let range_str = shown.to_string();
            if !range_str.starts_with(RANGE_STARTS) {
                write!(f, "{}", self.sep)?;
            }
            f.write_str(&range_str)?;
        }
        Ok(())
    }
}

impl Serialize for PackageRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PackageRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A concrete package, e.g. `foo-1.0`.
///
/// The separator between name and version may be `-`, `@` or `#`; it only
/// affects display. An object with no version is unversioned.
#[derive(Debug, Clone)]
pub struct VersionedObject {
    name: String,
    version: Version,
    sep: char,
}

impl VersionedObject {
    /// Create an object from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            sep: '-',
        }
    }

    /// Object name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Object version; empty when unversioned.
    #[must_use]
    pub const fn version(&self) -> &Version {
        &self.version
    }
}

impl PartialEq for VersionedObject {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl Eq for VersionedObject {}

impl Hash for VersionedObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
    }
}

impl FromStr for VersionedObject {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, sep, version) = match s.find(NAME_SEPARATORS) {
            Some(i) => {
                let sep = s[i..].chars().next().unwrap_or('-');
                (&s[..i], sep, s[i + sep.len_utf8()..].parse()?)
            }
            None => (s, '-', Version::empty()),
        };
        validate_name(s, name)?;
        Ok(Self {
            name: name.to_string(),
            version,
            sep,
        })
    }
}

impl fmt::Display for VersionedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.version.is_empty() {
            write!(f, "{}{}", self.sep, self.version)?;
        }
        Ok(())
    }
}
