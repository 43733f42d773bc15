//! Versions and version ranges.
//!
//! This module implements the version algebra the solver is built on: a
//! totally ordered, token based [`Version`] type and a [`VersionRange`] type
//! made of sorted, disjoint intervals.
//!
//! # Module Organization
//!
//! - [`token`] - single version tokens and their ordering
//! - [`bound`] - interval endpoints and intervals
//! - [`range`] - the range type and its set operations
//! - [`parser`] - the textual range grammar
//! - [`iter`] - one-pass containment tests over sorted sequences
//!
//! # Versions
//!
//! A version is zero or more tokens separated by `.` or `-`, for example
//! `1.2-3`. Separators are cosmetic: `1.0.0` equals `1-0-0`, but the
//! original separators are kept so the version prints back exactly as it
//! was written. The empty version `""` is the smallest possible version and
//! denotes an unversioned package.
//!
//! Versions with more tokens are larger than their prefixes: `3 < 3.0 < 3.0.1`.
//!
//! # Ranges
//!
//! | Syntax | Meaning |
//! |---|---|
//! | `3` | any version starting with the token `3` (`3`, `3.0`, `3.1.4`) |
//! | `==3` | exactly `3` |
//! | `2+`, `>=2` | `2` or greater |
//! | `>2` | greater than `2` |
//! | `<5`, `<=5` | less than (or equal to) `5` |
//! | `1+<5`, `>=1<5`, `>=1,<5` | bounded |
//! | `1..5` | `1` to `5` inclusive |
//! | `4\|6+` | union of intervals |
//! | `""` | any version |
//!
//! # Examples
//!
//! ```rust
//! use pkgsolve::version::{Version, VersionRange};
//!
//! let range: VersionRange = "3+<6|4+<8".parse().unwrap();
//! assert_eq!(range.to_string(), "3+<8");
//!
//! let v: Version = "3.1.4".parse().unwrap();
//! assert!("3".parse::<VersionRange>().unwrap().contains_version(&v));
//! assert!(!"==3".parse::<VersionRange>().unwrap().contains_version(&v));
//! ```

pub mod bound;
pub mod iter;
pub mod parser;
pub mod range;
pub mod token;

pub use bound::{Bound, LowerBound, UpperBound};
pub use range::VersionRange;
pub use token::VersionToken;

use crate::core::SolveError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A package version.
///
/// `tokens` is `None` only for the internal infinite version, which sorts
/// above every real version and prints as `[INF]`.
#[derive(Debug, Clone)]
pub struct Version {
    tokens: Option<Vec<VersionToken>>,
    seps: Vec<char>,
}

impl Version {
    /// The empty version, the smallest version there is.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            tokens: Some(Vec::new()),
            seps: Vec::new(),
        }
    }

    /// The infinite version used for unbounded upper ends of ranges.
    #[must_use]
    pub const fn inf() -> Self {
        Self {
            tokens: None,
            seps: Vec::new(),
        }
    }

    /// True for the infinite version.
    #[must_use]
    pub const fn is_inf(&self) -> bool {
        self.tokens.is_none()
    }

    /// True for the empty version.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.as_ref().is_some_and(Vec::is_empty)
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.as_ref().map_or(0, Vec::len)
    }

    /// Token at `index`, if present.
    #[must_use]
    pub fn token(&self, index: usize) -> Option<&VersionToken> {
        self.tokens.as_ref().and_then(|t| t.get(index))
    }

    /// All tokens; empty for the infinite version.
    #[must_use]
    pub fn tokens(&self) -> &[VersionToken] {
        self.tokens.as_deref().unwrap_or(&[])
    }

    /// First token (semantic versioning major), if present.
    #[must_use]
    pub fn major(&self) -> Option<&VersionToken> {
        self.token(0)
    }

    /// Second token (semantic versioning minor), if present.
    #[must_use]
    pub fn minor(&self) -> Option<&VersionToken> {
        self.token(1)
    }

    /// Third token (semantic versioning patch), if present.
    #[must_use]
    pub fn patch(&self) -> Option<&VersionToken> {
        self.token(2)
    }

    /// A version strictly greater than this one.
    ///
    /// Replaces the last token with its successor, so `1.2` becomes `1.2_`.
    /// See [`VersionToken::next`] for why this is not always the minimal
    /// successor.
    /// The successor of the empty version is the infinite version.
    #[must_use]
    pub fn next(&self) -> Self {
        match &self.tokens {
            Some(tokens) if !tokens.is_empty() => {
                let mut tokens = tokens.clone();
                if let Some(last) = tokens.last_mut() {
                    *last = last.next();
                }
                Self {
                    tokens: Some(tokens),
                    seps: self.seps.clone(),
                }
            }
            _ => Self::inf(),
        }
    }

    /// A copy holding at most the first `len` tokens.
    #[must_use]
    pub fn trim(&self, len: usize) -> Self {
        let tokens: Vec<VersionToken> = self.tokens().iter().take(len).cloned().collect();
        let seps = self.seps.iter().take(tokens.len().saturating_sub(1)).copied().collect();
        Self {
            tokens: Some(tokens),
            seps,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromStr for Version {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::empty());
        }

        let invalid = |reason: &str| SolveError::InvalidVersion {
            version: s.to_string(),
            reason: reason.to_string(),
        };

        let mut tokens = Vec::new();
        let mut seps = Vec::new();
        let mut current = String::new();

        for c in s.chars() {
            if token::is_token_char(c) {
                current.push(c);
            } else if c == '.' || c == '-' {
                if current.is_empty() {
                    return Err(invalid("empty token (leading or doubled separator)"));
                }
                tokens.push(current.parse::<VersionToken>()?);
                current.clear();
                seps.push(c);
            } else {
                return Err(invalid(&format!("invalid character '{c}'")));
            }
        }

        if current.is_empty() {
            return Err(invalid("empty token (trailing separator)"));
        }
        tokens.push(current.parse::<VersionToken>()?);

        Ok(Self {
            tokens: Some(tokens),
            seps,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(tokens) = &self.tokens else {
            return f.write_str("[INF]");
        };
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                let sep = self.seps.get(i - 1).copied().unwrap_or('.');
                write!(f, "{sep}")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tokens.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.tokens, &other.tokens) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
