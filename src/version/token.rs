//! Version tokens.
//!
//! A token is the part of a version string between two separators. The
//! version `2.3.07b` has the tokens `2`, `3` and `07b`. Tokens may contain
//! ASCII letters, digits and underscores.
//!
//! For comparison a token is split into alternating runs of digits and
//! non-digits ("subtokens"), and the subtoken lists are compared
//! lexicographically:
//!
//! - non-digit runs sort before digit runs
//! - non-digit runs compare bytewise (`_`, then `A-Z`, then `a-z` ordering
//!   follows ASCII)
//! - digit runs compare by numeric value, then by their literal text, so
//!   `"01" < "1"`
//!
//! Some comparisons that hold:
//!
//! ```rust
//! use pkgsolve::version::VersionToken;
//!
//! let t = |s: &str| s.parse::<VersionToken>().unwrap();
//! assert!(t("3") < t("4"));
//! assert!(t("01") < t("1"));
//! assert!(t("beta") < t("1"));
//! assert!(t("alpha") < t("alpha3"));
//! assert!(t("gamma33") < t("33gamma"));
//! ```

use crate::core::SolveError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One digit or non-digit run within a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SubToken {
    Alpha(String),
    Numeric(String),
}

impl SubToken {
    fn as_str(&self) -> &str {
        match self {
            Self::Alpha(s) | Self::Numeric(s) => s,
        }
    }
}

/// Compare two digit strings by value without converting to an integer.
fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        .then_with(|| a.cmp(b))
}

impl Ord for SubToken {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Alpha(a), Self::Alpha(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::Alpha(_), Self::Numeric(_)) => Ordering::Less,
            (Self::Numeric(_), Self::Alpha(_)) => Ordering::Greater,
            (Self::Numeric(a), Self::Numeric(b)) => cmp_numeric(a, b),
        }
    }
}

impl PartialOrd for SubToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single alphanumeric component of a [`Version`](super::Version).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionToken {
    subtokens: Vec<SubToken>,
}

/// Returns true if `c` may appear inside a version token.
#[must_use]
pub(crate) const fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl VersionToken {
    /// A token strictly greater than this one.
    ///
    /// A trailing non-digit run gets an underscore appended; a trailing digit
    /// run gets a new `_` run after it. `"3"` becomes `"3_"`.
    ///
    /// This is not always the minimal successor. Alpha runs compare
    /// bytewise, so tokens such as `"3A"` fall between `"3"` and `"3_"`, and
    /// the range `3` contains `3A`.
    #[must_use]
    pub fn next(&self) -> Self {
        let mut subtokens = self.subtokens.clone();
        match subtokens.last_mut() {
            Some(SubToken::Alpha(s)) => s.push('_'),
            _ => subtokens.push(SubToken::Alpha("_".to_string())),
        }
        Self {
            subtokens,
        }
    }

    /// True if the token is made only of digits.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self.subtokens.as_slice(), [SubToken::Numeric(_)])
    }
}

impl FromStr for VersionToken {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(SolveError::InvalidVersion {
                version: s.to_string(),
                reason: "empty version token".to_string(),
            });
        }
        if let Some(bad) = s.chars().find(|c| !is_token_char(*c)) {
            return Err(SolveError::InvalidVersion {
                version: s.to_string(),
                reason: format!("invalid character '{bad}' in version token"),
            });
        }

        let mut subtokens: Vec<SubToken> = Vec::new();
        for c in s.chars() {
            let digit = c.is_ascii_digit();
            match subtokens.last_mut() {
                Some(SubToken::Numeric(run)) if digit => run.push(c),
                Some(SubToken::Alpha(run)) if !digit => run.push(c),
                _ if digit => subtokens.push(SubToken::Numeric(c.to_string())),
                _ => subtokens.push(SubToken::Alpha(c.to_string())),
            }
        }

        Ok(Self {
            subtokens,
        })
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sub in &self.subtokens {
            f.write_str(sub.as_str())?;
        }
        Ok(())
    }
}
