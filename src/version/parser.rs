//! Range grammar.
//!
//! A range string is a `|`-separated list of parts. Each part is matched
//! against one of the forms below and turned into a single [`Bound`]; the
//! caller merges the bounds into canonical form.
//!
//! | Form | Example | Interval |
//! |---|---|---|
//! | version | `3` | `[3, 3.next())` |
//! | exact | `==3` | `[3, 3]` |
//! | inclusive | `1..3` | `[1, 3]` |
//! | lower | `3+`, `>=3`, `>3` | `[3, inf]`, `(3, inf]` |
//! | upper | `<3`, `<=3` | `[, 3)`, `[, 3]` |
//! | range | `1+<3`, `>1<=3`, `>=1,<3` | bounded |
//!
//! An empty part means "any". Where a form allows the version to be left
//! out, the empty version is used in its place, so `==` is the exact empty
//! version and `>` is everything above it.

use super::bound::{Bound, LowerBound, UpperBound};
use super::Version;
use crate::core::SolveError;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::trace;

const VERSION_PATTERN: &str = r"[0-9a-zA-Z_]+(?:[.-][0-9a-zA-Z_]+)*";

static RANGE_REGEX: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    let v = VERSION_PATTERN;
    let pattern = format!(
        r"^(?:(?P<version>{v})|(?P<exact>==(?P<exact_v>{v})?)|(?P<inclusive>(?P<incl_lo>{v})?\.\.(?P<incl_hi>{v})?)|(?P<lower>(?P<lower_op>>=|>)(?P<lower_v1>{v})?|(?P<lower_v2>{v})?\+)|(?P<upper><(?P<upper_excl>{v})|<=(?P<upper_incl>{v})?)|(?P<range>(?:(?P<r_lop>>=|>)(?:(?P<r_lv1>{v}),?)?|(?P<r_lv2>{v})\+?,?|\+?)(?:<(?P<r_u_excl>{v})|(?P<r_u_incl_op><=)(?P<r_u_incl>{v})?)))$"
    );
    Regex::new(&pattern)
});

/// Parse a range string into its unmerged bounds.
///
/// With `lenient` set, parts that describe an empty interval are dropped
/// instead of failing the parse; the parse still fails if nothing is left.
pub(crate) fn parse_bounds(input: &str, lenient: bool) -> Result<Vec<Bound>, SolveError> {
    let regex = RANGE_REGEX.as_ref().map_err(|e| SolveError::Internal {
        message: format!("range grammar failed to compile: {e}"),
    })?;

    let mut bounds = Vec::new();
    let mut dropped = 0usize;

    for part in input.split('|') {
        if part.is_empty() {
            bounds.push(Bound::any());
            continue;
        }

        let caps = regex.captures(part).ok_or_else(|| SolveError::InvalidRange {
            range: input.to_string(),
            reason: format!("syntax error in '{part}'"),
        })?;

        match parse_part(&caps).map_err(|e| wrap_version_error(input, part, e))? {
            Ok(bound) => bounds.push(bound),
            Err(e) if lenient => {
                trace!("dropping empty interval '{}' from range '{}': {}", part, input, e);
                dropped += 1;
            }
            Err(e) => return Err(with_source_text(part, e)),
        }
    }

    if bounds.is_empty() && dropped > 0 {
        return Err(SolveError::InvalidRange {
            range: input.to_string(),
            reason: "every interval in the range is empty".to_string(),
        });
    }

    Ok(bounds)
}

fn wrap_version_error(input: &str, part: &str, error: SolveError) -> SolveError {
    match error {
        SolveError::InvalidVersion { version, reason } => SolveError::InvalidRange {
            range: input.to_string(),
            reason: format!("invalid version '{version}': {reason}"),
        },
        other => with_source_text(part, other),
    }
}

/// Report a rejected interval as written rather than in canonical form.
fn with_source_text(part: &str, error: SolveError) -> SolveError {
    match error {
        SolveError::InvalidBound { .. } => SolveError::InvalidBound {
            bound: part.to_string(),
        },
        other => other,
    }
}

fn version_of(caps: &Captures<'_>, name: &str) -> Result<Version, SolveError> {
    caps.name(name).map_or_else(|| Ok(Version::empty()), |m| m.as_str().parse())
}

/// Turn one matched part into a bound.
///
/// The outer result carries version parse errors; the inner one carries
/// invalid intervals, which the lenient parse is allowed to drop.
fn parse_part(caps: &Captures<'_>) -> Result<Result<Bound, SolveError>, SolveError> {
    if caps.name("version").is_some() {
        let version = version_of(caps, "version")?;
        let upper = if version.is_empty() {
            None
        } else {
            Some(UpperBound::new(version.next(), false)?)
        };
        return Ok(Bound::new(Some(LowerBound::new(version, true)), upper));
    }

    if caps.name("exact").is_some() {
        let version = version_of(caps, "exact_v")?;
        let upper = UpperBound::new(version.clone(), true)?;
        return Ok(Bound::new(Some(LowerBound::new(version, true)), Some(upper)));
    }

    if caps.name("inclusive").is_some() {
        let lower = LowerBound::new(version_of(caps, "incl_lo")?, true);
        let upper = UpperBound::new(version_of(caps, "incl_hi")?, true)?;
        return Ok(Bound::new(Some(lower), Some(upper)));
    }

    if caps.name("lower").is_some() {
        let exclusive = caps.name("lower_op").is_some_and(|m| m.as_str() == ">");
        let version = if caps.name("lower_op").is_some() {
            version_of(caps, "lower_v1")?
        } else {
            version_of(caps, "lower_v2")?
        };
        return Ok(Bound::new(Some(LowerBound::new(version, !exclusive)), None));
    }

    if caps.name("upper").is_some() {
        let upper = if caps.name("upper_excl").is_some() {
            UpperBound::new(version_of(caps, "upper_excl")?, false)
        } else {
            UpperBound::new(version_of(caps, "upper_incl")?, true)
        };
        return Ok(upper.and_then(|u| Bound::new(None, Some(u))));
    }

    let exclusive = caps.name("r_lop").is_some_and(|m| m.as_str() == ">");
    let lower_version = if caps.name("r_lv1").is_some() {
        version_of(caps, "r_lv1")?
    } else {
        version_of(caps, "r_lv2")?
    };
    let lower = LowerBound::new(lower_version, !exclusive);

    let upper = if caps.name("r_u_incl_op").is_some() {
        UpperBound::new(version_of(caps, "r_u_incl")?, true)
    } else {
        UpperBound::new(version_of(caps, "r_u_excl")?, false)
    };

    Ok(upper.and_then(|u| Bound::new(Some(lower), Some(u))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(s: &str) -> String {
        let bounds = parse_bounds(s, false).unwrap();
        assert_eq!(bounds.len(), 1, "expected a single bound for '{s}'");
        bounds[0].to_string()
    }

    #[test]
    fn test_each_form() {
        assert_eq!(one("3"), "3");
        assert_eq!(one("==3"), "==3");
        assert_eq!(one("=="), "==");
        assert_eq!(one("1..3"), "1..3");
        assert_eq!(one("..3"), "<=3");
        assert_eq!(one("3+"), "3+");
        assert_eq!(one(">=3"), "3+");
        assert_eq!(one(">3"), ">3");
        assert_eq!(one(">"), ">");
        assert_eq!(one("+"), "");
        assert_eq!(one("<3"), "<3");
        assert_eq!(one("<=3"), "<=3");
        assert_eq!(one("1+<3"), "1+<3");
        assert_eq!(one(">=1<3"), "1+<3");
        assert_eq!(one(">=1,<3"), "1+<3");
        assert_eq!(one("1,<3"), "1+<3");
        assert_eq!(one(">1<=3"), ">1<=3");
        assert_eq!(one("1+<=3"), "1..3");
        assert_eq!(one("1<3"), "1+<3");
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["<", "3+4", "1...3", ",<3", "foo bar", "1+<", "==3+"] {
            assert!(
                matches!(parse_bounds(bad, false), Err(SolveError::InvalidRange { .. })),
                "'{bad}' should not parse"
            );
        }
    }

    #[test]
    fn test_invalid_interval() {
        assert!(matches!(parse_bounds("3..1", false), Err(SolveError::InvalidBound { .. })));
        assert!(matches!(parse_bounds("3..", false), Err(SolveError::InvalidBound { .. })));
        assert!(matches!(parse_bounds(">3<3", false), Err(SolveError::InvalidBound { .. })));

        let err = parse_bounds("5+|3..1", false).unwrap_err();
        assert_eq!(err.to_string(), "Invalid bound '3..1'");
    }

    #[test]
    fn test_lenient_drops_empty_parts() {
        let bounds = parse_bounds("3..1|5+", true).unwrap();
        assert_eq!(bounds.len(), 1);
        assert_eq!(bounds[0].to_string(), "5+");
        assert!(parse_bounds("3..1", true).is_err());
    }

    #[test]
    fn test_empty_parts_mean_any() {
        let bounds = parse_bounds("", false).unwrap();
        assert_eq!(bounds, vec![Bound::any()]);
    }
}
