//! Error handling for pkgsolve
//!
//! This module provides the error type shared by the version algebra, the
//! request parser, the repository layer and the solver, plus the user-facing
//! error presentation used by the command-line binary.
//!
//! # Architecture
//!
//! - [`SolveError`] - enumerated, strongly-typed failures that library code
//!   returns through `Result`
//! - [`ErrorContext`] - wrapper that adds details and an actionable suggestion
//!   for terminal display
//!
//! # Error Categories
//!
//! - **Malformed input**: [`SolveError::InvalidVersion`], [`SolveError::InvalidRange`],
//!   [`SolveError::InvalidBound`], [`SolveError::InvalidRequest`]
//! - **Package lookup**: [`SolveError::PackageFamilyNotFound`], [`SolveError::PackageNotFound`]
//! - **Package metadata**: [`SolveError::InternalConflict`], [`SolveError::RepositoryError`]
//! - **Configuration**: [`SolveError::ConfigError`], [`SolveError::ParseError`], [`SolveError::IoError`]
//! - **Solver usage**: [`SolveError::SolveAlreadyStarted`], [`SolveError::FailureIndexOutOfRange`]
//!
//! Branch-local solve failures (a conflict inside one phase, a total
//! reduction) are not errors. They are recorded on the failed phase as a
//! [`crate::solver::FailureReason`] and only surface through the resolver's
//! outcome once the search is exhausted.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pkgsolve::core::{SolveError, user_friendly_error};
//!
//! let error = SolveError::PackageFamilyNotFound {
//!     family: "pyhton".to_string(),
//!     similar: vec!["python".to_string()],
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // colored error with a "did you mean" suggestion
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for pkgsolve operations.
///
/// Every variant carries owned strings so errors can be cloned into failure
/// reports and compared in tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// A version string could not be parsed.
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion {
        /// The offending version string
        version: String,
        /// Why it was rejected
        reason: String,
    },

    /// A version range string could not be parsed.
    #[error("Invalid version range '{range}': {reason}")]
    InvalidRange {
        /// The offending range string
        range: String,
        /// Why it was rejected
        reason: String,
    },

    /// An interval whose lower bound is above its upper bound, or an
    /// exclusive upper bound on the empty version.
    #[error("Invalid bound '{bound}'")]
    InvalidBound {
        /// The rejected bound as written
        bound: String,
    },

    /// A package request string could not be parsed.
    #[error("Invalid package request '{request}': {reason}")]
    InvalidRequest {
        /// The offending request string
        request: String,
        /// Why it was rejected
        reason: String,
    },

    /// The repository has no packages at all for a family.
    #[error("Package family not found: {family}")]
    PackageFamilyNotFound {
        /// The family that was looked up
        family: String,
        /// Known families with a similar name
        similar: Vec<String>,
    },

    /// The family exists but no version matches the request.
    #[error("Package could not be found: {request}")]
    PackageNotFound {
        /// The unsatisfiable request
        request: String,
    },

    /// A package's own requirements conflict with each other.
    #[error("The package {variant} has an internal requirements conflict: {conflict}")]
    InternalConflict {
        /// The variant whose requirements collide
        variant: String,
        /// The colliding pair
        conflict: String,
    },

    /// The package repository failed to answer a query.
    #[error("Repository error: {message}")]
    RepositoryError {
        /// Description of the failure
        message: String,
    },

    /// Invalid solver or orderer configuration.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// A TOML document could not be parsed.
    #[error("Failed to parse {file}: {reason}")]
    ParseError {
        /// File (or description of the input) being parsed
        file: String,
        /// Parser message
        reason: String,
    },

    /// A file could not be read or written.
    #[error("I/O error on {path}: {reason}")]
    IoError {
        /// Path of the file involved
        path: String,
        /// Underlying error message
        reason: String,
    },

    /// `solve()` was called on a resolver that already started solving.
    #[error("cannot run solve() on a solve that has already been started")]
    SolveAlreadyStarted,

    /// A failure index did not address a failed phase.
    #[error("failure index {index} out of range ({available} failures)")]
    FailureIndexOutOfRange {
        /// Requested index (may be negative)
        index: isize,
        /// Number of failed phases available
        available: usize,
    },

    /// An invariant of the solver was violated.
    #[error("Internal solver error: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl SolveError {
    /// True for lookup failures that only invalidate the phase they occur in.
    ///
    /// The resolver records these as a failed phase and backtracks; every
    /// other error aborts the run.
    #[must_use]
    pub const fn is_branch_local(&self) -> bool {
        matches!(self, Self::PackageFamilyNotFound { .. } | Self::PackageNotFound { .. })
    }
}

impl From<toml::de::Error> for SolveError {
    fn from(error: toml::de::Error) -> Self {
        Self::ParseError {
            file: "TOML document".to_string(),
            reason: error.to_string(),
        }
    }
}

/// Error wrapper carrying optional details and a suggestion for display.
///
/// # Examples
///
/// ```rust,no_run
/// use pkgsolve::core::{ErrorContext, SolveError};
///
/// let context = ErrorContext::new(SolveError::SolveAlreadyStarted)
///     .with_suggestion("Create a new resolver or call reset() first");
/// println!("{}", context);
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: SolveError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with no details or suggestion.
    #[must_use]
    pub const fn new(error: SolveError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow, suggestion
    /// in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`SolveError`], [`std::io::Error`] and [`toml::de::Error`];
/// anything else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(solve_error) = error.downcast_ref::<SolveError>() {
        return create_error_context(solve_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        return ErrorContext::new(SolveError::IoError {
            path: "unknown".to_string(),
            reason: io_error.to_string(),
        })
        .with_suggestion("Check that the file exists and is readable");
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(SolveError::from(toml_error.clone()))
            .with_suggestion("Check the TOML syntax: quotes, brackets and array-of-table headers");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(SolveError::Other {
        message,
    })
}

fn create_error_context(error: SolveError) -> ErrorContext {
    match &error {
        SolveError::InvalidVersion { .. } => ErrorContext::new(error)
            .with_suggestion("Versions are tokens of letters, digits and '_' separated by '.' or '-', e.g. '1.2.3' or '2.0-beta_1'"),

        SolveError::InvalidRange { .. } | SolveError::InvalidBound { .. } => ErrorContext::new(error)
            .with_suggestion("Use forms like '1.2', '==1.2.0', '1+<2', '>=1,<2', '1..3' or unions such as '1|3+'")
            .with_details("A range whose lower end is above its upper end, or that excludes both ends of a single version, matches nothing"),

        SolveError::InvalidRequest { .. } => ErrorContext::new(error)
            .with_suggestion("Requests look like 'foo', 'foo-1.2+', 'foo<2', '!foo-3' or '~foo-2+'"),

        SolveError::PackageFamilyNotFound { similar, .. } => {
            let suggestion = if similar.is_empty() {
                "Check the package name and the repository contents".to_string()
            } else {
                format!("Did you mean: {}?", similar.join(", "))
            };
            ErrorContext::new(error.clone()).with_suggestion(suggestion)
        }

        SolveError::PackageNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Widen the requested version range or add the missing version to the repository"),

        SolveError::InternalConflict { .. } => ErrorContext::new(error)
            .with_details("A package lists requirements for the same family that cannot be satisfied together")
            .with_suggestion("Fix the package metadata so its requirements merge cleanly"),

        SolveError::ParseError { .. } => ErrorContext::new(error)
            .with_suggestion("Check the TOML syntax: quotes, brackets and array-of-table headers"),

        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SolveError::PackageNotFound {
            request: "foo-5+".to_string(),
        };
        assert_eq!(error.to_string(), "Package could not be found: foo-5+");
    }

    #[test]
    fn test_branch_local_errors() {
        assert!(
            SolveError::PackageFamilyNotFound {
                family: "foo".to_string(),
                similar: vec![],
            }
            .is_branch_local()
        );
        assert!(!SolveError::SolveAlreadyStarted.is_branch_local());
    }

    #[test]
    fn test_family_not_found_suggestion() {
        let error = SolveError::PackageFamilyNotFound {
            family: "pyhton".to_string(),
            similar: vec!["python".to_string()],
        };
        let ctx = user_friendly_error(anyhow::Error::from(error));
        assert_eq!(ctx.suggestion.as_deref(), Some("Did you mean: python?"));
    }

    #[test]
    fn test_generic_error_keeps_chain() {
        let error = anyhow::anyhow!("inner").context("outer");
        let ctx = user_friendly_error(error);
        let text = ctx.to_string();
        assert!(text.contains("outer"));
        assert!(text.contains("inner"));
    }

    #[test]
    fn test_context_display_format() {
        let ctx = ErrorContext::new(SolveError::SolveAlreadyStarted)
            .with_details("d")
            .with_suggestion("s");
        assert_eq!(
            ctx.to_string(),
            "cannot run solve() on a solve that has already been started\nDetails: d\nSuggestion: s"
        );
    }
}
