//! Core types shared by every module.
//!
//! # Error Management
//!
//! The crate separates two kinds of failure:
//!
//! - **Run-fatal errors** ([`SolveError`]): malformed versions, ranges and
//!   requests, repository and configuration problems, misuse of the resolver.
//!   Library functions return `Result<_, SolveError>`.
//! - **Branch-local failures**: a phase of the search that cannot be solved.
//!   These are not errors; they are recorded as
//!   [`FailureReason`](crate::solver::FailureReason) values on failed phases
//!   and the search carries on with the next alternative.
//!
//! The binary works with `anyhow::Error` and turns any error into an
//! [`ErrorContext`] with [`user_friendly_error`] before printing it.

pub mod error;

pub use error::{ErrorContext, SolveError, user_friendly_error};
