//! Integration test suite for pkgsolve
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **solver**: Resolve scenarios against the shared fixture repository
//! - **orderers**: Package orderers loaded from configuration
//! - **cli**: The `pkgsolve` binary

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod orderers;
mod solver;
