//! Shared test utilities for compute-smoke
//!
//! This crate provides common test helpers that can be used across
//! multiple test modules without circular dependencies.
//!
//! ## Modules
//!
//! - [`env`]: live endpoint detection and unique test name generation
//! - [`logging`]: one-time tracing setup for tests

pub mod env;
pub mod logging;

// Re-export commonly used items
pub use env::{get_test_endpoint, get_test_token, test_name_prefix, test_run_id};
pub use logging::init_test_tracing;
