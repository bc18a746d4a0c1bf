//! compute-smoke - lifecycle harness for a compute security-group API
//!
//! Drives smoke scenarios against a live compute endpoint or an in-memory
//! simulator, tracking every created resource so it is deleted no matter how
//! the scenario ends.

pub mod api;
pub mod config;
pub mod error;
pub mod harness;
pub mod naming;
pub mod orphans;
pub mod resource_guard;
pub mod runner;
pub mod scenario;
pub mod wait;

pub use error::{ErrorKind, HarnessError};
pub use harness::Harness;
