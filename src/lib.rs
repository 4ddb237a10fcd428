//! FUNDING MONITOR: multi-venue perpetual funding rate scanner.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod sources;
pub mod engine;
pub mod notify;
pub mod dashboard;
