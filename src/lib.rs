#![deny(missing_docs)]
//! Relays photos posted by a feed bot into a second chat and asks a lookup
//! bot to search them.

/// Settings and relay constants
pub mod config;
/// Error types
pub mod error;
/// Relay pipeline
pub mod relay;
/// Process runtime: startup, update loop, shutdown
pub mod runner;
