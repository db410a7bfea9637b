//! Test utilities for walvault.
//!
//! This crate provides utilities to facilitate testing of the WAL archive tooling. See the
//! modules for all available utilities.

pub mod fixtures;
pub mod tracing;
