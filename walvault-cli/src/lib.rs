//! The `walvault` command line tool.
//!
//! This builds on top of [`walvault_service`] and exposes timeline listings, continuity checks,
//! delta planning and single file transfers against a configured archive.
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod observability;
pub mod output;
