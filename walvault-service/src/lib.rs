//! The service layer reads a WAL archive and reports on its health.
//!
//! It is designed as a library crate to be used by the `walvault` CLI.
//!
//! # Architecture
//!
//! - [`backend`] abstracts the object storage holding the archive,
//! - [`storage::WalStorage`] knows the archive layout and lists it into a
//!   [`storage::StorageSnapshot`],
//! - [`wal`] analyzes snapshots without doing any I/O,
//! - [`inspect::WalInspector`] combines the two into timeline listings and verification reports.
//!
//! Segment numbering, history files and delta addressing live in `walvault_types`.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backend;
pub mod backup;
pub mod compression;
pub mod error;
pub mod inspect;
pub mod layout;
pub mod storage;
pub mod stream;
pub mod wal;

pub use error::{Error, Result};
pub use inspect::WalInspector;
pub use storage::{StorageConfig, StorageSnapshot, WalStorage};
pub use stream::PayloadStream;
