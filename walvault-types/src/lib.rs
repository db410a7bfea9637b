//! Shared types for the walvault WAL archive.
//!
//! This crate holds the pure numbering algebra of the write-ahead log: log sequence numbers
//! ([`lsn`]), segment numbers and file names ([`segment`]), delta units used by incremental
//! backups ([`delta`]) and timeline history records ([`history`]). Nothing here performs I/O;
//! the storage and verification logic lives in `walvault-service`.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod delta;
pub mod history;
pub mod lsn;
pub mod segment;

pub use delta::{DeltaFetchPlan, DeltaNo, get_delta_range, get_wal_segment_range};
pub use history::{HistoryParseError, HistoryRecord};
pub use lsn::{Lsn, LsnParseError};
pub use segment::{
    InvalidFilenameError, InvalidSegmentSizeError, SegmentDescription, SegmentNo, SegmentSize,
    TimelineId,
};
