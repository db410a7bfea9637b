//! Continuity and timeline analysis of archived WAL segments.
//!
//! Everything here works on a [`StorageSnapshot`](crate::storage::StorageSnapshot) that was
//! listed beforehand and does no I/O:
//!
//! - [`SegmentRunner`] walks segments backwards across timeline switches,
//! - [`SegmentScanner`] drives a runner and collects runs of found and missing segments,
//! - [`SegmentsSequence`] and [`TimelineInfo`] summarize the segments of one timeline,
//! - [`IntegrityCheck`] and [`TimelineCheck`] make up a [`VerifyResult`].

mod runner;
mod scanner;
mod sequence;
mod timeline;
mod verify;

pub use runner::{RunnerError, SegmentRunner, TimelineSwitchMap, timeline_switch_map};
pub use scanner::{
    MissingSegmentStatus, ScanConfig, ScannedSegmentStatus, SegmentRun, SegmentScanner,
    classify_missing_segment,
};
pub use sequence::SegmentsSequence;
pub use timeline::{TimelineInfo, TimelineStatus};
pub use verify::{
    CheckStatus, CheckType, IntegrityCheck, TimelineCheck, UnknownCheckError, VerifyResult,
    select_stop_segment,
};
