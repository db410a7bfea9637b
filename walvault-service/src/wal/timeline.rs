use std::fmt;

use serde::Serialize;
use walvault_types::{HistoryRecord, Lsn, SegmentNo, TimelineId};

use super::scanner::{MissingSegmentStatus, SegmentRun};
use super::sequence::SegmentsSequence;
use crate::backup::BackupInfo;

/// Health of a single timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineStatus {
    /// All segments between the first and last stored one are present.
    Ok,
    /// There are gaps in the stored segments.
    LostSegments,
}

impl TimelineStatus {
    /// The textual form used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::LostSegments => "LOST_SEGMENTS",
        }
    }
}

impl fmt::Display for TimelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one timeline in storage.
#[derive(Clone, Debug)]
pub struct TimelineInfo {
    /// The timeline.
    pub id: TimelineId,
    /// The timeline this one branched from, or 0 for the initial timeline.
    pub parent_id: TimelineId,
    /// Where this timeline branched from its parent, or `0/0` for the initial timeline.
    pub switch_point_lsn: Lsn,
    /// Lowest stored segment.
    pub start_segment: SegmentNo,
    /// Highest stored segment.
    pub end_segment: SegmentNo,
    /// Number of stored segments.
    pub segments_count: u64,
    /// Runs of segments between start and end that are not stored, ascending.
    pub missing_segments: Vec<SegmentRun>,
    /// Number of segments between start and end, both inclusive.
    pub segment_range_size: u64,
    /// Whether segments are missing.
    pub status: TimelineStatus,
    /// Backups that started on this timeline.
    pub backups: Vec<BackupInfo>,
}

impl TimelineInfo {
    /// Summarizes a sequence, using the last record of its history file for the parent.
    pub fn new(sequence: &SegmentsSequence, history: &[HistoryRecord]) -> Self {
        let (parent_id, switch_point_lsn) = history
            .last()
            .map(|record| (record.parent_timeline, record.switch_point))
            .unwrap_or((0, Lsn::ZERO));

        let missing_segments = sequence.find_missing_ranges(MissingSegmentStatus::Lost);
        let status = if missing_segments.is_empty() {
            TimelineStatus::Ok
        } else {
            TimelineStatus::LostSegments
        };

        Self {
            id: sequence.timeline(),
            parent_id,
            switch_point_lsn,
            start_segment: sequence.min_segment_no(),
            end_segment: sequence.max_segment_no(),
            segments_count: sequence.segments_count(),
            missing_segments,
            segment_range_size: sequence.range_size(),
            status,
            backups: Vec::new(),
        }
    }
}
