use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use walvault_types::{HistoryRecord, SegmentDescription, SegmentNo, SegmentSize, TimelineId};

use super::runner::{SegmentRunner, TimelineSwitchMap};
use super::scanner::{
    MissingSegmentStatus, ScanConfig, ScannedSegmentStatus, SegmentRun, SegmentScanner,
};

/// Outcome of a single check. Ordered from best to worst.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    /// Nothing to report.
    Ok,
    /// Something looks off but may resolve itself.
    Warning,
    /// Restoring to the current position is not possible.
    Failure,
}

impl CheckStatus {
    /// The textual form used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The checks that can be requested from a verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckType {
    /// Segment continuity from the current segment back to the last usable backup.
    Integrity,
    /// Whether the current timeline is the newest one in storage.
    Timeline,
}

impl CheckType {
    /// All checks, in report order.
    pub const ALL: [CheckType; 2] = [CheckType::Integrity, CheckType::Timeline];
}

/// Error returned when parsing an unknown [`CheckType`].
#[derive(Debug, thiserror::Error)]
#[error("unknown check {0:?}, expected `integrity` or `timeline`")]
pub struct UnknownCheckError(String);

impl FromStr for CheckType {
    type Err = UnknownCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integrity" => Ok(Self::Integrity),
            "timeline" => Ok(Self::Timeline),
            other => Err(UnknownCheckError(other.to_owned())),
        }
    }
}

/// Result of the integrity check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityCheck {
    /// The overall status derived from `runs`.
    pub status: CheckStatus,
    /// Scanned segments as runs, ascending.
    pub runs: Vec<SegmentRun>,
}

impl IntegrityCheck {
    /// Walks backwards from `current` (exclusive) to `stop_segment_no` and classifies every gap.
    ///
    /// Gaps within `uploading_window` segments of the newest stored segment count as uploading.
    pub fn run(
        current: SegmentDescription,
        stop_segment_no: SegmentNo,
        known_segments: &HashSet<SegmentDescription>,
        switches: &TimelineSwitchMap,
        uploading_window: u64,
    ) -> Self {
        let mut runner = SegmentRunner::new(current, stop_segment_no, known_segments, switches);
        let mut scanner = SegmentScanner::new(&mut runner);
        scanner.scan(ScanConfig::unlimited(MissingSegmentStatus::ProbablyDelayed));
        scanner.refine_missing_statuses(uploading_window);

        let runs = scanner.into_runs();
        for run in runs.iter().filter(|run| run.status == ScannedSegmentStatus::Lost) {
            tracing::warn!(
                timeline = run.timeline_id,
                start = run.start_segment.get(),
                end = run.end_segment.get(),
                "Segments are lost"
            );
        }

        Self {
            status: integrity_status(&runs),
            runs,
        }
    }
}

fn integrity_status(runs: &[SegmentRun]) -> CheckStatus {
    runs.iter()
        .map(|run| match run.status {
            ScannedSegmentStatus::Found => CheckStatus::Ok,
            ScannedSegmentStatus::ProbablyDelayed | ScannedSegmentStatus::ProbablyUploading => {
                CheckStatus::Warning
            }
            ScannedSegmentStatus::Lost => CheckStatus::Failure,
        })
        .max()
        .unwrap_or(CheckStatus::Ok)
}

/// Result of the timeline check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimelineCheck {
    /// The overall status.
    pub status: CheckStatus,
    /// The timeline the database is running on.
    pub current_timeline_id: TimelineId,
    /// The highest timeline found in storage, or 0 if storage is empty.
    pub highest_storage_timeline_id: TimelineId,
}

impl TimelineCheck {
    /// Compares the current timeline with the highest one in storage.
    pub fn new(current_timeline_id: TimelineId, highest_storage_timeline_id: TimelineId) -> Self {
        let status = if highest_storage_timeline_id == 0 {
            CheckStatus::Warning
        } else if current_timeline_id >= highest_storage_timeline_id {
            CheckStatus::Ok
        } else {
            CheckStatus::Failure
        };

        Self {
            status,
            current_timeline_id,
            highest_storage_timeline_id,
        }
    }
}

/// The combined result of all requested checks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyResult {
    /// Present if the integrity check was requested.
    pub integrity: Option<IntegrityCheck>,
    /// Present if the timeline check was requested.
    pub timeline: Option<TimelineCheck>,
}

impl VerifyResult {
    /// The worst status among the checks that ran.
    pub fn status(&self) -> CheckStatus {
        let integrity = self.integrity.as_ref().map(|check| check.status);
        let timeline = self.timeline.as_ref().map(|check| check.status);
        integrity
            .into_iter()
            .chain(timeline)
            .max()
            .unwrap_or(CheckStatus::Ok)
    }
}

/// Picks the segment at which the integrity walk may stop.
///
/// The walk can end at the newest backup that lies on the ancestry of the current segment, that
/// is on the current timeline at or before `current`, or on a parent timeline at or before the
/// point where it was left. Without such a backup the walk goes down to the first segment.
pub fn select_stop_segment(
    current: SegmentDescription,
    history: &[HistoryRecord],
    backup_starts: impl IntoIterator<Item = SegmentDescription>,
    size: SegmentSize,
) -> SegmentNo {
    let ancestry: Vec<(TimelineId, SegmentNo)> = std::iter::once((current.timeline, current.number))
        .chain(history.iter().rev().map(|record| {
            (
                record.parent_timeline,
                SegmentNo::from_lsn(record.switch_point, size),
            )
        }))
        .collect();

    backup_starts
        .into_iter()
        .filter(|start| {
            ancestry
                .iter()
                .any(|&(timeline, bound)| start.timeline == timeline && start.number <= bound)
        })
        .map(|start| start.number)
        .max()
        .unwrap_or(SegmentNo::FIRST)
}
