use std::fmt;

use serde::Serialize;
use walvault_types::{SegmentDescription, SegmentNo, TimelineId};

use super::runner::{RunnerError, SegmentRunner};

/// Status assigned to a segment that was expected but not found in storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MissingSegmentStatus {
    /// Newer than anything in storage, probably not yet archived.
    ProbablyDelayed,
    /// Close to the newest archived segment, probably still being uploaded.
    ProbablyUploading,
    /// Far behind the newest archived segment.
    Lost,
}

/// Status of a segment visited by a [`SegmentScanner`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScannedSegmentStatus {
    /// The segment is present in storage.
    Found,
    /// See [`MissingSegmentStatus::ProbablyDelayed`].
    #[serde(rename = "MISSING_DELAYED")]
    ProbablyDelayed,
    /// See [`MissingSegmentStatus::ProbablyUploading`].
    #[serde(rename = "MISSING_UPLOADING")]
    ProbablyUploading,
    /// See [`MissingSegmentStatus::Lost`].
    #[serde(rename = "MISSING_LOST")]
    Lost,
}

impl ScannedSegmentStatus {
    /// The textual form used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Found => "FOUND",
            Self::ProbablyDelayed => "MISSING_DELAYED",
            Self::ProbablyUploading => "MISSING_UPLOADING",
            Self::Lost => "MISSING_LOST",
        }
    }

    /// Returns `true` for any of the missing statuses.
    pub fn is_missing(self) -> bool {
        self != Self::Found
    }
}

impl From<MissingSegmentStatus> for ScannedSegmentStatus {
    fn from(status: MissingSegmentStatus) -> Self {
        match status {
            MissingSegmentStatus::ProbablyDelayed => Self::ProbablyDelayed,
            MissingSegmentStatus::ProbablyUploading => Self::ProbablyUploading,
            MissingSegmentStatus::Lost => Self::Lost,
        }
    }
}

impl fmt::Display for ScannedSegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controls how far a [`SegmentScanner`] walks and how it labels gaps.
#[derive(Clone, Copy, Debug)]
pub struct ScanConfig {
    /// Ignore `scan_segments_limit` and walk until the stop segment.
    pub unlimited_scan: bool,
    /// Maximum number of segments to visit when the scan is limited.
    pub scan_segments_limit: usize,
    /// End the scan after the first segment present in storage.
    pub stop_on_first_found: bool,
    /// Status recorded for segments that are not in storage.
    pub missing_segment_status: MissingSegmentStatus,
}

impl ScanConfig {
    /// A scan that visits every segment down to the stop segment.
    pub fn unlimited(missing_segment_status: MissingSegmentStatus) -> Self {
        Self {
            unlimited_scan: true,
            scan_segments_limit: 0,
            stop_on_first_found: false,
            missing_segment_status,
        }
    }
}

/// Drives a [`SegmentRunner`] and collects the segments it passes into runs.
///
/// Several scans may be run in sequence on the same scanner; each continues where the previous
/// one ended. Memory grows with the number of runs, not with the number of segments walked.
#[derive(Debug)]
pub struct SegmentScanner<'r, 'a> {
    runner: &'r mut SegmentRunner<'a>,
    /// Newest first, in walk order.
    runs: Vec<SegmentRun>,
}

impl<'r, 'a> SegmentScanner<'r, 'a> {
    /// Creates a scanner on top of `runner`.
    pub fn new(runner: &'r mut SegmentRunner<'a>) -> Self {
        Self {
            runner,
            runs: Vec::new(),
        }
    }

    /// Walks the runner according to `config`.
    pub fn scan(&mut self, config: ScanConfig) {
        let mut visited = 0;
        while config.unlimited_scan || visited < config.scan_segments_limit {
            match self.runner.next() {
                Ok(description) => {
                    self.record(description, ScannedSegmentStatus::Found);
                    visited += 1;
                    if config.stop_on_first_found {
                        break;
                    }
                }
                Err(RunnerError::SegmentNotFound(_)) => match self.runner.force_move_next() {
                    Ok(description) => {
                        self.record(description, config.missing_segment_status.into());
                        visited += 1;
                    }
                    Err(_) => break,
                },
                Err(RunnerError::ReachedStopSegment { .. }) => break,
            }
        }
    }

    /// Re-labels the missing segments relative to the newest segment found in storage.
    ///
    /// A missing run is split where the label changes. See [`classify_missing_segment`].
    pub fn refine_missing_statuses(&mut self, uploading_window: u64) {
        let newest_found = self
            .runs
            .iter()
            .filter(|run| run.status == ScannedSegmentStatus::Found)
            .map(|run| run.end_segment)
            .max();

        for run in std::mem::take(&mut self.runs) {
            if run.status.is_missing() {
                for piece in split_missing_run(run, newest_found, uploading_window) {
                    self.push_run(piece);
                }
            } else {
                self.push_run(run);
            }
        }
    }

    /// The runs of missing segments recorded so far, newest first.
    pub fn missing_segments(&self) -> Vec<SegmentRun> {
        self.runs
            .iter()
            .filter(|run| run.status.is_missing())
            .copied()
            .collect()
    }

    /// The runs recorded so far, ordered by ascending segment number.
    pub fn runs(&self) -> Vec<SegmentRun> {
        self.runs.iter().rev().copied().collect()
    }

    /// Consumes the scanner, returning the runs by ascending segment number.
    pub fn into_runs(mut self) -> Vec<SegmentRun> {
        self.runs.reverse();
        self.runs
    }

    fn record(&mut self, description: SegmentDescription, status: ScannedSegmentStatus) {
        self.push_run(SegmentRun {
            timeline_id: description.timeline,
            start_segment: description.number,
            end_segment: description.number,
            status,
        });
    }

    /// Appends a run that lies directly below the last one, merging the two if possible.
    fn push_run(&mut self, run: SegmentRun) {
        match self.runs.last_mut() {
            Some(last)
                if last.timeline_id == run.timeline_id
                    && last.status == run.status
                    && run.end_segment.next() == last.start_segment =>
            {
                last.start_segment = run.start_segment;
            }
            _ => self.runs.push(run),
        }
    }
}

/// Splits a missing run at the bounds of [`classify_missing_segment`], newest piece first.
fn split_missing_run(
    run: SegmentRun,
    newest_found: Option<SegmentNo>,
    uploading_window: u64,
) -> Vec<SegmentRun> {
    // Lowest segment number of each label, newest label first.
    let bounds = match newest_found {
        Some(newest) => vec![newest.get(), newest.get().saturating_sub(uploading_window), 0],
        None => vec![0],
    };

    let mut pieces = Vec::new();
    let mut upper = run.end_segment.get();
    for lower in bounds {
        let start = lower.max(run.start_segment.get());
        if start > upper {
            continue;
        }

        let status = classify_missing_segment(SegmentNo(start), newest_found, uploading_window);
        pieces.push(SegmentRun {
            start_segment: SegmentNo(start),
            end_segment: SegmentNo(upper),
            status: status.into(),
            ..run
        });

        match start.checked_sub(1) {
            Some(below) if below >= run.start_segment.get() => upper = below,
            _ => break,
        }
    }
    pieces
}

/// Judges a missing segment by its distance to the newest segment present in storage.
///
/// Gaps above everything archived are delayed. Gaps at most `uploading_window` segments below the
/// newest archived segment are probably still being uploaded by concurrent workers. Anything
/// further back is lost.
pub fn classify_missing_segment(
    missing: SegmentNo,
    newest_found: Option<SegmentNo>,
    uploading_window: u64,
) -> MissingSegmentStatus {
    match newest_found {
        Some(newest) if missing < newest => {
            if newest.get() - missing.get() <= uploading_window {
                MissingSegmentStatus::ProbablyUploading
            } else {
                MissingSegmentStatus::Lost
            }
        }
        _ => MissingSegmentStatus::ProbablyDelayed,
    }
}

/// Consecutive segments on one timeline sharing a status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentRun {
    /// The timeline of all segments in the run.
    pub timeline_id: TimelineId,
    /// The lowest segment number, inclusive.
    pub start_segment: SegmentNo,
    /// The highest segment number, inclusive.
    pub end_segment: SegmentNo,
    /// The shared status.
    pub status: ScannedSegmentStatus,
}

impl SegmentRun {
    /// Number of segments in the run.
    pub fn segments_count(&self) -> u64 {
        self.end_segment.get() - self.start_segment.get() + 1
    }
}
