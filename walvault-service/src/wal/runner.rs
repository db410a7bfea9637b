use std::collections::{BTreeMap, HashSet};
use std::fmt;

use thiserror::Error;
use walvault_types::{HistoryRecord, SegmentDescription, SegmentNo, SegmentSize};

/// Timeline switches keyed by the segment containing the switch point.
///
/// Walking backwards from a key segment continues on the record's parent timeline.
pub type TimelineSwitchMap = BTreeMap<SegmentNo, HistoryRecord>;

/// Builds the switch map for the history of a timeline.
///
/// Records are expected oldest first, as they appear in the history file. When several switches
/// fall into the same segment, the oldest one wins: the intermediate timelines never completed a
/// segment of their own before that point.
pub fn timeline_switch_map(history: &[HistoryRecord], size: SegmentSize) -> TimelineSwitchMap {
    let mut switches = TimelineSwitchMap::new();
    for record in history {
        switches
            .entry(SegmentNo::from_lsn(record.switch_point, size))
            .or_insert_with(|| record.clone());
    }
    switches
}

/// Reasons a [`SegmentRunner`] cannot step further.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
    /// The predecessor is not in storage. The runner did not move.
    #[error("segment {} on timeline {} not found", .0.number, .0.timeline)]
    SegmentNotFound(SegmentDescription),
    /// The predecessor would lie below the stop segment.
    #[error("reached stop segment {stop}")]
    ReachedStopSegment {
        /// The lowest segment the runner may visit.
        stop: SegmentNo,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunnerState {
    Positioned,
    Exhausted,
}

/// Walks segments backwards from a starting segment down to a stop segment.
///
/// Each step moves to the segment with the next lower number. The timeline changes when the
/// current segment is a timeline switch point, following the history of the starting timeline.
/// The starting segment itself is never reported.
pub struct SegmentRunner<'a> {
    current: SegmentDescription,
    state: RunnerState,
    stop_segment_no: SegmentNo,
    known_segments: &'a HashSet<SegmentDescription>,
    switches: &'a TimelineSwitchMap,
    stop_on_missing: Option<&'a dyn Fn(SegmentDescription) -> bool>,
}

impl<'a> SegmentRunner<'a> {
    /// Creates a runner positioned at `start`.
    pub fn new(
        start: SegmentDescription,
        stop_segment_no: SegmentNo,
        known_segments: &'a HashSet<SegmentDescription>,
        switches: &'a TimelineSwitchMap,
    ) -> Self {
        Self {
            current: start,
            state: RunnerState::Positioned,
            stop_segment_no,
            known_segments,
            switches,
            stop_on_missing: None,
        }
    }

    /// Ends the walk at a missing segment for which `policy` returns `true`.
    ///
    /// [`next`](Self::next) then reports [`RunnerError::ReachedStopSegment`] instead of
    /// [`RunnerError::SegmentNotFound`], and the runner stays exhausted.
    pub fn with_stop_on_missing(mut self, policy: &'a dyn Fn(SegmentDescription) -> bool) -> Self {
        self.stop_on_missing = Some(policy);
        self
    }

    /// The segment the runner is positioned at.
    pub fn current(&self) -> SegmentDescription {
        self.current
    }

    /// Moves to the predecessor if it exists in storage.
    pub fn next(&mut self) -> Result<SegmentDescription, RunnerError> {
        let predecessor = self.predecessor()?;
        if !self.known_segments.contains(&predecessor) {
            if self.stop_on_missing.is_some_and(|policy| policy(predecessor)) {
                self.state = RunnerState::Exhausted;
                return Err(RunnerError::ReachedStopSegment {
                    stop: self.stop_segment_no,
                });
            }
            return Err(RunnerError::SegmentNotFound(predecessor));
        }
        self.current = predecessor;
        Ok(predecessor)
    }

    /// Moves to the predecessor regardless of whether it exists in storage.
    pub fn force_move_next(&mut self) -> Result<SegmentDescription, RunnerError> {
        let predecessor = self.predecessor()?;
        self.current = predecessor;
        Ok(predecessor)
    }

    fn predecessor(&mut self) -> Result<SegmentDescription, RunnerError> {
        let reached = RunnerError::ReachedStopSegment {
            stop: self.stop_segment_no,
        };
        if self.state == RunnerState::Exhausted {
            return Err(reached);
        }

        let number = self
            .current
            .number
            .previous()
            .filter(|number| *number >= self.stop_segment_no);
        let Some(number) = number else {
            self.state = RunnerState::Exhausted;
            return Err(reached);
        };

        let timeline = match self.switches.get(&self.current.number) {
            Some(record) => record.parent_timeline,
            None => self.current.timeline,
        };
        Ok(SegmentDescription::new(timeline, number))
    }
}

impl fmt::Debug for SegmentRunner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentRunner")
            .field("current", &self.current)
            .field("state", &self.state)
            .field("stop_segment_no", &self.stop_segment_no)
            .field("stop_on_missing", &self.stop_on_missing.is_some())
            .finish_non_exhaustive()
    }
}
