use std::collections::BTreeSet;

use walvault_types::{SegmentNo, TimelineId};

use super::scanner::{MissingSegmentStatus, SegmentRun};

/// The segments of one timeline present in storage.
#[derive(Clone, Debug)]
pub struct SegmentsSequence {
    timeline: TimelineId,
    numbers: BTreeSet<SegmentNo>,
}

impl SegmentsSequence {
    /// Creates a sequence containing a single segment.
    pub fn new(timeline: TimelineId, first: SegmentNo) -> Self {
        Self {
            timeline,
            numbers: BTreeSet::from([first]),
        }
    }

    /// Adds a segment. Adding a segment twice has no effect.
    pub fn add_segment_no(&mut self, number: SegmentNo) {
        self.numbers.insert(number);
    }

    /// The timeline of this sequence.
    pub fn timeline(&self) -> TimelineId {
        self.timeline
    }

    /// The lowest stored segment.
    pub fn min_segment_no(&self) -> SegmentNo {
        self.numbers.first().copied().unwrap_or_default()
    }

    /// The highest stored segment.
    pub fn max_segment_no(&self) -> SegmentNo {
        self.numbers.last().copied().unwrap_or_default()
    }

    /// Number of distinct stored segments.
    pub fn segments_count(&self) -> u64 {
        self.numbers.len() as u64
    }

    /// Number of segments between the lowest and highest stored segment, both inclusive.
    pub fn range_size(&self) -> u64 {
        self.max_segment_no().get() - self.min_segment_no().get() + 1
    }

    /// Every segment number between the lowest and highest stored one that is not stored.
    ///
    /// Numbers are produced lazily. Prefer [`find_missing_ranges`](Self::find_missing_ranges)
    /// for anything that is kept around.
    pub fn find_missing_segments(&self) -> impl Iterator<Item = SegmentNo> + '_ {
        self.gaps()
            .flat_map(|(start, end)| (start.get()..=end.get()).map(SegmentNo))
    }

    /// Gaps between the lowest and highest stored segment, merged into runs with `status`.
    pub fn find_missing_ranges(&self, status: MissingSegmentStatus) -> Vec<SegmentRun> {
        self.gaps()
            .map(|(start_segment, end_segment)| SegmentRun {
                timeline_id: self.timeline,
                start_segment,
                end_segment,
                status: status.into(),
            })
            .collect()
    }

    /// Inclusive ranges of numbers absent between neighbouring stored segments.
    fn gaps(&self) -> impl Iterator<Item = (SegmentNo, SegmentNo)> + '_ {
        self.numbers
            .iter()
            .zip(self.numbers.iter().skip(1))
            .filter(|(lower, upper)| lower.next() != **upper)
            .map(|(lower, upper)| (lower.next(), SegmentNo(upper.get() - 1)))
    }
}
