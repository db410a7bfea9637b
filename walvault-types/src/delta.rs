//! Delta unit addressing for incremental backups.
//!
//! Incremental backups do not replay WAL segment by segment. Instead, consecutive segments are
//! grouped into fixed-size delta units of [`SEGMENTS_PER_DELTA`] segments, and a delta artifact
//! summarizes the pages touched within one unit. To restore an LSN interval, complete units are
//! read from their delta artifacts and the partially used last unit is read as raw WAL.

use crate::lsn::Lsn;
use crate::segment::{SegmentDescription, SegmentNo, SegmentSize, TimelineId};

/// Number of consecutive WAL segments grouped into one delta unit.
pub const SEGMENTS_PER_DELTA: u64 = 16;

/// Suffix appended to the first segment's file name to form a delta artifact name.
pub const DELTA_FILENAME_SUFFIX: &str = "_delta";

/// The number of a delta unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeltaNo(pub u64);

impl DeltaNo {
    /// Returns the delta unit containing `segment_no`.
    pub fn from_segment_no(segment_no: SegmentNo) -> DeltaNo {
        DeltaNo(segment_no.get() / SEGMENTS_PER_DELTA)
    }

    /// Returns the delta unit containing `lsn`.
    pub fn from_lsn(lsn: Lsn, size: SegmentSize) -> DeltaNo {
        Self::from_segment_no(SegmentNo::from_lsn(lsn, size))
    }

    /// Returns the following delta unit.
    pub fn next(self) -> DeltaNo {
        DeltaNo(self.0 + 1)
    }

    /// Returns the first segment of this unit.
    pub fn first_wal_segment_no(self) -> SegmentNo {
        SegmentNo(self.0 * SEGMENTS_PER_DELTA)
    }

    /// Returns the first LSN covered by this unit.
    pub fn first_lsn(self, size: SegmentSize) -> Lsn {
        self.first_wal_segment_no().first_lsn(size)
    }

    /// Returns the artifact name of this unit on the given timeline.
    pub fn filename(self, timeline: TimelineId, size: SegmentSize) -> String {
        let first = SegmentDescription::new(timeline, self.first_wal_segment_no());
        format!("{}{DELTA_FILENAME_SUFFIX}", first.filename(size))
    }
}

/// Returns the half-open range of delta units covering `[first_used_lsn, first_not_used_lsn)`.
///
/// A unit that starts exactly at `first_not_used_lsn` is not part of the range. An empty LSN
/// interval yields the single unit containing the point.
pub fn get_delta_range(
    first_used_lsn: Lsn,
    first_not_used_lsn: Lsn,
    size: SegmentSize,
) -> (DeltaNo, DeltaNo) {
    let first_used = DeltaNo::from_lsn(first_used_lsn, size);
    let first_not_used = match first_not_used_lsn.checked_prev() {
        Some(last_used) if first_not_used_lsn > first_used_lsn => {
            DeltaNo::from_lsn(last_used, size).next()
        }
        _ => first_used.next(),
    };
    (first_used, first_not_used)
}

/// Returns the half-open segment range of the partially used unit starting at
/// `first_not_used_delta_no`, ending with the segment that holds the byte before
/// `first_not_used_lsn`.
///
/// The range is empty when `first_not_used_lsn` lies on or before the unit's first byte.
pub fn get_wal_segment_range(
    first_not_used_delta_no: DeltaNo,
    first_not_used_lsn: Lsn,
    size: SegmentSize,
) -> (SegmentNo, SegmentNo) {
    let first = first_not_used_delta_no.first_wal_segment_no();
    let first_not_used = first_not_used_lsn
        .checked_prev()
        .map(|last_used| SegmentNo::from_lsn(last_used, size).next())
        .unwrap_or(first);
    (first, first_not_used.max(first))
}

/// Artifacts needed to replay the WAL of an LSN interval on top of an incremental backup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeltaFetchPlan {
    /// Complete delta units, read from their delta artifacts.
    pub delta_units: (DeltaNo, DeltaNo),
    /// Segments of the partially used last unit, read as raw WAL.
    pub wal_segments: (SegmentNo, SegmentNo),
}

impl DeltaFetchPlan {
    /// Plans the fetch of `[first_used_lsn, first_not_used_lsn)`.
    ///
    /// Starts from the covering range of [`get_delta_range`] and drops its last unit if
    /// `first_not_used_lsn` falls inside it. That unit is read from `wal_segments` instead.
    pub fn new(first_used_lsn: Lsn, first_not_used_lsn: Lsn, size: SegmentSize) -> Self {
        let (first_used, covering_end) = get_delta_range(first_used_lsn, first_not_used_lsn, size);
        let first_not_used =
            DeltaNo::from_lsn(first_not_used_lsn, size).clamp(first_used, covering_end);
        Self {
            delta_units: (first_used, first_not_used),
            wal_segments: get_wal_segment_range(first_not_used, first_not_used_lsn, size),
        }
    }

    /// Names of the delta artifacts to fetch, oldest first.
    pub fn delta_filenames(&self, timeline: TimelineId, size: SegmentSize) -> Vec<String> {
        let (DeltaNo(first), DeltaNo(end)) = self.delta_units;
        (first..end)
            .map(|delta| DeltaNo(delta).filename(timeline, size))
            .collect()
    }

    /// Names of the raw WAL segments to fetch, oldest first.
    pub fn wal_segment_filenames(&self, timeline: TimelineId, size: SegmentSize) -> Vec<String> {
        let (SegmentNo(first), SegmentNo(end)) = self.wal_segments;
        (first..end)
            .map(|number| SegmentDescription::new(timeline, SegmentNo(number)).filename(size))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_bytes(size: SegmentSize) -> u64 {
        size.bytes() * SEGMENTS_PER_DELTA
    }

    #[test]
    fn delta_numbering() {
        let size = SegmentSize::default();
        assert_eq!(DeltaNo::from_segment_no(SegmentNo(15)), DeltaNo(0));
        assert_eq!(DeltaNo::from_segment_no(SegmentNo(16)), DeltaNo(1));
        assert_eq!(DeltaNo(2).first_wal_segment_no(), SegmentNo(32));
        assert_eq!(DeltaNo(1).first_lsn(size), Lsn(16 * size.bytes()));
        assert_eq!(DeltaNo(1).next(), DeltaNo(2));
        assert_eq!(
            DeltaNo(1).filename(1, size),
            "000000010000000000000010_delta"
        );
    }

    #[test]
    fn empty_interval_is_single_unit() {
        let size = SegmentSize::default();
        for lsn in [0, 1, delta_bytes(size) - 1, delta_bytes(size), 5 * delta_bytes(size) + 7] {
            let (first, end) = get_delta_range(Lsn(lsn), Lsn(lsn), size);
            assert_eq!(end, first.next());
            assert!(first.first_lsn(size) <= Lsn(lsn));
            assert!(end.first_lsn(size) > Lsn(lsn));
        }
    }

    #[test]
    fn boundary_unit_is_excluded() {
        let size = SegmentSize::default();
        let unit = delta_bytes(size);
        assert_eq!(
            get_delta_range(Lsn(0), Lsn(unit), size),
            (DeltaNo(0), DeltaNo(1))
        );
        assert_eq!(
            get_delta_range(Lsn(0), Lsn(unit + 1), size),
            (DeltaNo(0), DeltaNo(2))
        );
        assert_eq!(
            get_delta_range(Lsn(unit + 5), Lsn(3 * unit), size),
            (DeltaNo(1), DeltaNo(3))
        );
    }

    #[test]
    fn delta_range_is_monotone() {
        let size = SegmentSize::default();
        let unit = delta_bytes(size);
        let points = [0, 1, unit - 1, unit, unit + 1, 2 * unit, 7 * unit + 3];

        for &a1 in &points {
            for &a2 in points.iter().filter(|&&a2| a2 >= a1) {
                for &b1 in points.iter().filter(|&&b1| b1 >= a1) {
                    for &b2 in points.iter().filter(|&&b2| b2 >= b1 && b2 >= a2) {
                        let (first1, end1) = get_delta_range(Lsn(a1), Lsn(b1), size);
                        let (first2, end2) = get_delta_range(Lsn(a2), Lsn(b2), size);
                        assert!(first1 <= first2, "first: {a1} {a2}");
                        assert!(end1 <= end2, "end: {a1},{b1} {a2},{b2}");
                    }
                }
            }
        }
    }

    #[test]
    fn wal_segment_range_follows_half_open_rule() {
        let size = SegmentSize::default();
        let seg = size.bytes();

        // On the unit boundary nothing is left to read as raw WAL.
        assert_eq!(
            get_wal_segment_range(DeltaNo(1), Lsn(16 * seg), size),
            (SegmentNo(16), SegmentNo(16))
        );
        // One byte into the unit needs its first segment.
        assert_eq!(
            get_wal_segment_range(DeltaNo(1), Lsn(16 * seg + 1), size),
            (SegmentNo(16), SegmentNo(17))
        );
        // A segment boundary inside the unit excludes that segment.
        assert_eq!(
            get_wal_segment_range(DeltaNo(1), Lsn(19 * seg), size),
            (SegmentNo(16), SegmentNo(19))
        );
        assert_eq!(
            get_wal_segment_range(DeltaNo(0), Lsn(0), size),
            (SegmentNo(0), SegmentNo(0))
        );
    }

    #[test]
    fn fetch_plan_splits_complete_and_partial_units() {
        let size = SegmentSize::default();
        let seg = size.bytes();

        let plan = DeltaFetchPlan::new(Lsn(2 * seg), Lsn(35 * seg + 10), size);
        assert_eq!(plan.delta_units, (DeltaNo(0), DeltaNo(2)));
        assert_eq!(plan.wal_segments, (SegmentNo(32), SegmentNo(36)));
        assert_eq!(
            plan.delta_filenames(2, size),
            [
                "000000020000000000000000_delta",
                "000000020000000000000010_delta"
            ]
        );
        assert_eq!(
            plan.wal_segment_filenames(2, size),
            [
                "000000020000000000000020",
                "000000020000000000000021",
                "000000020000000000000022",
                "000000020000000000000023"
            ]
        );
    }

    #[test]
    fn fetch_plan_within_single_unit() {
        let size = SegmentSize::default();
        let seg = size.bytes();

        let plan = DeltaFetchPlan::new(Lsn(18 * seg), Lsn(20 * seg), size);
        assert_eq!(plan.delta_units, (DeltaNo(1), DeltaNo(1)));
        assert_eq!(plan.wal_segments, (SegmentNo(16), SegmentNo(20)));
        assert!(plan.delta_filenames(1, size).is_empty());
    }

    #[test]
    fn fetch_plan_agrees_with_delta_range() {
        let size = SegmentSize::default();
        let seg = size.bytes();
        let points = [0, 1, seg - 1, seg, 16 * seg - 1, 16 * seg, 16 * seg + 1, 40 * seg + 7];

        for &from in &points {
            for &to in points.iter().filter(|&&to| to > from) {
                let (from, to) = (Lsn(from), Lsn(to));
                let plan = DeltaFetchPlan::new(from, to, size);
                let (first, covering_end) = get_delta_range(from, to, size);

                let (wal_first, wal_end) = plan.wal_segments;
                let partial = u64::from(wal_first < wal_end);
                assert_eq!(plan.delta_units.0, first, "{from}..{to}");
                assert_eq!(DeltaNo(plan.delta_units.1.0 + partial), covering_end, "{from}..{to}");
            }
        }
    }
}
