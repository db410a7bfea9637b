//! WAL segment numbering.
//!
//! The WAL is cut into segments of a fixed [`SegmentSize`]. Every segment has a global
//! [`SegmentNo`] (its first LSN divided by the segment size) and lives on a timeline. The pair is
//! a [`SegmentDescription`], which has a canonical 24 character file name:
//!
//! ```text
//! 00000006 00000000 00000005
//! timeline log id   segment within the log id
//! ```
//!
//! A "log id" spans 4 GiB of WAL, so there are `2^32 / segment_size` segments per log id. All
//! numbering functions take the segment size as an explicit argument. Numbers computed under one
//! size are meaningless under another.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lsn::Lsn;

/// Default segment size of the log engine, 16 MiB.
pub const DEFAULT_SEGMENT_SIZE: u64 = 16 * 1024 * 1024;

/// Smallest segment size accepted by the log engine.
pub const MIN_SEGMENT_SIZE: u64 = 1024 * 1024;

/// Largest segment size accepted by the log engine.
pub const MAX_SEGMENT_SIZE: u64 = 1024 * 1024 * 1024;

/// Length of a segment file name in characters.
pub const SEGMENT_NAME_LEN: usize = 24;

/// Number of WAL bytes addressed by a single log id.
const LOG_ID_SPAN: u64 = 1 << 32;

/// Identifier of a timeline. Real timelines start at `1`.
pub type TimelineId = u32;

/// Error returned for segment sizes that the log engine cannot produce.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "invalid segment size {0}: must be a power of two between {MIN_SEGMENT_SIZE} and {MAX_SEGMENT_SIZE} bytes"
)]
pub struct InvalidSegmentSizeError(pub u64);

/// Errors that can occur when parsing a segment file name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidFilenameError {
    /// The name does not have exactly [`SEGMENT_NAME_LEN`] characters.
    #[error("segment name {0:?} must be exactly {SEGMENT_NAME_LEN} characters")]
    Length(String),

    /// The name contains characters other than upper-case hexadecimal digits.
    #[error("segment name {0:?} contains characters other than upper-case hex digits")]
    NotHex(String),

    /// The timeline component is zero.
    #[error("segment name {0:?} has timeline 0")]
    ZeroTimeline(String),

    /// The segment-within-log-id component exceeds the number of segments per log id.
    #[error("segment name {0:?} addresses segment {1:#X} beyond the end of its log id")]
    SegmentOutOfRange(String, u32),
}

/// Number of bytes per WAL segment.
///
/// Always a power of two in `[MIN_SEGMENT_SIZE, MAX_SEGMENT_SIZE]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct SegmentSize(u64);

impl SegmentSize {
    /// Validates and wraps a segment size in bytes.
    pub fn new(bytes: u64) -> Result<Self, InvalidSegmentSizeError> {
        if !bytes.is_power_of_two() || !(MIN_SEGMENT_SIZE..=MAX_SEGMENT_SIZE).contains(&bytes) {
            return Err(InvalidSegmentSizeError(bytes));
        }
        Ok(Self(bytes))
    }

    /// Returns the size in bytes.
    pub fn bytes(self) -> u64 {
        self.0
    }

    /// Returns how many segments make up one log id.
    pub fn segments_per_log_id(self) -> u64 {
        LOG_ID_SPAN / self.0
    }

    /// Returns the segment that contains the given position.
    pub fn segment_of(self, lsn: Lsn) -> SegmentNo {
        SegmentNo::from_lsn(lsn, self)
    }

    /// Parses a 24 character segment file name.
    ///
    /// Only the canonical upper-case form is accepted, so that parsing and
    /// [`SegmentDescription::filename`] are exact inverses.
    pub fn parse_filename(self, name: &str) -> Result<SegmentDescription, InvalidFilenameError> {
        if name.len() != SEGMENT_NAME_LEN {
            return Err(InvalidFilenameError::Length(name.to_owned()));
        }
        if !name.bytes().all(is_upper_hex) {
            return Err(InvalidFilenameError::NotHex(name.to_owned()));
        }

        let timeline = hex_field(&name[0..8]);
        let log_id = hex_field(&name[8..16]);
        let segment_in_log = hex_field(&name[16..24]);

        if timeline == 0 {
            return Err(InvalidFilenameError::ZeroTimeline(name.to_owned()));
        }

        let per_log_id = self.segments_per_log_id();
        if u64::from(segment_in_log) >= per_log_id {
            return Err(InvalidFilenameError::SegmentOutOfRange(
                name.to_owned(),
                segment_in_log,
            ));
        }

        let number = u64::from(log_id) * per_log_id + u64::from(segment_in_log);
        Ok(SegmentDescription {
            timeline,
            number: SegmentNo(number),
        })
    }
}

impl Default for SegmentSize {
    fn default() -> Self {
        Self(DEFAULT_SEGMENT_SIZE)
    }
}

impl TryFrom<u64> for SegmentSize {
    type Error = InvalidSegmentSizeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SegmentSize> for u64 {
    fn from(value: SegmentSize) -> Self {
        value.0
    }
}

fn is_upper_hex(b: u8) -> bool {
    b.is_ascii_digit() || (b'A'..=b'F').contains(&b)
}

/// Decodes up to eight upper-case hex digits that were already validated.
fn hex_field(digits: &str) -> u32 {
    digits.bytes().fold(0, |acc, b| {
        let value = match b {
            b'0'..=b'9' => b - b'0',
            _ => b - b'A' + 10,
        };
        (acc << 4) | u32::from(value)
    })
}

/// The global number of a WAL segment, independent of its timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentNo(pub u64);

impl SegmentNo {
    /// The first segment a freshly initialized database writes.
    pub const FIRST: SegmentNo = SegmentNo(1);

    /// Returns the raw segment number.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Returns the following segment.
    pub fn next(self) -> SegmentNo {
        SegmentNo(self.0 + 1)
    }

    /// Returns the preceding segment, or `None` for segment zero.
    pub fn previous(self) -> Option<SegmentNo> {
        self.0.checked_sub(1).map(SegmentNo)
    }

    /// Returns the segment containing `lsn` (floor division by the segment size).
    pub fn from_lsn(lsn: Lsn, size: SegmentSize) -> SegmentNo {
        SegmentNo(lsn.get() / size.bytes())
    }

    /// Returns the first LSN stored in this segment.
    pub fn first_lsn(self, size: SegmentSize) -> Lsn {
        Lsn(self.0 * size.bytes())
    }

    /// Places this segment on a timeline.
    pub fn on_timeline(self, timeline: TimelineId) -> SegmentDescription {
        SegmentDescription {
            timeline,
            number: self,
        }
    }
}

impl fmt::Display for SegmentNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A segment on a specific timeline.
///
/// Ordering is by timeline first, then by segment number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentDescription {
    /// The timeline this segment belongs to.
    pub timeline: TimelineId,
    /// The global segment number.
    pub number: SegmentNo,
}

impl SegmentDescription {
    /// Creates a description from its parts.
    pub fn new(timeline: TimelineId, number: SegmentNo) -> Self {
        Self { timeline, number }
    }

    /// Renders the canonical 24 character file name.
    pub fn filename(&self, size: SegmentSize) -> String {
        let per_log_id = size.segments_per_log_id();
        format!(
            "{:08X}{:08X}{:08X}",
            self.timeline,
            self.number.0 / per_log_id,
            self.number.0 % per_log_id
        )
    }

    /// Returns the segment with the previous number on the same timeline.
    pub fn previous(&self) -> Option<SegmentDescription> {
        self.number.previous().map(|number| number.on_timeline(self.timeline))
    }
}
