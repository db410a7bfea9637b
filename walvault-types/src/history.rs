//! Timeline history files.
//!
//! When a database is promoted after a point-in-time recovery or failover, it starts a new
//! timeline and writes a `<timeline>.history` file. Each line names one ancestor timeline and the
//! LSN at which its child branched off:
//!
//! ```text
//! 1	0/3000000	no recovery target specified
//! 2	0/5000000	before 2024-01-01 00:00:00+00
//! ```
//!
//! The file of a timeline lists its whole ancestry, oldest first, so the last record names the
//! direct parent. Blank lines and lines starting with `#` are ignored.

use crate::lsn::Lsn;
use crate::segment::TimelineId;

/// Suffix of timeline history file names.
pub const HISTORY_FILE_SUFFIX: &str = ".history";

/// One line of a history file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryRecord {
    /// The timeline that was branched from.
    pub parent_timeline: TimelineId,
    /// The position at which the child timeline diverged from `parent_timeline`.
    pub switch_point: Lsn,
    /// Free-form reason written by the database.
    pub comment: String,
}

/// Errors that can occur when parsing a history file.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HistoryParseError {
    /// A line does not contain a timeline and a switch point.
    #[error("line {line}: expected `<timeline>\\t<lsn>\\t<comment>`")]
    MissingField {
        /// One-based line number.
        line: usize,
    },

    /// The timeline field is not a positive decimal number.
    #[error("line {line}: invalid parent timeline {value:?}")]
    InvalidTimeline {
        /// One-based line number.
        line: usize,
        /// The offending field.
        value: String,
    },

    /// The switch point is not a valid LSN.
    #[error("line {line}: invalid switch point {value:?}")]
    InvalidSwitchPoint {
        /// One-based line number.
        line: usize,
        /// The offending field.
        value: String,
    },
}

/// Parses the contents of a history file into its records, oldest first.
pub fn parse_history(contents: &str) -> Result<Vec<HistoryRecord>, HistoryParseError> {
    let mut records = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut fields = trimmed.splitn(3, '\t');
        let (Some(timeline), Some(switch_point)) = (fields.next(), fields.next()) else {
            return Err(HistoryParseError::MissingField { line: line_no });
        };

        let parent_timeline = timeline
            .trim()
            .parse::<TimelineId>()
            .ok()
            .filter(|&timeline| timeline > 0)
            .ok_or_else(|| HistoryParseError::InvalidTimeline {
                line: line_no,
                value: timeline.to_owned(),
            })?;

        let switch_point = switch_point.trim().parse::<Lsn>().map_err(|_| {
            HistoryParseError::InvalidSwitchPoint {
                line: line_no,
                value: switch_point.to_owned(),
            }
        })?;

        records.push(HistoryRecord {
            parent_timeline,
            switch_point,
            comment: fields.next().unwrap_or_default().trim().to_owned(),
        });
    }

    Ok(records)
}

/// Returns the history file name of a timeline, e.g. `00000002.history`.
pub fn history_filename(timeline: TimelineId) -> String {
    format!("{timeline:08X}{HISTORY_FILE_SUFFIX}")
}

/// Extracts the timeline from a history file name, if `name` is one.
pub fn parse_history_filename(name: &str) -> Option<TimelineId> {
    let digits = name.strip_suffix(HISTORY_FILE_SUFFIX)?;
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    TimelineId::from_str_radix(digits, 16)
        .ok()
        .filter(|&timeline| timeline > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_ancestry() {
        let contents = "1\t0/3000000\tno recovery target specified\n\n\
                        2\t0/5000028\tbefore 2024-01-01 00:00:00+00\n";
        let records = parse_history(contents).unwrap();
        assert_eq!(
            records,
            [
                HistoryRecord {
                    parent_timeline: 1,
                    switch_point: Lsn(0x3000000),
                    comment: "no recovery target specified".into(),
                },
                HistoryRecord {
                    parent_timeline: 2,
                    switch_point: Lsn(0x5000028),
                    comment: "before 2024-01-01 00:00:00+00".into(),
                },
            ]
        );
    }

    #[test]
    fn tolerates_comments_and_missing_reason() {
        let records = parse_history("# comment\n5\t1/0\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].parent_timeline, 5);
        assert_eq!(records[0].switch_point, Lsn(1 << 32));
        assert_eq!(records[0].comment, "");
        assert!(parse_history("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(
            parse_history("1\t0/1\tok\n7\n"),
            Err(HistoryParseError::MissingField { line: 2 })
        );
        assert!(matches!(
            parse_history("x\t0/1\tcomment"),
            Err(HistoryParseError::InvalidTimeline { line: 1, .. })
        ));
        assert!(matches!(
            parse_history("0\t0/1\tcomment"),
            Err(HistoryParseError::InvalidTimeline { line: 1, .. })
        ));
        assert!(matches!(
            parse_history("1\t01\tcomment"),
            Err(HistoryParseError::InvalidSwitchPoint { line: 1, .. })
        ));
    }

    #[test]
    fn history_file_names() {
        assert_eq!(history_filename(6), "00000006.history");
        assert_eq!(history_filename(0x1A), "0000001A.history");
        assert_eq!(parse_history_filename("0000001A.history"), Some(0x1A));
        assert_eq!(parse_history_filename("00000000.history"), None);
        assert_eq!(parse_history_filename("0000001A.backup"), None);
        assert_eq!(parse_history_filename("1A.history"), None);
    }
}
