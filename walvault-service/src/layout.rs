//! Object naming inside the archive.
//!
//! ```text
//! wal_005/
//!   000000010000000000000001.zst          WAL segment (compressed)
//!   000000020000000000000005              WAL segment (plain)
//!   00000002.history.zst                  timeline history file
//!   000000010000000000000002.00000028.backup.zst    backup label, ignored
//! basebackups_005/
//!   base_000000010000000000000002_backup_stop_sentinel.json
//! ```
//!
//! Stored names carry an optional codec extension. Listings strip it to recover the logical
//! name before parsing.

use walvault_types::history::parse_history_filename;
use walvault_types::{SegmentDescription, SegmentSize, TimelineId};

/// Folder containing WAL segments and history files.
pub const WAL_FOLDER: &str = "wal_005/";

/// Folder containing base backups and their sentinels.
pub const BACKUPS_FOLDER: &str = "basebackups_005/";

/// Suffix of the sentinel document written when a backup completes.
pub const SENTINEL_SUFFIX: &str = "_backup_stop_sentinel.json";

/// Codec extensions that may follow a logical object name.
const CODEC_EXTENSIONS: &[&str] = &["zst", "lz4", "lzma", "br", "gz"];

/// Extension used for zstd-compressed objects.
pub const ZSTD_EXTENSION: &str = "zst";

/// Splits a stored object name into its logical name and codec extension.
pub fn split_codec_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((base, extension)) if CODEC_EXTENSIONS.contains(&extension) => {
            (base, Some(extension))
        }
        _ => (name, None),
    }
}

/// What a stored object in [`WAL_FOLDER`] represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalObject {
    /// A complete WAL segment.
    Segment(SegmentDescription),
    /// The history file of a timeline.
    History(TimelineId),
    /// Anything else, such as partial segments or backup labels.
    Other,
}

/// Classifies a stored object name from [`WAL_FOLDER`].
pub fn classify_wal_object(name: &str, size: SegmentSize) -> WalObject {
    let (base, _) = split_codec_extension(name);
    if let Ok(segment) = size.parse_filename(base) {
        return WalObject::Segment(segment);
    }
    match parse_history_filename(base) {
        Some(timeline) => WalObject::History(timeline),
        None => WalObject::Other,
    }
}

#[cfg(test)]
mod tests {
    use walvault_types::SegmentNo;

    use super::*;

    #[test]
    fn strips_known_codecs_only() {
        assert_eq!(
            split_codec_extension("000000010000000000000001.zst"),
            ("000000010000000000000001", Some("zst"))
        );
        assert_eq!(
            split_codec_extension("00000002.history"),
            ("00000002.history", None)
        );
        assert_eq!(
            split_codec_extension("00000002.history.br"),
            ("00000002.history", Some("br"))
        );
        assert_eq!(split_codec_extension("plain"), ("plain", None));
    }

    #[test]
    fn classifies_folder_contents() {
        let size = SegmentSize::default();
        assert_eq!(
            classify_wal_object("000000030000000000000009.lz4", size),
            WalObject::Segment(SegmentDescription::new(3, SegmentNo(9)))
        );
        assert_eq!(
            classify_wal_object("000000030000000000000009", size),
            WalObject::Segment(SegmentDescription::new(3, SegmentNo(9)))
        );
        assert_eq!(
            classify_wal_object("00000003.history.zst", size),
            WalObject::History(3)
        );
        assert_eq!(
            classify_wal_object("000000030000000000000009.partial.zst", size),
            WalObject::Other
        );
        assert_eq!(
            classify_wal_object("000000010000000000000002.00000028.backup.zst", size),
            WalObject::Other
        );
    }
}
