//! Base backups and their stop sentinels.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use walvault_types::{Lsn, SegmentDescription, SegmentSize};

use crate::error::{Error, Result};
use crate::layout::SENTINEL_SUFFIX;

const BACKUP_NAME_PREFIX: &str = "base_";
const DELTA_MARKER: &str = "_D_";

/// The parsed name of a base backup, e.g. `base_000000010000000000000002`.
///
/// Delta backups additionally name the backup they are based on:
/// `base_000000010000000000000004_D_000000010000000000000002`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackupName {
    /// The segment in which the backup started.
    pub start: SegmentDescription,
    /// For delta backups, the start segment of the base it increments.
    pub delta_from: Option<SegmentDescription>,
}

impl BackupName {
    /// Parses a backup name.
    pub fn parse(name: &str, size: SegmentSize) -> Result<Self> {
        let invalid = || Error::InvalidBackupName(name.to_owned());
        let rest = name.strip_prefix(BACKUP_NAME_PREFIX).ok_or_else(invalid)?;

        let (start, delta_from) = match rest.split_once(DELTA_MARKER) {
            Some((start, base)) => (start, Some(base)),
            None => (rest, None),
        };

        let start = size.parse_filename(start).map_err(|_| invalid())?;
        let delta_from = delta_from
            .map(|base| size.parse_filename(base).map_err(|_| invalid()))
            .transpose()?;

        Ok(Self { start, delta_from })
    }

    /// Parses the name of a sentinel object, returning `None` for other objects.
    pub fn from_sentinel_name(object_name: &str, size: SegmentSize) -> Option<Result<Self>> {
        object_name
            .strip_suffix(SENTINEL_SUFFIX)
            .map(|name| Self::parse(name, size))
    }
}

/// The contents of a backup stop sentinel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSentinel {
    /// The LSN at which the backup started.
    pub start_lsn: Lsn,
    /// The LSN at which the backup finished.
    pub finish_lsn: Lsn,
    /// Permanent backups are exempt from retention.
    #[serde(default)]
    pub is_permanent: bool,
}

/// A base backup found in storage.
#[derive(Clone, Debug)]
pub struct BackupInfo {
    /// The backup name, without the sentinel suffix.
    pub name: String,
    /// The parsed backup name.
    pub parsed: BackupName,
    /// Modification time of the sentinel object.
    pub last_modified: SystemTime,
    /// The sentinel contents, loaded on demand.
    pub sentinel: Option<BackupSentinel>,
}

impl BackupInfo {
    /// The segment in which the backup started.
    pub fn start_segment(&self) -> SegmentDescription {
        self.parsed.start
    }

    /// Returns the storage path of the stop sentinel.
    pub fn sentinel_path(&self) -> String {
        format!("{}{}{SENTINEL_SUFFIX}", crate::layout::BACKUPS_FOLDER, self.name)
    }
}

#[cfg(test)]
mod tests {
    use walvault_types::SegmentNo;

    use super::*;

    #[test]
    fn parses_full_and_delta_names() {
        let size = SegmentSize::default();

        let full = BackupName::parse("base_000000010000000000000002", size).unwrap();
        assert_eq!(full.start, SegmentDescription::new(1, SegmentNo(2)));
        assert_eq!(full.delta_from, None);

        let delta = BackupName::parse(
            "base_000000020000000000000010_D_000000010000000000000002",
            size,
        )
        .unwrap();
        assert_eq!(delta.start, SegmentDescription::new(2, SegmentNo(0x10)));
        assert_eq!(
            delta.delta_from,
            Some(SegmentDescription::new(1, SegmentNo(2)))
        );
    }

    #[test]
    fn rejects_malformed_names() {
        let size = SegmentSize::default();
        for name in [
            "000000010000000000000002",
            "base_",
            "base_0000000100000000000000",
            "base_000000010000000000000002_D_",
            "base_000000010000000000000002_X_000000010000000000000001",
        ] {
            assert!(
                matches!(BackupName::parse(name, size), Err(Error::InvalidBackupName(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn recognizes_sentinels() {
        let size = SegmentSize::default();
        let parsed = BackupName::from_sentinel_name(
            "base_000000010000000000000002_backup_stop_sentinel.json",
            size,
        );
        assert!(matches!(parsed, Some(Ok(_))));
        assert!(BackupName::from_sentinel_name("base_000000010000000000000002", size).is_none());
    }

    #[test]
    fn sentinel_json() {
        let sentinel: BackupSentinel =
            serde_json::from_str(r#"{"start_lsn":"0/2000028","finish_lsn":"0/2000138"}"#).unwrap();
        assert_eq!(sentinel.start_lsn, Lsn(0x2000028));
        assert_eq!(sentinel.finish_lsn, Lsn(0x2000138));
        assert!(!sentinel.is_permanent);
    }
}
