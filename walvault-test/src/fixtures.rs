//! Builders for WAL archives held in memory.
//!
//! ```
//! use walvault_test::fixtures::ArchiveFixture;
//!
//! let archive = ArchiveFixture::new();
//! archive.segments(1, 1..=4);
//! archive.history(2, "1\t0/4000000\tno recovery target specified\n");
//! let storage = archive.storage();
//! ```

use walvault_service::WalStorage;
use walvault_service::backend::InMemoryBackend;
use walvault_service::backup::BackupSentinel;
use walvault_service::layout::{BACKUPS_FOLDER, SENTINEL_SUFFIX, WAL_FOLDER};
use walvault_types::history::history_filename;
use walvault_types::{Lsn, SegmentDescription, SegmentNo, SegmentSize, TimelineId};

/// An in-memory archive with helpers to add segments, history files and backups.
#[derive(Debug, Clone, Default)]
pub struct ArchiveFixture {
    backend: InMemoryBackend,
    segment_size: SegmentSize,
}

impl ArchiveFixture {
    /// Creates an empty archive using the default segment size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty archive using the given segment size.
    pub fn with_segment_size(segment_size: SegmentSize) -> Self {
        Self {
            backend: InMemoryBackend::new(),
            segment_size,
        }
    }

    /// Adds a single zstd-named segment. The payload is not a valid WAL segment.
    pub fn segment(&self, timeline: TimelineId, number: u64) -> &Self {
        let name = SegmentDescription::new(timeline, SegmentNo(number)).filename(self.segment_size);
        self.backend.insert(format!("{WAL_FOLDER}{name}.zst"), "");
        self
    }

    /// Adds every segment number in `numbers` on `timeline`.
    pub fn segments(&self, timeline: TimelineId, numbers: impl IntoIterator<Item = u64>) -> &Self {
        for number in numbers {
            self.segment(timeline, number);
        }
        self
    }

    /// Adds an uncompressed history file for `timeline`.
    pub fn history(&self, timeline: TimelineId, contents: &str) -> &Self {
        let name = history_filename(timeline);
        self.backend
            .insert(format!("{WAL_FOLDER}{name}"), contents.to_owned());
        self
    }

    /// Adds a full backup with its stop sentinel. The backup starts at `start_lsn`.
    pub fn backup(&self, timeline: TimelineId, start_lsn: Lsn, finish_lsn: Lsn) -> &Self {
        let start = SegmentNo::from_lsn(start_lsn, self.segment_size).on_timeline(timeline);
        let name = format!("base_{}", start.filename(self.segment_size));
        let sentinel = BackupSentinel {
            start_lsn,
            finish_lsn,
            is_permanent: false,
        };
        let json = serde_json::to_vec(&sentinel).unwrap();
        self.backend
            .insert(format!("{BACKUPS_FOLDER}{name}{SENTINEL_SUFFIX}"), json);
        self
    }

    /// A handle to the underlying backend.
    pub fn backend(&self) -> InMemoryBackend {
        self.backend.clone()
    }

    /// The segment size used for names in this archive.
    pub fn segment_size(&self) -> SegmentSize {
        self.segment_size
    }

    /// A [`WalStorage`] reading this archive.
    pub fn storage(&self) -> WalStorage {
        WalStorage::from_backend(Box::new(self.backend.clone()), self.segment_size)
    }
}
