//! Access to the WAL archive.
//!
//! [`WalStorage`] is the entry point for everything that touches storage: it lists the archive
//! into a [`StorageSnapshot`], reads history files and backup sentinels, and pushes or fetches
//! individual WAL files. All analysis in [`crate::wal`] works on snapshots and never performs
//! I/O itself.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use futures_util::future::try_join_all;
use walvault_types::history::{history_filename, parse_history};
use walvault_types::{HistoryRecord, SegmentDescription, SegmentSize, TimelineId};

use crate::PayloadStream;
use crate::backend::{BoxedBackend, LocalFs, ObjectInfo};
use crate::backup::{BackupInfo, BackupName, BackupSentinel};
use crate::compression;
use crate::error::{Error, Result};
use crate::layout::{
    BACKUPS_FOLDER, WAL_FOLDER, WalObject, ZSTD_EXTENSION, classify_wal_object,
    split_codec_extension,
};
use crate::stream::read_to_vec;
use crate::wal::SegmentsSequence;

/// Configuration to initialize a [`WalStorage`].
#[derive(Debug, Clone)]
pub enum StorageConfig<'a> {
    /// Use a local filesystem as the storage backend.
    FileSystem {
        /// The path to the directory containing the archive folders.
        path: &'a Path,
    },
}

/// High-level asynchronous access to a WAL archive.
#[derive(Clone, Debug)]
pub struct WalStorage(Arc<WalStorageInner>);

#[derive(Debug)]
struct WalStorageInner {
    backend: BoxedBackend,
    segment_size: SegmentSize,
}

impl WalStorage {
    /// Creates a new `WalStorage` with the specified configuration.
    pub fn new(config: StorageConfig<'_>, segment_size: SegmentSize) -> Self {
        let backend: BoxedBackend = match config {
            StorageConfig::FileSystem { path } => Box::new(LocalFs::new(path)),
        };
        Self::from_backend(backend, segment_size)
    }

    /// Creates a `WalStorage` on top of an existing backend.
    pub fn from_backend(backend: BoxedBackend, segment_size: SegmentSize) -> Self {
        Self(Arc::new(WalStorageInner {
            backend,
            segment_size,
        }))
    }

    /// The segment size this archive was written with.
    pub fn segment_size(&self) -> SegmentSize {
        self.0.segment_size
    }

    /// Lists the archive.
    ///
    /// Objects in the WAL folder that are neither complete segments nor history files are
    /// skipped, as are sentinels whose backup name cannot be parsed.
    pub async fn snapshot(&self) -> Result<StorageSnapshot> {
        let backend = &self.0.backend;
        let (wal, backups) = tokio::try_join!(
            backend.list_folder(WAL_FOLDER),
            backend.list_folder(BACKUPS_FOLDER)
        )?;

        let mut snapshot = StorageSnapshot::default();
        for object in wal.objects {
            snapshot.add_wal_object(object, self.segment_size());
        }
        for object in backups.objects {
            snapshot.add_sentinel(object, self.segment_size());
        }
        snapshot.backups.sort_by_key(|backup| backup.start_segment());

        tracing::debug!(
            backend = backend.name(),
            segments = snapshot.segments.len(),
            histories = snapshot.history_objects.len(),
            backups = snapshot.backups.len(),
            "Listed WAL archive"
        );
        Ok(snapshot)
    }

    /// Reads and parses the history file of `timeline`.
    ///
    /// Returns an empty history if the archive has no history file for this timeline.
    pub async fn read_history(
        &self,
        snapshot: &StorageSnapshot,
        timeline: TimelineId,
    ) -> Result<Vec<HistoryRecord>> {
        let Some(object_name) = snapshot.history_objects.get(&timeline) else {
            return Ok(Vec::new());
        };

        let contents = self.read_object(WAL_FOLDER, object_name).await?;
        let contents = String::from_utf8(contents).map_err(|cause| Error::Generic {
            context: format!("history file {object_name} is not valid UTF-8"),
            cause: cause.into(),
        })?;

        parse_history(&contents).map_err(|cause| Error::History {
            name: object_name.clone(),
            cause,
        })
    }

    /// Reads the history files of all given timelines concurrently.
    pub async fn read_histories(
        &self,
        snapshot: &StorageSnapshot,
        timelines: impl IntoIterator<Item = TimelineId>,
    ) -> Result<BTreeMap<TimelineId, Vec<HistoryRecord>>> {
        let reads = timelines.into_iter().map(|timeline| async move {
            let history = self.read_history(snapshot, timeline).await?;
            Ok::<_, Error>((timeline, history))
        });
        Ok(try_join_all(reads).await?.into_iter().collect())
    }

    /// Loads the stop sentinel of every given backup concurrently.
    pub async fn load_sentinels(&self, backups: &mut [BackupInfo]) -> Result<()> {
        let reads = backups.iter().map(|backup| async move {
            let path = backup.sentinel_path();
            let stream = self
                .0
                .backend
                .get_object(&path)
                .await?
                .ok_or_else(|| Error::NotFound(path.clone()))?;
            let contents = read_to_vec(stream).await?;
            serde_json::from_slice::<BackupSentinel>(&contents)
                .map_err(|cause| Error::serde(format!("backup sentinel {path}"), cause))
        });

        let sentinels = try_join_all(reads).await?;
        for (backup, sentinel) in backups.iter_mut().zip(sentinels) {
            backup.sentinel = Some(sentinel);
        }
        Ok(())
    }

    /// Uploads a WAL segment or history file, compressed with zstd.
    ///
    /// Returns the path of the stored object.
    pub async fn push_wal_file(
        &self,
        name: &str,
        stream: PayloadStream,
        compression_level: i32,
    ) -> Result<String> {
        if matches!(
            classify_wal_object(name, self.segment_size()),
            WalObject::Other
        ) || split_codec_extension(name).1.is_some()
        {
            // Surfaces the precise reason the name is not a segment name.
            self.segment_size().parse_filename(name)?;
        }

        let path = format!("{WAL_FOLDER}{name}.{ZSTD_EXTENSION}");
        let stream = compression::encode_zstd(stream, compression_level);
        self.0.backend.put_object(&path, stream).await?;

        tracing::info!(%path, "Pushed WAL file");
        Ok(path)
    }

    /// Downloads a WAL segment or history file by its logical name, decoding it.
    pub async fn fetch_wal_file(&self, name: &str) -> Result<PayloadStream> {
        let listing = self.0.backend.list_folder(WAL_FOLDER).await?;
        let object = listing
            .objects
            .into_iter()
            .find(|object| split_codec_extension(&object.name).0 == name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;

        let path = format!("{WAL_FOLDER}{}", object.name);
        let stream = self
            .0
            .backend
            .get_object(&path)
            .await?
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        compression::decode(&object.name, stream)
    }

    async fn read_object(&self, folder: &str, object_name: &str) -> Result<Vec<u8>> {
        let path = format!("{folder}{object_name}");
        let stream = self
            .0
            .backend
            .get_object(&path)
            .await?
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        read_to_vec(compression::decode(object_name, stream)?).await
    }
}

/// A point-in-time listing of the archive.
#[derive(Debug, Default)]
pub struct StorageSnapshot {
    segments: HashSet<SegmentDescription>,
    history_objects: BTreeMap<TimelineId, String>,
    backups: Vec<BackupInfo>,
}

impl StorageSnapshot {
    fn add_wal_object(&mut self, object: ObjectInfo, size: SegmentSize) {
        match classify_wal_object(&object.name, size) {
            WalObject::Segment(segment) => {
                self.segments.insert(segment);
            }
            WalObject::History(timeline) => {
                self.history_objects.insert(timeline, object.name);
            }
            WalObject::Other => {
                tracing::debug!(name = %object.name, "Skipping non-segment object");
            }
        }
    }

    fn add_sentinel(&mut self, object: ObjectInfo, size: SegmentSize) {
        let Some(parsed) = BackupName::from_sentinel_name(&object.name, size) else {
            return;
        };
        match parsed {
            Ok(parsed) => {
                let name = object
                    .name
                    .strip_suffix(crate::layout::SENTINEL_SUFFIX)
                    .unwrap_or(&object.name)
                    .to_owned();
                self.backups.push(BackupInfo {
                    name,
                    parsed,
                    last_modified: object.last_modified,
                    sentinel: None,
                });
            }
            Err(error) => {
                tracing::warn!(
                    error = &error as &dyn std::error::Error,
                    "Skipping backup with unparseable name"
                );
            }
        }
    }

    /// All complete segments in the archive, across timelines.
    pub fn segments(&self) -> &HashSet<SegmentDescription> {
        &self.segments
    }

    /// Whether the archive has a history file for `timeline`.
    pub fn has_history(&self, timeline: TimelineId) -> bool {
        self.history_objects.contains_key(&timeline)
    }

    /// Backups ordered by start segment.
    pub fn backups(&self) -> &[BackupInfo] {
        &self.backups
    }

    /// Takes ownership of the backups, leaving the snapshot without any.
    pub fn take_backups(&mut self) -> Vec<BackupInfo> {
        std::mem::take(&mut self.backups)
    }

    /// The highest timeline named by any segment or history file, or 0 for an empty archive.
    pub fn highest_timeline(&self) -> TimelineId {
        let segments = self.segments.iter().map(|segment| segment.timeline);
        let histories = self.history_objects.keys().copied();
        segments.chain(histories).max().unwrap_or(0)
    }

    /// Groups the stored segments by timeline.
    pub fn sequences(&self) -> BTreeMap<TimelineId, SegmentsSequence> {
        let mut sequences: BTreeMap<TimelineId, SegmentsSequence> = BTreeMap::new();
        for segment in &self.segments {
            sequences
                .entry(segment.timeline)
                .and_modify(|sequence| sequence.add_segment_no(segment.number))
                .or_insert_with(|| SegmentsSequence::new(segment.timeline, segment.number));
        }
        sequences
    }
}

/// Builds the storage path of the history file of `timeline` as written by [`WalStorage`].
pub fn history_path(timeline: TimelineId) -> String {
    format!("{WAL_FOLDER}{}.{ZSTD_EXTENSION}", history_filename(timeline))
}
