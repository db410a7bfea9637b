//! Reports over the whole archive.
//!
//! [`WalInspector`] takes one storage snapshot per call, fetches what the analysis needs
//! concurrently and hands the rest to [`crate::wal`].

use std::collections::BTreeMap;
use std::time::Instant;

use tokio::task::JoinSet;
use walvault_types::{SegmentDescription, TimelineId};

use crate::backup::BackupInfo;
use crate::error::Result;
use crate::storage::WalStorage;
use crate::wal::{
    CheckType, IntegrityCheck, TimelineCheck, TimelineInfo, VerifyResult, select_stop_segment,
    timeline_switch_map,
};

/// Default number of segments below the newest stored one that may still be uploading.
pub const DEFAULT_UPLOADING_WINDOW: u64 = 16;

/// Builds timeline listings and verification reports from a [`WalStorage`].
#[derive(Clone, Debug)]
pub struct WalInspector {
    storage: WalStorage,
    uploading_window: u64,
}

impl WalInspector {
    /// Creates an inspector.
    ///
    /// `uploading_window` should match the number of concurrent uploads of the archiver.
    pub fn new(storage: WalStorage, uploading_window: u64) -> Self {
        Self {
            storage,
            uploading_window,
        }
    }

    /// The underlying storage.
    pub fn storage(&self) -> &WalStorage {
        &self.storage
    }

    /// Summarizes every timeline that has segments in storage, ordered by id.
    ///
    /// With `include_backups`, every timeline lists the backups that started on it.
    pub async fn show_timelines(&self, include_backups: bool) -> Result<Vec<TimelineInfo>> {
        let start = Instant::now();
        let mut snapshot = self.storage.snapshot().await?;
        let sequences = snapshot.sequences();
        let mut histories = self
            .storage
            .read_histories(&snapshot, sequences.keys().copied())
            .await?;

        let mut tasks = JoinSet::new();
        for (timeline, sequence) in sequences {
            let history = histories.remove(&timeline).unwrap_or_default();
            tasks.spawn_blocking(move || TimelineInfo::new(&sequence, &history));
        }

        let mut infos = Vec::new();
        while let Some(info) = tasks.join_next().await {
            infos.push(info?);
        }
        infos.sort_by_key(|info| info.id);

        if include_backups {
            let mut backups = snapshot.take_backups();
            self.storage.load_sentinels(&mut backups).await?;
            assign_backups(&mut infos, backups);
        }

        tracing::info!(
            timelines = infos.len(),
            elapsed = ?start.elapsed(),
            "Built timeline listing"
        );
        Ok(infos)
    }

    /// Runs the requested checks for a database currently writing `current`.
    pub async fn verify(
        &self,
        current: SegmentDescription,
        checks: &[CheckType],
    ) -> Result<VerifyResult> {
        let snapshot = self.storage.snapshot().await?;
        let mut result = VerifyResult::default();

        if checks.contains(&CheckType::Integrity) {
            let size = self.storage.segment_size();
            let history = self
                .storage
                .read_history(&snapshot, current.timeline)
                .await?;
            let switches = timeline_switch_map(&history, size);
            let backup_starts = snapshot.backups().iter().map(BackupInfo::start_segment);
            let stop = select_stop_segment(current, &history, backup_starts, size);
            tracing::debug!(
                current = %current.filename(size),
                stop = stop.get(),
                "Selected stop segment"
            );

            result.integrity = Some(IntegrityCheck::run(
                current,
                stop,
                snapshot.segments(),
                &switches,
                self.uploading_window,
            ));
        }

        if checks.contains(&CheckType::Timeline) {
            result.timeline = Some(TimelineCheck::new(
                current.timeline,
                snapshot.highest_timeline(),
            ));
        }

        tracing::info!(status = %result.status(), "Verified WAL archive");
        Ok(result)
    }
}

fn assign_backups(infos: &mut [TimelineInfo], backups: Vec<BackupInfo>) {
    let mut by_timeline: BTreeMap<TimelineId, Vec<BackupInfo>> = BTreeMap::new();
    for backup in backups {
        by_timeline
            .entry(backup.start_segment().timeline)
            .or_default()
            .push(backup);
    }

    for info in infos.iter_mut() {
        info.backups = by_timeline.remove(&info.id).unwrap_or_default();
    }
    for backup in by_timeline.into_values().flatten() {
        tracing::debug!(
            backup = %backup.name,
            "Backup starts on a timeline without segments"
        );
    }
}

#[cfg(test)]
mod tests {
    use walvault_types::{SegmentNo, SegmentSize};

    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::wal::{CheckStatus, TimelineStatus};

    fn inspector() -> (InMemoryBackend, WalInspector) {
        let backend = InMemoryBackend::new();
        let storage = WalStorage::from_backend(Box::new(backend.clone()), SegmentSize::default());
        (backend, WalInspector::new(storage, DEFAULT_UPLOADING_WINDOW))
    }

    #[tokio::test]
    async fn lists_timelines_with_backups() {
        let (backend, inspector) = inspector();
        for name in [
            "000000010000000000000001",
            "000000010000000000000002",
            "000000010000000000000004",
            "000000020000000000000004",
            "000000020000000000000005",
        ] {
            backend.insert(format!("wal_005/{name}.zst"), "");
        }
        backend.insert("wal_005/00000002.history", "1\t0/4000100\tno recovery target\n");
        backend.insert(
            "basebackups_005/base_000000010000000000000002_backup_stop_sentinel.json",
            r#"{"start_lsn":"0/2000028","finish_lsn":"0/2000138"}"#,
        );

        let infos = inspector.show_timelines(true).await.unwrap();
        assert_eq!(infos.len(), 2);

        assert_eq!(infos[0].id, 1);
        assert_eq!(infos[0].status, TimelineStatus::LostSegments);
        assert_eq!(
            infos[0]
                .missing_segments
                .iter()
                .map(|run| (run.start_segment, run.end_segment))
                .collect::<Vec<_>>(),
            [(SegmentNo(3), SegmentNo(3))]
        );
        assert_eq!(infos[0].backups.len(), 1);
        assert!(infos[0].backups[0].sentinel.is_some());

        assert_eq!(infos[1].id, 2);
        assert_eq!(infos[1].parent_id, 1);
        assert_eq!(infos[1].status, TimelineStatus::Ok);
        assert!(infos[1].backups.is_empty());

        let infos = inspector.show_timelines(false).await.unwrap();
        assert!(infos.iter().all(|info| info.backups.is_empty()));
    }

    #[tokio::test]
    async fn runs_only_requested_checks() {
        let (backend, inspector) = inspector();
        backend.insert("wal_005/000000010000000000000001", "");

        let current = SegmentDescription::new(1, SegmentNo(2));
        let result = inspector
            .verify(current, &[CheckType::Timeline])
            .await
            .unwrap();
        assert!(result.integrity.is_none());
        assert_eq!(result.timeline.unwrap().status, CheckStatus::Ok);

        let result = inspector.verify(current, &CheckType::ALL).await.unwrap();
        assert_eq!(result.integrity.unwrap().status, CheckStatus::Ok);
    }
}
