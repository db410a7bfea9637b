//! Implementation of the CLI subcommands.
//!
//! Every command writes its report to the given writer, so that the binary can print to stdout and
//! tests can capture the output.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tokio::io::AsyncWriteExt;
use tokio_util::io::{ReaderStream, StreamReader};
use walvault_service::wal::{CheckStatus, CheckType};
use walvault_service::{StorageConfig, WalInspector, WalStorage};
use walvault_types::{DeltaFetchPlan, Lsn, SegmentDescription, SegmentNo, SegmentSize, TimelineId};

use crate::config::{Config, Storage};
use crate::output::{self, OutputFormat};

/// Opens the archive described by the configuration.
pub fn open_storage(config: &Config) -> WalStorage {
    let storage_config = match &config.storage {
        Storage::FileSystem { path } => StorageConfig::FileSystem { path },
    };
    WalStorage::new(storage_config, config.segment_size)
}

/// Determines the segment the database is currently writing.
///
/// Either a segment name or an LSN together with its timeline must be given.
pub fn resolve_current_segment(
    size: SegmentSize,
    current_segment: Option<&str>,
    current_lsn: Option<Lsn>,
    timeline: Option<TimelineId>,
) -> Result<SegmentDescription> {
    match (current_segment, current_lsn, timeline) {
        (Some(name), None, None) => Ok(size.parse_filename(name)?),
        (None, Some(lsn), Some(timeline)) => {
            if timeline == 0 {
                bail!("timeline 0 is not a valid timeline");
            }
            Ok(SegmentNo::from_lsn(lsn, size).on_timeline(timeline))
        }
        (None, Some(_), None) => bail!("--current-lsn requires --timeline"),
        _ => bail!("pass either --current-segment or both --current-lsn and --timeline"),
    }
}

/// Prints every timeline in the archive with its health.
pub async fn wal_show(
    inspector: &WalInspector,
    include_backups: bool,
    format: OutputFormat,
    writer: &mut impl Write,
) -> Result<()> {
    let infos = inspector.show_timelines(include_backups).await?;
    tracing::info!(timelines = infos.len(), "Inspected WAL archive");
    output::write_timelines(writer, &infos, inspector.storage().segment_size(), format)
}

/// Runs the requested checks and prints their outcome. Returns the overall status.
pub async fn wal_verify(
    inspector: &WalInspector,
    current: SegmentDescription,
    checks: &[CheckType],
    format: OutputFormat,
    writer: &mut impl Write,
) -> Result<CheckStatus> {
    let checks = if checks.is_empty() {
        &CheckType::ALL[..]
    } else {
        checks
    };

    let result = inspector.verify(current, checks).await?;
    let status = result.status();
    tracing::info!(%status, "Verified WAL archive");

    output::write_verify_result(writer, &result, inspector.storage().segment_size(), format)?;
    Ok(status)
}

/// Prints the delta files and segments needed to replay `[from, to)` on `timeline`.
pub fn delta_plan(
    size: SegmentSize,
    timeline: TimelineId,
    from: Lsn,
    to: Lsn,
    format: OutputFormat,
    writer: &mut impl Write,
) -> Result<()> {
    if to < from {
        bail!("--to {to} lies before --from {from}");
    }
    let plan = DeltaFetchPlan::new(from, to, size);
    output::write_delta_plan(writer, &plan, timeline, size, format)
}

/// Compresses a local WAL file and uploads it under its file name.
pub async fn wal_push(storage: &WalStorage, path: &Path, compression_level: i32) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;

    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let stream = Box::pin(ReaderStream::new(file));

    let stored = storage.push_wal_file(name, stream, compression_level).await?;
    Ok(stored)
}

/// Downloads and decodes a WAL file into `dest`.
pub async fn wal_fetch(storage: &WalStorage, name: &str, dest: &Path) -> Result<u64> {
    let stream = storage.fetch_wal_file(name).await?;
    let mut reader = StreamReader::new(stream);

    let mut file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("failed to create {}", dest.display()))?;
    let written = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;

    tracing::info!(name, bytes = written, "Fetched WAL file");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use walvault_service::inspect::DEFAULT_UPLOADING_WINDOW;

    use super::*;

    fn local_storage(path: &Path) -> WalStorage {
        WalStorage::new(StorageConfig::FileSystem { path }, SegmentSize::default())
    }

    #[test]
    fn current_segment_from_name_or_lsn() {
        let size = SegmentSize::default();
        let expected = SegmentDescription::new(3, SegmentNo(0x0A));

        let by_name = resolve_current_segment(size, Some("00000003000000000000000A"), None, None);
        assert_eq!(by_name.unwrap(), expected);

        let by_lsn = resolve_current_segment(size, None, Some(Lsn(0x0A00_0128)), Some(3));
        assert_eq!(by_lsn.unwrap(), expected);

        assert!(resolve_current_segment(size, None, Some(Lsn(0x0A00_0128)), None).is_err());
        assert!(resolve_current_segment(size, None, Some(Lsn(0x0A00_0128)), Some(0)).is_err());
        assert!(resolve_current_segment(size, None, None, None).is_err());
        assert!(resolve_current_segment(size, Some("nonsense"), None, None).is_err());
    }

    #[test]
    fn delta_plan_rejects_reversed_interval() {
        let mut out = Vec::new();
        let result = delta_plan(
            SegmentSize::default(),
            1,
            Lsn(0x0200_0000),
            Lsn(0x0100_0000),
            OutputFormat::Table,
            &mut out,
        );
        assert!(result.is_err());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn push_fetch_and_verify() {
        walvault_test::tracing::init();

        let archive = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let storage = local_storage(archive.path());

        for number in 1..=4u64 {
            let name = SegmentDescription::new(1, SegmentNo(number)).filename(storage.segment_size());
            let path = scratch.path().join(&name);
            std::fs::write(&path, format!("payload {number}").repeat(64)).unwrap();

            let stored = wal_push(&storage, &path, 3).await.unwrap();
            assert_eq!(stored, format!("wal_005/{name}.zst"));
        }

        let dest = scratch.path().join("restored");
        let written = wal_fetch(&storage, "000000010000000000000003", &dest)
            .await
            .unwrap();
        let restored = std::fs::read(&dest).unwrap();
        assert_eq!(written as usize, restored.len());
        assert_eq!(restored, "payload 3".repeat(64).as_bytes());

        let inspector = WalInspector::new(storage, DEFAULT_UPLOADING_WINDOW);
        let mut out = Vec::new();
        let status = wal_verify(
            &inspector,
            SegmentDescription::new(1, SegmentNo(5)),
            &[],
            OutputFormat::Json,
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(status, CheckStatus::Ok);

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["integrity"]["status"], "OK");
        assert_eq!(json["timeline"]["status"], "OK");

        let mut out = Vec::new();
        wal_show(&inspector, true, OutputFormat::Json, &mut out)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json[0]["segments_count"], 4);
        assert_eq!(json[0]["status"], "OK");
    }

    #[tokio::test]
    async fn push_rejects_foreign_files() {
        let archive = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let storage = local_storage(archive.path());

        let path = scratch.path().join("postmaster.pid");
        std::fs::write(&path, "42").unwrap();
        assert!(wal_push(&storage, &path, 3).await.is_err());
    }

    #[tokio::test]
    async fn fetch_missing_segment_fails() {
        let archive = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let storage = local_storage(archive.path());

        let dest = scratch.path().join("restored");
        let result = wal_fetch(&storage, "000000010000000000000003", &dest).await;
        assert!(result.is_err());
        assert!(!dest.exists());
    }
}
