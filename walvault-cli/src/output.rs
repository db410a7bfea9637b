//! Rendering of command results as tables or JSON.
//!
//! Segments are rendered as file names and LSNs in their `X/X` form, so that the output can be
//! matched against the archive listing directly.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use walvault_service::backup::BackupInfo;
use walvault_service::wal::{
    CheckStatus, IntegrityCheck, ScannedSegmentStatus, SegmentRun, TimelineCheck, TimelineInfo,
    TimelineStatus, VerifyResult,
};
use walvault_types::{DeltaFetchPlan, Lsn, SegmentDescription, SegmentSize, TimelineId};

/// How command output is printed to stdout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable tables.
    Table,
    /// Pretty printed JSON.
    Json,
}

impl OutputFormat {
    /// Picks the format from a `--json` flag.
    pub fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Table }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct TimelineRow {
    #[tabled(rename = "TLI")]
    id: TimelineId,
    #[tabled(rename = "PARENT TLI")]
    parent_id: TimelineId,
    #[tabled(rename = "SWITCHPOINT LSN")]
    switch_point_lsn: Lsn,
    #[tabled(rename = "START SEGMENT")]
    start_segment: String,
    #[tabled(rename = "END SEGMENT")]
    end_segment: String,
    #[tabled(rename = "SEGMENT RANGE")]
    segment_range_size: u64,
    #[tabled(rename = "SEGMENTS COUNT")]
    segments_count: u64,
    #[tabled(rename = "STATUS")]
    status: TimelineStatus,
    #[tabled(rename = "BACKUPS")]
    #[serde(skip)]
    backups_count: usize,
    #[tabled(skip)]
    missing_segments: Vec<MissingRow>,
    #[tabled(skip)]
    backups: Vec<BackupRow>,
}

#[derive(Debug, Serialize)]
struct MissingRow {
    start_segment: String,
    end_segment: String,
    segments_count: u64,
}

impl MissingRow {
    fn new(run: &SegmentRun, size: SegmentSize) -> Self {
        let name = |number| SegmentDescription::new(run.timeline_id, number).filename(size);
        Self {
            start_segment: name(run.start_segment),
            end_segment: name(run.end_segment),
            segments_count: run.segments_count(),
        }
    }

    fn describe(&self) -> String {
        if self.segments_count == 1 {
            self.start_segment.clone()
        } else {
            format!(
                "{} to {} ({} segments)",
                self.start_segment, self.end_segment, self.segments_count
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct BackupRow {
    name: String,
    start_segment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    delta_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_lsn: Option<Lsn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finish_lsn: Option<Lsn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_permanent: Option<bool>,
}

impl BackupRow {
    fn new(backup: &BackupInfo, size: SegmentSize) -> Self {
        let sentinel = backup.sentinel.as_ref();
        Self {
            name: backup.name.clone(),
            start_segment: backup.start_segment().filename(size),
            delta_from: backup.parsed.delta_from.map(|base| base.filename(size)),
            start_lsn: sentinel.map(|s| s.start_lsn),
            finish_lsn: sentinel.map(|s| s.finish_lsn),
            is_permanent: sentinel.map(|s| s.is_permanent),
        }
    }
}

impl TimelineRow {
    fn new(info: &TimelineInfo, size: SegmentSize) -> Self {
        let name = |number| SegmentDescription::new(info.id, number).filename(size);
        Self {
            id: info.id,
            parent_id: info.parent_id,
            switch_point_lsn: info.switch_point_lsn,
            start_segment: name(info.start_segment),
            end_segment: name(info.end_segment),
            segment_range_size: info.segment_range_size,
            segments_count: info.segments_count,
            status: info.status,
            backups_count: info.backups.len(),
            missing_segments: info
                .missing_segments
                .iter()
                .map(|run| MissingRow::new(run, size))
                .collect(),
            backups: info
                .backups
                .iter()
                .map(|backup| BackupRow::new(backup, size))
                .collect(),
        }
    }
}

/// Writes the timeline overview produced by `wal-show`.
pub fn write_timelines(
    writer: &mut impl Write,
    infos: &[TimelineInfo],
    size: SegmentSize,
    format: OutputFormat,
) -> Result<()> {
    let rows: Vec<_> = infos.iter().map(|info| TimelineRow::new(info, size)).collect();

    match format {
        OutputFormat::Json => write_json(writer, &rows),
        OutputFormat::Table if rows.is_empty() => {
            writeln!(writer, "No timelines found")?;
            Ok(())
        }
        OutputFormat::Table => {
            write_table(writer, &rows)?;
            for row in rows.iter().filter(|row| !row.missing_segments.is_empty()) {
                let missing: Vec<_> = row.missing_segments.iter().map(MissingRow::describe).collect();
                writeln!(writer, "timeline {} is missing: {}", row.id, missing.join(", "))?;
            }
            Ok(())
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct RunRow {
    #[tabled(rename = "TLI")]
    timeline_id: TimelineId,
    #[tabled(rename = "START")]
    start_segment: String,
    #[tabled(rename = "END")]
    end_segment: String,
    #[tabled(rename = "SEGMENTS COUNT")]
    segments_count: u64,
    #[tabled(rename = "STATUS")]
    status: ScannedSegmentStatus,
}

impl RunRow {
    fn new(run: &SegmentRun, size: SegmentSize) -> Self {
        let name = |number| SegmentDescription::new(run.timeline_id, number).filename(size);
        Self {
            timeline_id: run.timeline_id,
            start_segment: name(run.start_segment),
            end_segment: name(run.end_segment),
            segments_count: run.segments_count(),
            status: run.status,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct TimelineCheckRow {
    #[tabled(rename = "CURRENT TLI")]
    current_timeline_id: TimelineId,
    #[tabled(rename = "HIGHEST STORAGE TLI")]
    highest_storage_timeline_id: TimelineId,
}

#[derive(Debug, Serialize)]
struct CheckReport<T> {
    status: CheckStatus,
    details: T,
}

#[derive(Debug, Serialize)]
struct VerifyReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    integrity: Option<CheckReport<Vec<RunRow>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeline: Option<CheckReport<TimelineCheckRow>>,
}

fn integrity_report(check: &IntegrityCheck, size: SegmentSize) -> CheckReport<Vec<RunRow>> {
    CheckReport {
        status: check.status,
        details: check.runs.iter().map(|run| RunRow::new(run, size)).collect(),
    }
}

fn timeline_report(check: &TimelineCheck) -> CheckReport<TimelineCheckRow> {
    CheckReport {
        status: check.status,
        details: TimelineCheckRow {
            current_timeline_id: check.current_timeline_id,
            highest_storage_timeline_id: check.highest_storage_timeline_id,
        },
    }
}

/// Writes the outcome of `wal-verify`.
pub fn write_verify_result(
    writer: &mut impl Write,
    result: &VerifyResult,
    size: SegmentSize,
    format: OutputFormat,
) -> Result<()> {
    let report = VerifyReport {
        integrity: result
            .integrity
            .as_ref()
            .map(|check| integrity_report(check, size)),
        timeline: result.timeline.as_ref().map(timeline_report),
    };

    if format == OutputFormat::Json {
        return write_json(writer, &report);
    }

    if let Some(integrity) = &report.integrity {
        writeln!(writer, "[integrity check] status: {}", integrity.status)?;
        write_table(writer, &integrity.details)?;
    }
    if let Some(timeline) = &report.timeline {
        writeln!(writer, "[timeline check] status: {}", timeline.status)?;
        write_table(writer, [&timeline.details])?;
    }
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
struct PlannedFile {
    #[tabled(rename = "KIND")]
    kind: &'static str,
    #[tabled(rename = "NAME")]
    name: String,
}

/// Writes the files `delta-plan` selected for a timeline, oldest first.
pub fn write_delta_plan(
    writer: &mut impl Write,
    plan: &DeltaFetchPlan,
    timeline: TimelineId,
    size: SegmentSize,
    format: OutputFormat,
) -> Result<()> {
    let deltas = plan.delta_filenames(timeline, size);
    let segments = plan.wal_segment_filenames(timeline, size);

    if format == OutputFormat::Json {
        let json = serde_json::json!({
            "delta_files": deltas,
            "wal_segments": segments,
        });
        return write_json(writer, &json);
    }

    let files: Vec<_> = deltas
        .into_iter()
        .map(|name| PlannedFile { kind: "delta", name })
        .chain(segments.into_iter().map(|name| PlannedFile { kind: "wal", name }))
        .collect();
    write_table(writer, &files)
}

fn write_table<I, T>(writer: &mut impl Write, rows: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Tabled,
{
    let table = Table::new(rows).with(Style::rounded()).to_string();
    writeln!(writer, "{table}")?;
    Ok(())
}

fn write_json(writer: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use walvault_service::backup::{BackupName, BackupSentinel};
    use walvault_types::SegmentNo;

    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn promoted_timeline() -> TimelineInfo {
        let start = SegmentDescription::new(6, SegmentNo(5));
        TimelineInfo {
            id: 6,
            parent_id: 5,
            switch_point_lsn: Lsn(0x0500_0100),
            start_segment: SegmentNo(5),
            end_segment: SegmentNo(9),
            segments_count: 4,
            missing_segments: vec![SegmentRun {
                timeline_id: 6,
                start_segment: SegmentNo(7),
                end_segment: SegmentNo(7),
                status: ScannedSegmentStatus::Lost,
            }],
            segment_range_size: 5,
            status: TimelineStatus::LostSegments,
            backups: vec![BackupInfo {
                name: "base_000000060000000000000005".into(),
                parsed: BackupName {
                    start,
                    delta_from: None,
                },
                last_modified: SystemTime::UNIX_EPOCH,
                sentinel: Some(BackupSentinel {
                    start_lsn: Lsn(0x0500_0028),
                    finish_lsn: Lsn(0x0500_0138),
                    is_permanent: true,
                }),
            }],
        }
    }

    #[test]
    fn timelines_as_json() {
        let size = SegmentSize::default();
        let output = render(|w| {
            write_timelines(w, &[promoted_timeline()], size, OutputFormat::Json)
        });

        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        let timeline = &json[0];
        assert_eq!(timeline["id"], 6);
        assert_eq!(timeline["parent_id"], 5);
        assert_eq!(timeline["switch_point_lsn"], "0/5000100");
        assert_eq!(timeline["start_segment"], "000000060000000000000005");
        assert_eq!(timeline["end_segment"], "000000060000000000000009");
        assert_eq!(timeline["status"], "LOST_SEGMENTS");
        assert_eq!(
            timeline["missing_segments"],
            serde_json::json!([{
                "start_segment": "000000060000000000000007",
                "end_segment": "000000060000000000000007",
                "segments_count": 1,
            }])
        );

        let backup = &timeline["backups"][0];
        assert_eq!(backup["name"], "base_000000060000000000000005");
        assert_eq!(backup["finish_lsn"], "0/5000138");
        assert_eq!(backup["is_permanent"], true);
        assert!(backup.get("delta_from").is_none());
    }

    #[test]
    fn timelines_as_table() {
        let size = SegmentSize::default();
        let output = render(|w| {
            write_timelines(w, &[promoted_timeline()], size, OutputFormat::Table)
        });

        assert!(output.contains("SWITCHPOINT LSN"));
        assert!(output.contains("0/5000100"));
        assert!(output.contains("000000060000000000000009"));
        assert!(output.contains("LOST_SEGMENTS"));
        assert!(output.contains("timeline 6 is missing: 000000060000000000000007\n"));
    }

    #[test]
    fn missing_ranges_in_table() {
        let mut info = promoted_timeline();
        info.end_segment = SegmentNo(0x300);
        info.missing_segments.push(SegmentRun {
            timeline_id: 6,
            start_segment: SegmentNo(10),
            end_segment: SegmentNo(0x2FF),
            status: ScannedSegmentStatus::Lost,
        });

        let output = render(|w| {
            write_timelines(w, &[info], SegmentSize::default(), OutputFormat::Table)
        });
        assert!(output.contains(
            "timeline 6 is missing: 000000060000000000000007, \
             00000006000000000000000A to 0000000600000002000000FF (758 segments)\n"
        ));
    }

    #[test]
    fn no_timelines() {
        let output = render(|w| {
            write_timelines(w, &[], SegmentSize::default(), OutputFormat::Table)
        });
        assert_eq!(output, "No timelines found\n");

        let output = render(|w| {
            write_timelines(w, &[], SegmentSize::default(), OutputFormat::Json)
        });
        assert_eq!(output, "[]\n");
    }

    #[test]
    fn verify_result_as_json() {
        let result = VerifyResult {
            integrity: Some(IntegrityCheck {
                status: CheckStatus::Warning,
                runs: vec![
                    SegmentRun {
                        timeline_id: 3,
                        start_segment: SegmentNo(1),
                        end_segment: SegmentNo(8),
                        status: ScannedSegmentStatus::Found,
                    },
                    SegmentRun {
                        timeline_id: 3,
                        start_segment: SegmentNo(9),
                        end_segment: SegmentNo(9),
                        status: ScannedSegmentStatus::ProbablyDelayed,
                    },
                ],
            }),
            timeline: None,
        };

        let output = render(|w| {
            write_verify_result(w, &result, SegmentSize::default(), OutputFormat::Json)
        });
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(json["integrity"]["status"], "WARNING");
        let details = &json["integrity"]["details"];
        assert_eq!(details[0]["start_segment"], "000000030000000000000001");
        assert_eq!(details[0]["end_segment"], "000000030000000000000008");
        assert_eq!(details[0]["segments_count"], 8);
        assert_eq!(details[0]["status"], "FOUND");
        assert_eq!(details[1]["status"], "MISSING_DELAYED");
        assert!(json.get("timeline").is_none());
    }

    #[test]
    fn verify_result_as_table() {
        let result = VerifyResult {
            integrity: None,
            timeline: Some(TimelineCheck::new(1, 2)),
        };

        let output = render(|w| {
            write_verify_result(w, &result, SegmentSize::default(), OutputFormat::Table)
        });
        assert!(output.starts_with("[timeline check] status: FAILURE\n"));
        assert!(output.contains("HIGHEST STORAGE TLI"));
    }

    #[test]
    fn delta_plan_lists_deltas_then_segments() {
        let size = SegmentSize::default();
        // Two complete units, then three segments of the third.
        let plan = DeltaFetchPlan::new(Lsn(0), Lsn(0x2300_0000), size);

        let output = render(|w| write_delta_plan(w, &plan, 1, size, OutputFormat::Json));
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(
            json["delta_files"],
            serde_json::json!([
                "000000010000000000000000_delta",
                "000000010000000000000010_delta",
            ])
        );
        assert_eq!(
            json["wal_segments"],
            serde_json::json!([
                "000000010000000000000020",
                "000000010000000000000021",
                "000000010000000000000022",
            ])
        );
    }
}
