use crate::config::{AppConfig, ThresholdConfig, TimingConfig};
use crate::models::{GlobalWindow, Session, VideoRecord};
use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CSV_HEADER: [&str; 23] = [
    "Unique name",
    "Video_ID",
    "position",
    "drone",
    "Total frames",
    "start_timestamp",
    "end_timestamp",
    "flight number",
    "Relay video",
    "maximum drift",
    "drift_status",
    "Miss click",
    "maximum height",
    "minimum height",
    "Global start time",
    "Global end time",
    "Start Frame",
    "End Frame",
    "Frame drop",
    "Frame time",
    "Global TOF",
    "Required frames",
    "File path",
];

const SUMMARY_TITLE: &str = "Summary of the errors";

/// Provenance of the run, written next to the table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub export_id: String,
    pub timestamp_utc: u128,
    pub session_root: PathBuf,
    pub thresholds: ThresholdConfig,
    pub timing: TimingConfig,
    pub window: Option<GlobalWindow>,
    pub num_videos: usize,
    pub videos: Vec<VideoProvenance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoProvenance {
    pub unique_name: String,
    pub video_id: String,
    pub source_sha256: String,
}

/// Output files of one session, all inside the session directory
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub stem: String,
    pub csv: PathBuf,
    pub summary: PathBuf,
    pub plot: PathBuf,
    pub manifest: PathBuf,
}

impl ReportPaths {
    pub fn new(dir: &Path, stem: &str) -> Self {
        ReportPaths {
            stem: stem.to_string(),
            csv: dir.join(format!("{}.csv", stem)),
            summary: dir.join(format!("{}_summary.txt", stem)),
            plot: dir.join(format!("{}_flight.png", stem)),
            manifest: dir.join(format!("{}_manifest.json", stem)),
        }
    }

    pub fn for_session(session: &Session) -> Result<Self> {
        let first = session
            .records
            .first()
            .context("session has no videos to report")?;
        Ok(Self::new(&session.root, &report_stem(&first.unique_name)))
    }
}

/// What an export run wrote
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub paths: ReportPaths,
    pub rows: usize,
    pub anomalies: usize,
    pub wrote_summary: bool,
    pub manifest: Option<ExportManifest>,
}

/// First three `_`-separated pieces of a unique name
pub fn report_stem(unique_name: &str) -> String {
    unique_name.split('_').take(3).collect::<Vec<_>>().join("_")
}

fn split_micros(t: NaiveTime) -> (u32, u32) {
    // Leap-second nanoseconds are clamped into the last microsecond
    let micros = (t.nanosecond() / 1_000).min(999_999);
    (micros / 1_000, micros % 1_000)
}

/// `HH:MM:SS,mmm,uuu`, the telemetry timestamp grammar
pub fn format_timestamp(t: NaiveTime) -> String {
    let (ms, us) = split_micros(t);
    format!("{},{:03},{:03}", t.format("%H:%M:%S"), ms, us)
}

/// `HH:MM:SS,uuuuuu`, used for the global window columns
pub fn format_global_time(t: NaiveTime) -> String {
    let (ms, us) = split_micros(t);
    format!("{},{:06}", t.format("%H:%M:%S"), ms * 1_000 + us)
}

fn flag(b: bool) -> String {
    String::from(if b { "1" } else { "0" })
}

fn optional<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn csv_row(index: usize, record: &VideoRecord, window: Option<GlobalWindow>) -> Vec<String> {
    let (global_start, global_end) = match (index, window) {
        (0, Some(w)) => (format_global_time(w.start), format_global_time(w.end)),
        _ => ("0".to_string(), "0".to_string()),
    };
    let drop = record.frame_drop;

    vec![
        record.unique_name.clone(),
        record.key.video_id.clone(),
        record.key.position.to_string(),
        record.key.drone.to_string(),
        record.frame_count.to_string(),
        format_timestamp(record.start_timestamp),
        format_timestamp(record.end_timestamp),
        optional(record.sortie.map(|s| s.number())),
        flag(record.relay),
        record.max_drift_m.to_string(),
        flag(record.drift_exceeded),
        flag(record.miss_click),
        record.max_altitude_m.to_string(),
        record.min_altitude_m.to_string(),
        global_start,
        global_end,
        record.start_frame.unwrap_or(0).to_string(),
        record.end_frame.unwrap_or(0).to_string(),
        optional(drop.map(|d| if d.dropped { 1 } else { 0 })),
        record.frame_time_s.to_string(),
        optional(drop.map(|d| d.elapsed_s)),
        optional(drop.map(|d| d.required_frames)),
        record.folder_path.display().to_string(),
    ]
}

/// Serialize the session table in the fixed column order
pub fn render_csv(session: &Session) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for (i, record) in session.records.iter().enumerate() {
        writer.write_record(csv_row(i, record, session.window))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing csv: {}", e.error()))
}

/// One line per triggered condition, in table order
pub fn anomaly_lines(session: &Session, thresholds: &ThresholdConfig) -> Vec<String> {
    let mut lines = Vec::new();
    for r in &session.records {
        let name = &r.unique_name;
        if r.drift_exceeded {
            lines.push(format!("Drift found at the {} of value {}m", name, r.max_drift_m));
        }
        if r.miss_click {
            lines.push(format!("Miss click found at the {}", name));
        }
        if r.min_altitude_m < thresholds.low_altitude_m {
            lines.push(format!(
                "Drone flew below {}m at the {}, height = {} m",
                thresholds.low_altitude_m, name, r.min_altitude_m
            ));
        }
        if r.frame_drop.map_or(false, |d| d.dropped) {
            lines.push(format!("Frame drop at the {}", name));
        }
    }
    lines
}

pub fn build_manifest(session: &Session, cfg: &AppConfig, stem: &str) -> Result<ExportManifest> {
    Ok(ExportManifest {
        export_id: stem.to_string(),
        timestamp_utc: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_millis(),
        session_root: session.root.clone(),
        thresholds: cfg.thresholds.clone(),
        timing: cfg.timing.clone(),
        window: session.window,
        num_videos: session.records.len(),
        videos: session
            .records
            .iter()
            .map(|r| VideoProvenance {
                unique_name: r.unique_name.clone(),
                video_id: r.key.video_id.clone(),
                source_sha256: r.source_sha256.clone(),
            })
            .collect(),
    })
}

/// Write the table, the anomaly summary (only when something was flagged)
/// and the run manifest into the session directory
pub async fn export_session(session: &Session, cfg: &AppConfig) -> Result<ExportReport> {
    let paths = ReportPaths::for_session(session)?;
    tracing::info!("exporting {} to {}", paths.stem, session.root.display());

    let table = render_csv(session)?;
    tokio::fs::write(&paths.csv, table)
        .await
        .with_context(|| format!("writing {}", paths.csv.display()))?;

    let lines = anomaly_lines(session, &cfg.thresholds);
    let wrote_summary = !lines.is_empty();
    if wrote_summary {
        let mut text = String::from(SUMMARY_TITLE);
        text.push('\n');
        for line in &lines {
            text.push_str(line);
            text.push('\n');
        }
        tokio::fs::write(&paths.summary, text)
            .await
            .with_context(|| format!("writing {}", paths.summary.display()))?;
        tracing::info!("{} anomalies written to {}", lines.len(), paths.summary.display());
    }

    let manifest = if cfg.report.write_manifest {
        let manifest = build_manifest(session, cfg, &paths.stem)?;
        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(&paths.manifest, manifest_json)
            .await
            .with_context(|| format!("writing {}", paths.manifest.display()))?;
        Some(manifest)
    } else {
        None
    };

    tracing::info!("csv export complete: {}", paths.csv.display());
    Ok(ExportReport {
        rows: session.records.len(),
        anomalies: lines.len(),
        wrote_summary,
        manifest,
        paths,
    })
}
