use crate::config::ThresholdConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::geodesy::geodesic_distance_m;
use crate::models::{DroneTag, Position, Session, VideoKey, VideoRecord};
use crate::srt_parser::{ParsedTelemetry, SrtParser};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Width of the `<position><drone>` code at the end of a folder name
const FOLDER_CODE_LEN: usize = 4;
const POSITION_CODE_LEN: usize = 2;
/// Width of the video id at the end of a file stem
const VIDEO_ID_LEN: usize = 8;

/// One telemetry file located in the session tree
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSource {
    pub key: VideoKey,
    pub path: PathBuf,
    pub folder_path: PathBuf,
    pub unique_name: String,
}

/// Reduce one video's frames into its summary row
pub fn summarize_video(
    source: &VideoSource,
    parsed: &ParsedTelemetry,
    source_sha256: String,
    thresholds: &ThresholdConfig,
) -> AnalysisResult<VideoRecord> {
    let (Some(first), Some(last)) = (parsed.frames.first(), parsed.frames.last()) else {
        return Err(AnalysisError::MissingTelemetry {
            path: source.path.clone(),
        });
    };

    let count = parsed.frames.len() as f64;
    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;
    let mut min_altitude = f64::INFINITY;
    let mut max_altitude = f64::NEG_INFINITY;
    let mut frame_count = 0u32;
    for frame in &parsed.frames {
        lat_sum += frame.latitude;
        lon_sum += frame.longitude;
        min_altitude = min_altitude.min(frame.altitude);
        max_altitude = max_altitude.max(frame.altitude);
        frame_count = frame_count.max(frame.frame_number);
    }

    // Drift is measured against the video's own mean position
    let (mean_lat, mean_lon) = (lat_sum / count, lon_sum / count);
    let max_drift = parsed
        .frames
        .iter()
        .map(|f| geodesic_distance_m(mean_lat, mean_lon, f.latitude, f.longitude))
        .fold(0.0_f64, f64::max);

    let max_climb = max_altitude - thresholds.nominal_altitude_m;

    Ok(VideoRecord {
        key: source.key.clone(),
        unique_name: source.unique_name.clone(),
        folder_path: source.folder_path.clone(),
        source_sha256,
        start_timestamp: first.timestamp,
        end_timestamp: last.timestamp,
        frame_count,
        frame_time_s: parsed.max_frame_time_s(),
        min_altitude_m: min_altitude,
        max_altitude_m: max_altitude,
        max_drift_m: max_drift,
        drift_exceeded: max_drift > thresholds.drift_m,
        relay: max_climb > thresholds.height_m,
        miss_click: false,
        sortie: None,
        start_frame: None,
        end_frame: None,
        frame_drop: None,
    })
}

/// Split a folder name into its position and drone codes
pub fn folder_identity(folder_name: &str) -> Option<(Position, DroneTag)> {
    let chars: Vec<char> = folder_name.chars().collect();
    if chars.len() < FOLDER_CODE_LEN {
        return None;
    }
    let code = &chars[chars.len() - FOLDER_CODE_LEN..];
    let position: String = code[..POSITION_CODE_LEN].iter().collect();
    let drone: String = code[POSITION_CODE_LEN..].iter().collect();
    Some((Position::from_code(&position)?, DroneTag::new(drone)))
}

/// Video id from the tail of a file stem
pub fn video_id(stem: &str) -> String {
    let chars: Vec<char> = stem.chars().collect();
    let start = chars.len().saturating_sub(VIDEO_ID_LEN);
    chars[start..].iter().collect()
}

/// `<grandparent>_<session>_<position><drone>_<video id>`
pub fn unique_name(session_root: &Path, key: &VideoKey) -> String {
    let mut parts: Vec<String> = session_root
        .components()
        .rev()
        .take(2)
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.reverse();
    parts.push(format!("{}{}", key.position, key.drone));
    parts.push(key.video_id.clone());
    parts.join("_")
}

async fn sorted_entries(dir: &Path) -> AnalysisResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| AnalysisError::io(dir, e))?;
    let mut out = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(ent)) => out.push(ent.path()),
            Ok(None) => break,
            Err(e) => return Err(AnalysisError::io(dir, e)),
        }
    }
    out.sort();
    Ok(out)
}

fn is_telemetry_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("srt"))
        .unwrap_or(false)
}

/// Locate every telemetry file in `<root>/<position+drone>/<video>.SRT`, sorted by path
pub async fn discover_sources(root: &Path) -> AnalysisResult<Vec<VideoSource>> {
    let mut sources = Vec::new();
    for folder in sorted_entries(root).await? {
        if !folder.is_dir() {
            continue;
        }
        let folder_name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some((position, drone)) = folder_identity(&folder_name) else {
            warn!("skipping folder with unrecognised code: {}", folder.display());
            continue;
        };

        for path in sorted_entries(&folder).await? {
            if !path.is_file() || !is_telemetry_file(&path) {
                continue;
            }
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let key = VideoKey::new(position, drone.clone(), video_id(&stem));
            sources.push(VideoSource {
                unique_name: unique_name(root, &key),
                key,
                path,
                folder_path: folder.clone(),
            });
        }
    }
    Ok(sources)
}

/// Build the session table from a session directory.
///
/// Files without telemetry are left out with a warning.
pub async fn load_session(root: &Path, thresholds: &ThresholdConfig) -> AnalysisResult<Session> {
    if !root.is_dir() {
        return Err(AnalysisError::InvalidFolder {
            path: root.to_path_buf(),
        });
    }

    let parser = SrtParser::new();
    let mut session = Session::new(root);

    for source in discover_sources(root).await? {
        let data = tokio::fs::read(&source.path)
            .await
            .map_err(|e| AnalysisError::io(&source.path, e))?;
        let checksum = format!("{:x}", Sha256::digest(&data));
        let content = String::from_utf8_lossy(&data);

        let parsed = match parser.parse_source(&source.path, &content) {
            Ok(parsed) => parsed,
            Err(e) if e.is_recoverable() => {
                warn!("{}", e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let record = summarize_video(&source, &parsed, checksum, thresholds)?;
        debug!(
            "{}: {} frames, {} -> {}, drift {:.2} m",
            record.unique_name,
            record.frame_count,
            record.start_timestamp,
            record.end_timestamp,
            record.max_drift_m
        );
        session.frames.insert(source.key.clone(), parsed.frames);
        session.records.push(record);
    }

    info!(
        "aggregated {} videos from {}",
        session.records.len(),
        root.display()
    );
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TelemetryFrame;
    use chrono::NaiveTime;
    use std::fs;
    use tempfile::TempDir;

    fn thresholds() -> ThresholdConfig {
        ThresholdConfig {
            drift_m: 5.0,
            height_m: 7.0,
            nominal_altitude_m: 80.0,
            low_altitude_m: 78.0,
        }
    }

    fn source() -> VideoSource {
        let key = VideoKey::new(Position::P1, DroneTag::new("D1"), "DJI_0001");
        VideoSource {
            unique_name: "20230312_SE_P1D1_DJI_0001".to_string(),
            key,
            path: PathBuf::from("SE/P1D1/DJI_0001.SRT"),
            folder_path: PathBuf::from("SE/P1D1"),
        }
    }

    fn frame(n: u32, sec: u32, lat: f64, lon: f64, alt: f64) -> TelemetryFrame {
        TelemetryFrame {
            frame_number: n,
            timestamp: NaiveTime::from_hms_opt(10, 0, sec).unwrap(),
            latitude: lat,
            longitude: lon,
            altitude: alt,
        }
    }

    #[test]
    fn test_summary_of_steady_hover() {
        let parsed = ParsedTelemetry {
            frames: vec![
                frame(1, 0, 52.0, 4.0, 80.0),
                frame(2, 1, 52.0, 4.0, 81.0),
                frame(3, 2, 52.0, 4.0, 79.5),
            ],
            frame_times_ms: vec![33, 66, 100],
        };
        let record = summarize_video(&source(), &parsed, "abc".into(), &thresholds()).unwrap();

        assert_eq!(record.frame_count, 3);
        assert_eq!(record.start_timestamp, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(record.end_timestamp, NaiveTime::from_hms_opt(10, 0, 2).unwrap());
        assert_eq!(record.min_altitude_m, 79.5);
        assert_eq!(record.max_altitude_m, 81.0);
        assert_eq!(record.max_drift_m, 0.0);
        assert_eq!(record.frame_time_s, 0.1);
        assert!(!record.drift_exceeded);
        assert!(!record.relay);
    }

    #[test]
    fn test_drift_and_relay_flags() {
        // Two clusters ~22 m apart, so each sits ~11 m from the mean
        let parsed = ParsedTelemetry {
            frames: vec![
                frame(1, 0, 52.0, 4.0, 80.0),
                frame(2, 1, 52.0002, 4.0, 88.0),
            ],
            frame_times_ms: vec![33, 66],
        };
        let record = summarize_video(&source(), &parsed, String::new(), &thresholds()).unwrap();

        assert!(record.max_drift_m > 10.0 && record.max_drift_m < 12.0);
        assert!(record.drift_exceeded);
        assert!(record.relay);
    }

    #[test]
    fn test_climb_equal_to_threshold_is_not_relay() {
        let parsed = ParsedTelemetry {
            frames: vec![frame(1, 0, 52.0, 4.0, 87.0)],
            frame_times_ms: vec![33],
        };
        let record = summarize_video(&source(), &parsed, String::new(), &thresholds()).unwrap();
        assert!(!record.relay);
    }

    #[test]
    fn test_frame_count_is_max_frame_number() {
        let parsed = ParsedTelemetry {
            frames: vec![frame(4, 0, 52.0, 4.0, 80.0), frame(9, 1, 52.0, 4.0, 80.0)],
            frame_times_ms: vec![33, 66],
        };
        let record = summarize_video(&source(), &parsed, String::new(), &thresholds()).unwrap();
        assert_eq!(record.frame_count, 9);
    }

    #[test]
    fn test_folder_identity_uses_name_suffix() {
        let (position, drone) = folder_identity("Lek1_P2D4").unwrap();
        assert_eq!(position, Position::P2);
        assert_eq!(drone, DroneTag::new("D4"));
        assert!(folder_identity("D1").is_none());
        assert!(folder_identity("X9D1").is_none());
    }

    #[test]
    fn test_video_id_and_unique_name() {
        assert_eq!(video_id("20230312_SE_P1D1_DJI_0007"), "DJI_0007");
        assert_eq!(video_id("0007"), "0007");

        let key = VideoKey::new(Position::P1, DroneTag::new("D1"), "DJI_0007");
        let name = unique_name(Path::new("/data/20230312/SE_Lek1"), &key);
        assert_eq!(name, "20230312_SE_Lek1_P1D1_DJI_0007");
    }

    fn srt_block(n: u32, sec: u32) -> String {
        format!(
            "{n}\n00:00:{sec:02},000 --> 00:00:{sec:02},033\n10:00:{sec:02},000,000\n[latitude: 52.000000] [longitude: 4.000000] [altitude: 80.000]\n\n"
        )
    }

    #[tokio::test]
    async fn test_load_session_reads_sorted_tree() -> anyhow::Result<()> {
        let tmpdir = TempDir::new()?;
        let root = tmpdir.path().join("SE_Lek1");
        for folder in ["P1D2", "P1D1"] {
            fs::create_dir_all(root.join(folder))?;
        }
        fs::write(root.join("P1D1/DJI_0002.SRT"), srt_block(1, 5) + &srt_block(2, 6))?;
        fs::write(root.join("P1D1/DJI_0001.SRT"), srt_block(1, 0))?;
        fs::write(root.join("P1D2/DJI_0001.srt"), srt_block(1, 1))?;
        fs::write(root.join("P1D2/notes.txt"), "ignored")?;
        fs::write(root.join("P1D2/DJI_0009.SRT"), "1\n00:00:00,000 --> 00:00:01,000\nno tags\n")?;

        let session = load_session(&root, &thresholds()).await?;

        let ids: Vec<String> = session.records.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(ids, vec!["P1D1_DJI_0001", "P1D1_DJI_0002", "P1D2_DJI_0001"]);
        assert!(session.records.iter().all(|r| session.frames.get(&r.key).is_some()));
        assert_eq!(session.records[1].frame_count, 2);
        assert_eq!(session.records[0].source_sha256.len(), 64);
        assert!(session.records[0].unique_name.ends_with("SE_Lek1_P1D1_DJI_0001"));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_folder_is_invalid() {
        let err = load_session(Path::new("/definitely/not/here"), &thresholds())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidFolder { .. }));
    }
}
