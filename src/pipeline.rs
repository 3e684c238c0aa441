//! Ordered analysis stages over a session.
//!
//! Every stage takes the session by value and hands back the updated one, so
//! a stage only sees what the stages before it produced.

use crate::aggregator::load_session;
use crate::config::AppConfig;
use crate::error::AnalysisResult;
use crate::models::Session;
use crate::{frame_drop, frame_locator, gaps, identity, sortie, window};
use std::path::Path;
use tracing::{debug, info};

pub trait SessionStage {
    /// Stage name for logging.
    fn name(&self) -> &'static str;

    fn run(&self, session: Session) -> AnalysisResult<Session>;
}

pub struct ResolveIdentities;

impl SessionStage for ResolveIdentities {
    fn name(&self) -> &'static str {
        "drone identity"
    }

    fn run(&self, mut session: Session) -> AnalysisResult<Session> {
        session.identities = identity::resolve_identities(&session)?;
        Ok(session)
    }
}

pub struct SegmentSorties {
    pub gap_threshold_s: f64,
}

impl SessionStage for SegmentSorties {
    fn name(&self) -> &'static str {
        "sortie segmentation"
    }

    fn run(&self, session: Session) -> AnalysisResult<Session> {
        sortie::segment_sorties(session, self.gap_threshold_s)
    }
}

pub struct DetectMissClicks {
    pub min_gap_s: f64,
    pub max_gap_s: f64,
}

impl SessionStage for DetectMissClicks {
    fn name(&self) -> &'static str {
        "miss-click detection"
    }

    fn run(&self, session: Session) -> AnalysisResult<Session> {
        gaps::detect_miss_clicks(session, self.min_gap_s, self.max_gap_s)
    }
}

pub struct ComputeGlobalWindow;

impl SessionStage for ComputeGlobalWindow {
    fn name(&self) -> &'static str {
        "global window"
    }

    fn run(&self, session: Session) -> AnalysisResult<Session> {
        window::compute_global_window(session)
    }
}

pub struct LocateBoundaryFrames;

impl SessionStage for LocateBoundaryFrames {
    fn name(&self) -> &'static str {
        "frame location"
    }

    fn run(&self, session: Session) -> AnalysisResult<Session> {
        frame_locator::locate_boundary_frames(session)
    }
}

pub struct DetectFrameDrops {
    pub frame_rate: f64,
    pub tolerance: f64,
}

impl SessionStage for DetectFrameDrops {
    fn name(&self) -> &'static str {
        "frame drop detection"
    }

    fn run(&self, session: Session) -> AnalysisResult<Session> {
        frame_drop::detect_frame_drops(session, self.frame_rate, self.tolerance)
    }
}

pub struct Pipeline {
    stages: Vec<Box<dyn SessionStage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline { stages: Vec::new() }
    }

    pub fn with_stage<S: SessionStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// The standard stage order, configured from `cfg`
    pub fn from_config(cfg: &AppConfig) -> Self {
        let timing = &cfg.timing;
        Pipeline::new()
            .with_stage(ResolveIdentities)
            .with_stage(SegmentSorties {
                gap_threshold_s: timing.sortie_gap_s,
            })
            .with_stage(DetectMissClicks {
                min_gap_s: timing.miss_click_min_gap_s,
                max_gap_s: timing.sortie_gap_s,
            })
            .with_stage(ComputeGlobalWindow)
            .with_stage(LocateBoundaryFrames)
            .with_stage(DetectFrameDrops {
                frame_rate: timing.frame_rate,
                tolerance: timing.frame_drop_tolerance,
            })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, mut session: Session) -> AnalysisResult<Session> {
        let total = self.stages.len();
        for (i, stage) in self.stages.iter().enumerate() {
            debug!("stage {}/{}: {}", i + 1, total, stage.name());
            session = stage.run(session)?;
        }
        Ok(session)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a session directory and run every stage over it
pub async fn analyze_session(root: &Path, cfg: &AppConfig) -> AnalysisResult<Session> {
    let session = load_session(root, &cfg.thresholds).await?;
    let pipeline = Pipeline::from_config(cfg);
    debug!("stages: {}", pipeline.stage_names().join(" -> "));
    let session = pipeline.run(session)?;
    info!("analysis of {} complete", root.display());
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use std::fs;
    use tempfile::TempDir;

    /// `seconds` of 30 fps telemetry starting at `hh:mm:ss`, ending on a whole second
    fn write_video(dir: &Path, name: &str, hh: u32, mm: u32, ss: u32, seconds: u32) {
        let mut content = String::new();
        let mut n = 0u32;
        for sec in 0..=seconds {
            for sub in 0..30 {
                if sec == seconds && sub > 0 {
                    break;
                }
                n += 1;
                let total = hh * 3600 + mm * 60 + ss + sec;
                let ms = sub * 1000 / 30;
                let rel_ms = (n - 1) * 1000 / 30;
                content.push_str(&format!(
                    "{n}\n00:00:{:02},{:03} --> 00:00:{:02},{:03}\n<font size=\"28\">FrameCnt: {n}\n{:02}:{:02}:{:02},{:03},000\n[latitude: 52.000000] [longitude: 4.000000] [altitude: 80.000] </font>\n\n",
                    rel_ms / 1000 % 60,
                    rel_ms % 1000,
                    (rel_ms + 33) / 1000 % 60,
                    (rel_ms + 33) % 1000,
                    total / 3600,
                    total / 60 % 60,
                    total % 60,
                    ms,
                ));
            }
        }
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    fn build_tree(root: &Path) {
        write_video(&root.join("P1D1"), "DJI_0001.SRT", 10, 0, 0, 20);
        write_video(&root.join("P1D2"), "DJI_0001.SRT", 10, 0, 25, 20);
        write_video(&root.join("P2D3"), "DJI_0001.SRT", 10, 0, 5, 30);
        write_video(&root.join("P2D4"), "DJI_0001.SRT", 10, 0, 36, 5);
        write_video(&root.join("P3D5"), "DJI_0001.SRT", 10, 0, 2, 40);
        write_video(&root.join("P3D6"), "DJI_0001.SRT", 10, 0, 10, 5);
    }

    #[test]
    fn test_standard_stage_order() {
        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(
            Pipeline::from_config(&cfg).stage_names(),
            vec![
                "drone identity",
                "sortie segmentation",
                "miss-click detection",
                "global window",
                "frame location",
                "frame drop detection",
            ]
        );
    }

    #[tokio::test]
    async fn test_full_session_analysis() -> anyhow::Result<()> {
        let tmpdir = TempDir::new()?;
        let root = tmpdir.path().join("SE_Lek1");
        build_tree(&root);

        let cfg = AppConfig::load_default()?;
        let session = analyze_session(&root, &cfg).await?;

        assert_eq!(session.records.len(), 6);
        let window = session.window.unwrap();
        assert_eq!(window.start, chrono::NaiveTime::from_hms_opt(10, 0, 5).unwrap());
        assert_eq!(window.end, chrono::NaiveTime::from_hms_opt(10, 0, 41).unwrap());

        // P1: D1 recorded first, D2 is the second drone
        assert_eq!(session.records[0].sortie.unwrap().number(), 1);
        assert_eq!(session.records[1].sortie.unwrap().number(), 2);
        // 5 s pause between P1 videos
        assert!(session.records[1].miss_click);
        assert!(!session.records[0].miss_click);

        // Window opens 5 s into P1D1 and closes 16 s into P1D2
        assert_eq!(session.records[0].start_frame, Some(151));
        assert_eq!(session.records[1].end_frame, Some(481));
        assert_eq!(session.records[2].start_frame, Some(1));
        assert_eq!(session.records[3].end_frame, Some(151));
        assert_eq!(session.records[4].start_frame, Some(91));
        assert_eq!(session.records[4].end_frame, Some(1171));

        assert!(session.records.iter().all(|r| !r.frame_drop.unwrap().dropped));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_position_aborts() -> anyhow::Result<()> {
        let tmpdir = TempDir::new()?;
        let root = tmpdir.path().join("SE_Lek2");
        write_video(&root.join("P1D1"), "DJI_0001.SRT", 10, 0, 0, 2);
        write_video(&root.join("P1D2"), "DJI_0001.SRT", 10, 0, 0, 2);

        let cfg = AppConfig::load_default()?;
        let err = analyze_session(&root, &cfg).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MissingDrone { .. }));
        Ok(())
    }
}
