use crate::error::AnalysisResult;
use crate::models::{seconds_between, FrameDropCheck, Session, VideoRecord};
use tracing::info;

/// Compare the frames a video should hold at `frame_rate` with the frames it has
pub fn check_frame_drop(record: &VideoRecord, frame_rate: f64, tolerance: f64) -> FrameDropCheck {
    let elapsed_s = seconds_between(record.end_timestamp, record.start_timestamp).abs();
    let required_frames = elapsed_s * frame_rate;
    FrameDropCheck {
        elapsed_s,
        required_frames,
        dropped: required_frames - record.frame_count as f64 > tolerance,
    }
}

pub fn detect_frame_drops(
    mut session: Session,
    frame_rate: f64,
    tolerance: f64,
) -> AnalysisResult<Session> {
    let mut dropped = 0usize;
    for record in &mut session.records {
        let check = check_frame_drop(record, frame_rate, tolerance);
        if check.dropped {
            dropped += 1;
            info!(
                "frame drop in {}: {} of {:.0} frames",
                record.unique_name, record.frame_count, check.required_frames
            );
        }
        record.frame_drop = Some(check);
    }
    info!("{} videos with frame drops", dropped);
    Ok(session)
}
