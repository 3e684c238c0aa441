use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{seconds_between, Boundary, Position, Session, TelemetryFrame};
use chrono::NaiveTime;
use tracing::info;

/// Frame nearest to `at` on the inside of the window.
///
/// For the start boundary this is the first frame at or after `at`; for the end
/// boundary the last frame at or before it. Equal deltas keep the earlier frame.
pub fn nearest_frame(
    frames: &[TelemetryFrame],
    at: NaiveTime,
    boundary: Boundary,
) -> Option<u32> {
    let mut best: Option<(f64, u32)> = None;
    for frame in frames {
        let delta = match boundary {
            Boundary::Start => seconds_between(frame.timestamp, at),
            Boundary::End => seconds_between(at, frame.timestamp),
        };
        if delta < 0.0 {
            continue;
        }
        if best.map_or(true, |(d, _)| delta < d) {
            best = Some((delta, frame.frame_number));
        }
    }
    best.map(|(_, n)| n)
}

fn locate(
    session: &mut Session,
    position: Position,
    boundary: Boundary,
    at: NaiveTime,
) -> AnalysisResult<()> {
    let index = session
        .records
        .iter()
        .position(|r| r.key.position == position && r.contains(at))
        .ok_or(AnalysisError::NoContainingVideo {
            position,
            boundary,
            at,
        })?;

    let key = &session.records[index].key;
    let frame = session
        .frames
        .get(key)
        .and_then(|frames| nearest_frame(frames, at, boundary))
        .ok_or_else(|| AnalysisError::NoBoundaryFrame {
            video: key.to_string(),
            boundary,
            at,
        })?;

    let record = &mut session.records[index];
    info!(
        "{}: global {} at frame {} of {}",
        position, boundary, frame, record.unique_name
    );
    match boundary {
        Boundary::Start => record.start_frame = Some(frame),
        Boundary::End => record.end_frame = Some(frame),
    }
    Ok(())
}

/// Mark, at every position, the frames where the global window opens and closes
pub fn locate_boundary_frames(mut session: Session) -> AnalysisResult<Session> {
    let window = session.window.ok_or(AnalysisError::StageOrder {
        stage: "frame location",
        missing: "the global window",
    })?;

    for record in &mut session.records {
        record.start_frame = None;
        record.end_frame = None;
    }

    for position in Position::ALL {
        for boundary in [Boundary::Start, Boundary::End] {
            locate(&mut session, position, boundary, window.at(boundary))?;
        }
    }
    Ok(session)
}
