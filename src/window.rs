use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{GlobalWindow, Position, Session};
use chrono::NaiveTime;
use tracing::info;

/// Earliest start and latest end of one position's recordings
pub fn position_span(session: &Session, position: Position) -> Option<(NaiveTime, NaiveTime)> {
    session
        .records
        .iter()
        .filter(|r| r.key.position == position)
        .fold(None, |span, r| match span {
            None => Some((r.start_timestamp, r.end_timestamp)),
            Some((start, end)) => Some((start.min(r.start_timestamp), end.max(r.end_timestamp))),
        })
}

/// Intersect per-position spans: latest first start to earliest last end
pub fn intersect_spans(spans: &[(NaiveTime, NaiveTime)]) -> AnalysisResult<GlobalWindow> {
    let start = spans.iter().map(|s| s.0).max();
    let end = spans.iter().map(|s| s.1).min();
    let (Some(start), Some(end)) = (start, end) else {
        return Err(AnalysisError::StageOrder {
            stage: "global window",
            missing: "at least one recorded position",
        });
    };
    if start > end {
        return Err(AnalysisError::NoOverlap { start, end });
    }
    Ok(GlobalWindow { start, end })
}

pub fn compute_global_window(mut session: Session) -> AnalysisResult<Session> {
    let mut spans = Vec::with_capacity(Position::ALL.len());
    for position in Position::ALL {
        let span = position_span(&session, position).ok_or(AnalysisError::MissingDrone {
            position,
            found: 0,
        })?;
        spans.push(span);
    }

    let window = intersect_spans(&spans)?;
    info!(
        "global window {} -> {} ({:.3} s)",
        window.start,
        window.end,
        window.duration_secs()
    );
    session.window = Some(window);
    Ok(session)
}
