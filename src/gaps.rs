use crate::error::AnalysisResult;
use crate::models::{gap_seconds, sort_by_start, Position, Session};
use tracing::info;

/// A pause too long for segment rollover but too short to be a real break
pub fn is_miss_click(gap_s: f64, min_gap_s: f64, max_gap_s: f64) -> bool {
    gap_s > min_gap_s && gap_s < max_gap_s
}

/// Flag miss-clicks between temporally consecutive videos at each position,
/// whichever drone recorded them
pub fn detect_miss_clicks(
    mut session: Session,
    min_gap_s: f64,
    max_gap_s: f64,
) -> AnalysisResult<Session> {
    for position in Position::ALL {
        let mut indices = session.indices_at(position);
        sort_by_start(&session, &mut indices);

        let mut flagged = 0usize;
        for pair in indices.windows(2) {
            let previous_end = session.records[pair[0]].end_timestamp;
            let current = &mut session.records[pair[1]];
            let gap = gap_seconds(previous_end, current.start_timestamp);
            current.miss_click = is_miss_click(gap, min_gap_s, max_gap_s);
            if current.miss_click {
                flagged += 1;
                info!("miss click before {} (gap {:.3} s)", current.unique_name, gap);
            }
        }
        // The earliest video has no predecessor, so its gap counts as zero
        if let Some(&first) = indices.first() {
            session.records[first].miss_click = is_miss_click(0.0, min_gap_s, max_gap_s);
        }

        if flagged > 0 {
            info!("{}: {} miss clicks", position, flagged);
        }
    }
    Ok(session)
}
