use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{gap_seconds, sort_by_start, DroneRank, Position, Session, Sortie};
use chrono::NaiveTime;
use tracing::info;

/// Number the sorties along one drone's chronologically sorted videos.
///
/// A new sortie starts only when the gap to the previous video is strictly
/// greater than `gap_threshold_s`.
pub fn assign_sorties(
    intervals: &[(NaiveTime, NaiveTime)],
    rank: DroneRank,
    gap_threshold_s: f64,
) -> Vec<Sortie> {
    let mut index = 0u32;
    let mut previous_end: Option<NaiveTime> = None;
    let mut sorties = Vec::with_capacity(intervals.len());

    for &(start, end) in intervals {
        let gap = previous_end.map_or(0.0, |prev| gap_seconds(prev, start));
        if gap > gap_threshold_s {
            index += 1;
        }
        sorties.push(Sortie { rank, index });
        previous_end = Some(end);
    }
    sorties
}

/// Record the sortie of every video, per position and drone
pub fn segment_sorties(mut session: Session, gap_threshold_s: f64) -> AnalysisResult<Session> {
    for position in Position::ALL {
        let pair = session
            .identities
            .get(&position)
            .cloned()
            .ok_or(AnalysisError::StageOrder {
                stage: "sortie segmentation",
                missing: "resolved drone identities",
            })?;

        for rank in [DroneRank::First, DroneRank::Second] {
            let mut indices = session.indices_of(position, pair.drone(rank));
            sort_by_start(&session, &mut indices);

            let intervals: Vec<(NaiveTime, NaiveTime)> = indices
                .iter()
                .map(|&i| {
                    let r = &session.records[i];
                    (r.start_timestamp, r.end_timestamp)
                })
                .collect();

            let sorties = assign_sorties(&intervals, rank, gap_threshold_s);
            for (&i, sortie) in indices.iter().zip(&sorties) {
                session.records[i].sortie = Some(*sortie);
            }

            if let Some(last) = sorties.last() {
                info!(
                    "{}{}: {} videos in {} sorties",
                    position,
                    pair.drone(rank),
                    sorties.len(),
                    last.index + 1
                );
            }
        }
    }
    Ok(session)
}
