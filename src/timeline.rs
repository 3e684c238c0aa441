use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{seconds_between, DroneRank, Position, Session};
use chrono::{Duration, NaiveTime};
use serde::Serialize;

/// How many videos of each drone at one position were recording at each sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSeries {
    pub position: Position,
    pub first: Vec<u32>,
    pub second: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcurrencyTimeline {
    pub start: NaiveTime,
    pub interval_s: u32,
    /// Seconds since `start` of every sample
    pub offsets_s: Vec<f64>,
    pub positions: Vec<PositionSeries>,
}

impl ConcurrencyTimeline {
    pub fn len(&self) -> usize {
        self.offsets_s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets_s.is_empty()
    }

    pub fn span_s(&self) -> f64 {
        self.offsets_s.last().copied().unwrap_or(0.0)
    }

    /// Highest count over every series, at least 1
    pub fn peak(&self) -> u32 {
        self.positions
            .iter()
            .flat_map(|p| p.first.iter().chain(p.second.iter()))
            .copied()
            .max()
            .unwrap_or(0)
            .max(1)
    }
}

/// Sample instants from the earliest start to the latest end, inclusive when aligned
fn sample_instants(start: NaiveTime, end: NaiveTime, interval_s: u32) -> Vec<NaiveTime> {
    let step = Duration::seconds(i64::from(interval_s.max(1)));
    let mut out = Vec::new();
    let mut x = start;
    while x <= end {
        out.push(x);
        let (next, wrapped) = x.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        x = next;
    }
    out
}

/// Count, per position and drone, the videos recording at every sample instant.
///
/// A video counts at `x` when `start <= x < end`.
pub fn concurrency_timeline(
    session: &Session,
    interval_s: u32,
) -> AnalysisResult<ConcurrencyTimeline> {
    let start = session.records.iter().map(|r| r.start_timestamp).min();
    let end = session.records.iter().map(|r| r.end_timestamp).max();
    let (Some(start), Some(end)) = (start, end) else {
        return Err(AnalysisError::StageOrder {
            stage: "timeline",
            missing: "at least one video",
        });
    };

    let instants = sample_instants(start, end, interval_s);
    let mut positions = Vec::with_capacity(Position::ALL.len());
    for position in Position::ALL {
        let pair = session
            .identities
            .get(&position)
            .ok_or(AnalysisError::StageOrder {
                stage: "timeline",
                missing: "resolved drone identities",
            })?;

        let count = |rank: DroneRank| -> Vec<u32> {
            let drone = pair.drone(rank);
            instants
                .iter()
                .map(|&x| {
                    session
                        .records
                        .iter()
                        .filter(|r| r.key.position == position && r.key.drone == *drone)
                        .filter(|r| r.start_timestamp <= x && x < r.end_timestamp)
                        .count() as u32
                })
                .collect()
        };

        positions.push(PositionSeries {
            position,
            first: count(DroneRank::First),
            second: count(DroneRank::Second),
        });
    }

    Ok(ConcurrencyTimeline {
        start,
        interval_s: interval_s.max(1),
        offsets_s: instants.iter().map(|&x| seconds_between(x, start)).collect(),
        positions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::resolve_identities;
    use crate::models::fixtures::*;

    fn resolved(records: Vec<crate::models::VideoRecord>) -> Session {
        let mut s = session(records);
        s.identities = resolve_identities(&s).unwrap();
        s
    }

    #[test]
    fn test_counts_use_half_open_intervals() {
        let s = resolved(vec![
            record(Position::P1, "D1", "A", hms(10, 0, 0), hms(10, 0, 4)),
            record(Position::P1, "D2", "B", hms(10, 0, 4), hms(10, 0, 8)),
            record(Position::P2, "D3", "A", hms(10, 0, 0), hms(10, 0, 8)),
            record(Position::P2, "D4", "B", hms(10, 0, 2), hms(10, 0, 6)),
            record(Position::P3, "D5", "A", hms(10, 0, 0), hms(10, 0, 8)),
            record(Position::P3, "D6", "B", hms(10, 0, 0), hms(10, 0, 2)),
        ]);
        let t = concurrency_timeline(&s, 2).unwrap();

        assert_eq!(t.offsets_s, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        let p1 = &t.positions[0];
        assert_eq!(p1.first, vec![1, 1, 0, 0, 0]);
        assert_eq!(p1.second, vec![0, 0, 1, 1, 0]);
        let p2 = &t.positions[1];
        assert_eq!(p2.second, vec![0, 1, 1, 0, 0]);
        assert_eq!(t.positions[2].second, vec![1, 0, 0, 0, 0]);
        assert_eq!(t.peak(), 1);
    }

    #[test]
    fn test_unaligned_end_is_not_sampled() {
        let instants = sample_instants(hms(10, 0, 0), hms(10, 0, 5), 2);
        assert_eq!(instants, vec![hms(10, 0, 0), hms(10, 0, 2), hms(10, 0, 4)]);
    }

    #[test]
    fn test_unresolved_identities_are_rejected() {
        let s = session(vec![record(Position::P1, "D1", "A", hms(10, 0, 0), hms(10, 0, 4))]);
        assert!(matches!(
            concurrency_timeline(&s, 2),
            Err(AnalysisError::StageOrder { .. })
        ));
    }
}
