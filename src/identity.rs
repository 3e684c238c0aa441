use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{DronePair, DroneTag, Position, Session};
use chrono::NaiveTime;
use std::collections::BTreeMap;
use tracing::info;

/// Decide which of the position's two drones started recording first.
///
/// Ties on the earliest start go to the drone appearing first in table order.
pub fn resolve_position(session: &Session, position: Position) -> AnalysisResult<DronePair> {
    let mut drones: Vec<&DroneTag> = Vec::new();
    let mut earliest: Option<(NaiveTime, &DroneTag)> = None;

    for record in session.records.iter().filter(|r| r.key.position == position) {
        let drone = &record.key.drone;
        if !drones.contains(&drone) {
            drones.push(drone);
        }
        let is_earlier = earliest.map_or(true, |(start, _)| record.start_timestamp < start);
        if is_earlier {
            earliest = Some((record.start_timestamp, drone));
        }
    }

    let &[a, b] = drones.as_slice() else {
        return Err(AnalysisError::MissingDrone {
            position,
            found: drones.len(),
        });
    };

    let (first, second) = if earliest.is_some_and(|(_, d)| d == b) {
        (b, a)
    } else {
        (a, b)
    };
    let (first, second) = (first.clone(), second.clone());

    Ok(DronePair { first, second })
}

/// Resolve every position; any position without exactly two drones aborts the run
pub fn resolve_identities(session: &Session) -> AnalysisResult<BTreeMap<Position, DronePair>> {
    let mut identities = BTreeMap::new();
    for position in Position::ALL {
        let pair = resolve_position(session, position)?;
        info!(
            "{}: first drone {}, second drone {}",
            position, pair.first, pair.second
        );
        identities.insert(position, pair);
    }
    Ok(identities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::*;

    #[test]
    fn test_earliest_start_is_first_drone() {
        let s = session(vec![
            record(Position::P1, "D1", "A", hms(10, 5, 0), hms(10, 9, 0)),
            record(Position::P1, "D2", "B", hms(10, 0, 0), hms(10, 4, 0)),
            record(Position::P1, "D1", "C", hms(10, 20, 0), hms(10, 25, 0)),
        ]);
        let pair = resolve_position(&s, Position::P1).unwrap();
        assert_eq!(pair.first, DroneTag::new("D2"));
        assert_eq!(pair.second, DroneTag::new("D1"));
    }

    #[test]
    fn test_later_listed_drone_can_be_first() {
        let s = session(vec![
            record(Position::P3, "D5", "A", hms(9, 0, 10), hms(9, 5, 0)),
            record(Position::P3, "D5", "B", hms(9, 6, 0), hms(9, 9, 0)),
            record(Position::P3, "D6", "C", hms(9, 0, 9), hms(9, 5, 0)),
        ]);
        let pair = resolve_position(&s, Position::P3).unwrap();
        assert_eq!(pair.first, DroneTag::new("D6"));
        assert_eq!(pair.second, DroneTag::new("D5"));
    }

    #[test]
    fn test_tie_goes_to_table_order() {
        let s = session(vec![
            record(Position::P2, "D3", "A", hms(9, 0, 0), hms(9, 5, 0)),
            record(Position::P2, "D4", "B", hms(9, 0, 0), hms(9, 6, 0)),
        ]);
        let pair = resolve_position(&s, Position::P2).unwrap();
        assert_eq!(pair.first, DroneTag::new("D3"));
    }

    #[test]
    fn test_single_drone_is_missing_drone() {
        let s = session(vec![record(Position::P3, "D5", "A", hms(9, 0, 0), hms(9, 5, 0))]);
        let err = resolve_position(&s, Position::P3).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingDrone { found: 1, .. }));
    }

    #[test]
    fn test_three_drones_is_missing_drone() {
        let s = session(vec![
            record(Position::P1, "D1", "A", hms(9, 0, 0), hms(9, 5, 0)),
            record(Position::P1, "D2", "B", hms(9, 0, 0), hms(9, 5, 0)),
            record(Position::P1, "D7", "C", hms(9, 0, 0), hms(9, 5, 0)),
        ]);
        assert!(matches!(
            resolve_position(&s, Position::P1),
            Err(AnalysisError::MissingDrone { found: 3, .. })
        ));
    }

    #[test]
    fn test_empty_position_aborts_all() {
        let s = session(vec![
            record(Position::P1, "D1", "A", hms(9, 0, 0), hms(9, 5, 0)),
            record(Position::P1, "D2", "B", hms(9, 1, 0), hms(9, 5, 0)),
        ]);
        assert!(matches!(
            resolve_identities(&s),
            Err(AnalysisError::MissingDrone {
                position: Position::P2,
                found: 0
            })
        ));
    }
}
