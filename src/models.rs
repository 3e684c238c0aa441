use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// One of the three fixed recording sites of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    P1,
    P2,
    P3,
}

impl Position {
    pub const ALL: [Position; 3] = [Position::P1, Position::P2, Position::P3];

    pub fn code(&self) -> &'static str {
        match self {
            Position::P1 => "P1",
            Position::P2 => "P2",
            Position::P3 => "P3",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Physical drone tag, unique within a position (e.g. `D1`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DroneTag(String);

impl DroneTag {
    pub fn new(tag: impl Into<String>) -> Self {
        DroneTag(tag.into())
    }
}

impl fmt::Display for DroneTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite identity of one video file within a session
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VideoKey {
    pub position: Position,
    pub drone: DroneTag,
    pub video_id: String,
}

impl VideoKey {
    pub fn new(position: Position, drone: DroneTag, video_id: impl Into<String>) -> Self {
        VideoKey {
            position,
            drone,
            video_id: video_id.into(),
        }
    }
}

impl fmt::Display for VideoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}_{}", self.position, self.drone, self.video_id)
    }
}

/// A single telemetry sample parsed from one subtitle block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub frame_number: u32,
    pub timestamp: NaiveTime,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Which of a position's two drones took off first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DroneRank {
    First,
    Second,
}

impl DroneRank {
    /// Offset that puts first-drone sorties on odd numbers and second-drone sorties on even ones
    fn numbering_offset(&self) -> u32 {
        match self {
            DroneRank::First => 1,
            DroneRank::Second => 2,
        }
    }
}

/// Flight segment of one drone at one position.
///
/// `index` counts the sortie-breaking gaps seen so far on that drone's timeline.
/// The exported flight number keeps the interleaved odd/even scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sortie {
    pub rank: DroneRank,
    pub index: u32,
}

impl Sortie {
    pub fn number(&self) -> u32 {
        self.index * 2 + self.rank.numbering_offset()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DronePair {
    pub first: DroneTag,
    pub second: DroneTag,
}

impl DronePair {
    pub fn drone(&self, rank: DroneRank) -> &DroneTag {
        match rank {
            DroneRank::First => &self.first,
            DroneRank::Second => &self.second,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    Start,
    End,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Start => f.write_str("start"),
            Boundary::End => f.write_str("end"),
        }
    }
}

/// Interval during which every position was recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl GlobalWindow {
    pub fn at(&self, boundary: Boundary) -> NaiveTime {
        match boundary {
            Boundary::Start => self.start,
            Boundary::End => self.end,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        seconds_between(self.end, self.start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameDropCheck {
    pub elapsed_s: f64,
    pub required_frames: f64,
    pub dropped: bool,
}

/// Summary row for one video file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub key: VideoKey,
    pub unique_name: String,
    pub folder_path: PathBuf,
    pub source_sha256: String,
    pub start_timestamp: NaiveTime,
    pub end_timestamp: NaiveTime,
    pub frame_count: u32,
    /// Largest range-line end offset, seconds from the start of the video
    pub frame_time_s: f64,
    pub min_altitude_m: f64,
    pub max_altitude_m: f64,
    pub max_drift_m: f64,
    pub drift_exceeded: bool,
    pub relay: bool,
    pub miss_click: bool,
    pub sortie: Option<Sortie>,
    pub start_frame: Option<u32>,
    pub end_frame: Option<u32>,
    pub frame_drop: Option<FrameDropCheck>,
}

impl VideoRecord {
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start_timestamp <= t && t <= self.end_timestamp
    }
}

/// Read-only frame sequences of every video, keyed by video identity
#[derive(Debug, Clone, Default)]
pub struct FrameStore {
    frames: BTreeMap<VideoKey, Vec<TelemetryFrame>>,
}

impl FrameStore {
    pub fn insert(&mut self, key: VideoKey, frames: Vec<TelemetryFrame>) {
        self.frames.insert(key, frames);
    }

    pub fn get(&self, key: &VideoKey) -> Option<&[TelemetryFrame]> {
        self.frames.get(key).map(Vec::as_slice)
    }
}

/// Session-wide analysis state handed from stage to stage by value
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub root: PathBuf,
    /// Rows in sorted folder/file order
    pub records: Vec<VideoRecord>,
    pub frames: FrameStore,
    pub identities: BTreeMap<Position, DronePair>,
    pub window: Option<GlobalWindow>,
}

impl Session {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Session {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Table indices of the videos recorded at `position`, in table order
    pub fn indices_at(&self, position: Position) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.key.position == position)
            .map(|(i, _)| i)
            .collect()
    }

    /// Table indices of one drone's videos at `position`, in table order
    pub fn indices_of(&self, position: Position, drone: &DroneTag) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.key.position == position && r.key.drone == *drone)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Signed difference `later - earlier` in seconds, microsecond precision
pub fn seconds_between(later: NaiveTime, earlier: NaiveTime) -> f64 {
    let delta = later.signed_duration_since(earlier);
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Pause between the end of one video and the start of the next
pub fn gap_seconds(previous_end: NaiveTime, current_start: NaiveTime) -> f64 {
    seconds_between(current_start, previous_end).abs()
}

/// Sort table indices by start timestamp; ties keep table order
pub fn sort_by_start(session: &Session, indices: &mut [usize]) {
    indices.sort_by_key(|&i| session.records[i].start_timestamp);
}
