//! Error types for the session analysis pipeline.
//!
//! Only structural failures live here. Data anomalies (drift, low altitude,
//! miss-clicks, frame drops) are recorded on `VideoRecord` and never abort a run.

use std::io;
use std::path::PathBuf;

use chrono::NaiveTime;
use thiserror::Error;

use crate::models::{Boundary, Position};

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Session path is missing or not a directory.
    #[error("Invalid file path or the folder does not exist: {}", path.display())]
    InvalidFolder { path: PathBuf },

    /// A telemetry file produced no frames matching the tag grammar.
    #[error("No telemetry frames found in {}", path.display())]
    MissingTelemetry { path: PathBuf },

    /// A position does not have exactly two drones.
    #[error("Position {position} must have exactly two drones, found {found}")]
    MissingDrone { position: Position, found: usize },

    /// The recording windows of the positions never intersect.
    #[error("Positions never recorded simultaneously: latest start {start} is after earliest end {end}")]
    NoOverlap { start: NaiveTime, end: NaiveTime },

    /// No video at the position covers the boundary timestamp.
    #[error("No video at position {position} contains the global {boundary} time {at}")]
    NoContainingVideo {
        position: Position,
        boundary: Boundary,
        at: NaiveTime,
    },

    /// The containing video has no frame on the required side of the boundary.
    #[error("Video {video} has no frame for the global {boundary} time {at}")]
    NoBoundaryFrame {
        video: String,
        boundary: Boundary,
        at: NaiveTime,
    },

    /// A stage ran before the stage it depends on.
    #[error("Stage '{stage}' requires {missing}")]
    StageOrder {
        stage: &'static str,
        missing: &'static str,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AnalysisError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the pipeline may continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MissingTelemetry { .. })
    }
}
