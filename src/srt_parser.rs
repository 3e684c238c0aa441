use crate::error::{AnalysisError, AnalysisResult};
use crate::models::TelemetryFrame;
use chrono::NaiveTime;
use regex::{Captures, Regex};
use std::path::Path;

/// Frames of one video plus each block's range-line end offset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTelemetry {
    pub frames: Vec<TelemetryFrame>,
    /// End of each block's `start --> end` range, milliseconds from video start
    pub frame_times_ms: Vec<i64>,
}

impl ParsedTelemetry {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn max_frame_time_s(&self) -> f64 {
        self.frame_times_ms.iter().copied().max().unwrap_or(0) as f64 / 1000.0
    }
}

pub struct SrtParser {
    range_pattern: Regex,
    timestamp_pattern: Regex,
    geo_pattern: Regex,
}

impl SrtParser {
    pub fn new() -> Self {
        Self {
            range_pattern: Regex::new(
                r"(\d{2}):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2}),(\d{3})",
            )
            .expect("range pattern"),
            // Time of day with separate millisecond and microsecond groups
            timestamp_pattern: Regex::new(r"(\d{2}):(\d{2}):(\d{2}),(\d{3}),(\d{3})")
                .expect("timestamp pattern"),
            geo_pattern: Regex::new(
                r"\[latitude\s*:\s*([-+]?\d+(?:\.\d+)?)\]\s*\[longitude\s*:\s*([-+]?\d+(?:\.\d+)?)\]\s*\[altitude\s*:\s*([-+]?\d+(?:\.\d+)?)\]",
            )
            .expect("geo pattern"),
        }
    }

    /// Parse content read from `path`, failing when no block matches the tag grammar
    pub fn parse_source(&self, path: &Path, content: &str) -> AnalysisResult<ParsedTelemetry> {
        let parsed = self.parse_content(content);
        if parsed.is_empty() {
            return Err(AnalysisError::MissingTelemetry {
                path: path.to_path_buf(),
            });
        }
        Ok(parsed)
    }

    /// Parse SRT content; blocks missing any required tag are skipped
    pub fn parse_content(&self, content: &str) -> ParsedTelemetry {
        let content = content
            .trim_start_matches('\u{feff}')
            .replace("\r\n", "\n")
            .replace('\r', "\n");
        let mut parsed = ParsedTelemetry::default();

        for block in content.split("\n\n") {
            let block = block.trim();
            if block.is_empty() {
                continue;
            }

            let Some((frame, frame_time_ms)) = self.parse_block(block) else {
                tracing::debug!("skipping block without telemetry tags");
                continue;
            };

            if let Some(last) = parsed.frames.last() {
                if frame.frame_number <= last.frame_number {
                    tracing::debug!(
                        "frame {} does not follow frame {}",
                        frame.frame_number,
                        last.frame_number
                    );
                }
            }

            parsed.frames.push(frame);
            parsed.frame_times_ms.push(frame_time_ms);
        }

        parsed
    }

    fn parse_block(&self, block: &str) -> Option<(TelemetryFrame, i64)> {
        let first_line = block.lines().next()?;
        let frame_number: u32 = first_line.trim().parse().ok()?;

        let range = self.range_pattern.captures(block)?;
        let frame_time_ms = clock_ms(&range, 5)?;

        let ts = self.timestamp_pattern.captures(block)?;
        let hour: u32 = ts[1].parse().ok()?;
        let minute: u32 = ts[2].parse().ok()?;
        let second: u32 = ts[3].parse().ok()?;
        let milli: u32 = ts[4].parse().ok()?;
        let micro: u32 = ts[5].parse().ok()?;
        let timestamp = NaiveTime::from_hms_micro_opt(hour, minute, second, milli * 1000 + micro)?;

        let geo = self.geo_pattern.captures(block)?;

        Some((
            TelemetryFrame {
                frame_number,
                timestamp,
                latitude: geo[1].parse().ok()?,
                longitude: geo[2].parse().ok()?,
                altitude: geo[3].parse().ok()?,
            },
            frame_time_ms,
        ))
    }
}

impl Default for SrtParser {
    fn default() -> Self {
        Self::new()
    }
}

/// `HH:MM:SS,mmm` starting at capture group `first` as milliseconds
fn clock_ms(caps: &Captures<'_>, first: usize) -> Option<i64> {
    let h: i64 = caps[first].parse().ok()?;
    let m: i64 = caps[first + 1].parse().ok()?;
    let s: i64 = caps[first + 2].parse().ok()?;
    let ms: i64 = caps[first + 3].parse().ok()?;
    Some(h * 3_600_000 + m * 60_000 + s * 1000 + ms)
}
