//! Timestamp parsing, formatting, and trim-range validation.
//!
//! Supports `HH:MM:SS`, `HH:MM:SS.mmm`, `MM:SS`, and bare seconds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Slack allowed between a requested end time and the probed duration.
pub const DURATION_TOLERANCE_SECS: f64 = 0.01;

/// Timestamp parsing/validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Timestamp cannot be negative")]
    Negative,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS.mmm, MM:SS, or seconds")]
    InvalidFormat(String),

    #[error("Start time ({start:.3}s) must be before end time ({end:.3}s)")]
    StartNotBeforeEnd { start: f64, end: f64 },

    #[error("End time ({end_secs:.3}s) exceeds media duration ({duration:.3}s)")]
    ExceedsDuration { end_secs: f64, duration: f64 },
}

/// A validated trim range in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimeRange {
    /// Length of the range in seconds.
    pub fn duration(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Parse a timestamp string to total seconds.
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    if parts.len() > 3 {
        return Err(TimestampError::InvalidFormat(ts.to_string()));
    }

    const NAMES: [&str; 3] = ["hours", "minutes", "seconds"];
    let offset = 3 - parts.len();

    let mut total = 0.0;
    for (i, part) in parts.iter().enumerate() {
        let name = NAMES[offset + i];
        let value: f64 = part
            .parse()
            .map_err(|_| TimestampError::InvalidValue(name, part.to_string()))?;
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        total = total * 60.0 + value;
    }

    Ok(total)
}

/// Format seconds as `HH:MM:SS.mmm`.
pub fn format_hmsms(total_secs: f64) -> String {
    let total_ms = (total_secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// Validate a trim range against the media duration (when known).
pub fn validate_range(
    start_secs: f64,
    end_secs: f64,
    duration: Option<f64>,
) -> Result<TimeRange, TimestampError> {
    if start_secs < 0.0 || end_secs < 0.0 {
        return Err(TimestampError::Negative);
    }
    if start_secs.is_nan() || end_secs.is_nan() || end_secs <= start_secs {
        return Err(TimestampError::StartNotBeforeEnd {
            start: start_secs,
            end: end_secs,
        });
    }
    if let Some(duration) = duration {
        if duration > 0.0 && end_secs > duration + DURATION_TOLERANCE_SECS {
            return Err(TimestampError::ExceedsDuration { end_secs, duration });
        }
    }

    Ok(TimeRange {
        start_secs,
        end_secs,
    })
}
