//! FFmpeg progress parsing from free-form diagnostic output.
//!
//! FFmpeg's stats line (`frame=.. fps=.. time=00:01:02.50 bitrate=..`) is
//! rewritten in place with `\r`, so callers split on both `\r` and `\n`.

use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

/// `time=H:MM:SS.ff`, `time=H:MM:SS`, `time=SS.ff`, or `time=SS`.
static TIME_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=(?:(\d+):(\d{1,2}):(\d{1,2}(?:\.\d+)?)|(\d+(?:\.\d+)?))\b").unwrap()
});

/// Extract the `time=` marker of a stats line, in seconds.
pub fn parse_time_marker(line: &str) -> Option<f64> {
    let caps = TIME_MARKER.captures(line)?;
    if let Some(seconds) = caps.get(4) {
        return seconds.as_str().parse().ok();
    }
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Incremental progress tracker for one job.
///
/// Emitted fractions never decrease, even when the encoder's own timestamps
/// do. Lines without a time marker are kept in a bounded ring for failure
/// reports.
#[derive(Debug)]
pub struct ProgressTracker {
    total_secs: f64,
    last_fraction: f64,
    diagnostics: VecDeque<String>,
    capacity: usize,
}

impl ProgressTracker {
    pub fn new(total_secs: f64, capacity: usize) -> Self {
        Self {
            total_secs,
            last_fraction: 0.0,
            diagnostics: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Feed one line; returns a fraction to emit, if the line advanced progress.
    pub fn feed_line(&mut self, line: &str) -> Option<f64> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match parse_time_marker(line) {
            Some(seconds) => {
                if self.total_secs <= 0.0 {
                    return None;
                }
                let fraction = (seconds / self.total_secs).clamp(0.0, 1.0);
                if fraction > self.last_fraction {
                    self.last_fraction = fraction;
                    Some(fraction)
                } else {
                    None
                }
            }
            None => {
                self.remember(line);
                None
            }
        }
    }

    fn remember(&mut self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        if self.diagnostics.len() == self.capacity {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(line.to_string());
    }

    pub fn last_fraction(&self) -> f64 {
        self.last_fraction
    }

    /// Retained diagnostic lines, oldest first.
    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.iter().cloned().collect()
    }

    pub fn percentage(&self) -> f64 {
        self.last_fraction * 100.0
    }
}

/// Split a raw stderr chunk into logical lines (`\r` and `\n` both end one).
pub fn split_segments(chunk: &str) -> impl Iterator<Item = &str> {
    chunk.split(['\r', '\n']).filter(|s| !s.trim().is_empty())
}
