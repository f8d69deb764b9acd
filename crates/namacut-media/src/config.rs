//! Export manager configuration.

use std::time::Duration;

/// Runtime knobs for the export manager.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Encoder program (name on PATH or absolute path)
    pub ffmpeg_program: String,
    /// Probe program (name on PATH or absolute path)
    pub ffprobe_program: String,
    /// Time allowed after SIGTERM before the encoder is killed
    pub terminate_grace: Duration,
    /// Time allowed after the kill for the process to be reaped
    pub kill_grace: Duration,
    /// Number of unmatched diagnostic lines kept for failure reports
    pub diagnostic_lines: usize,
    /// Final outputs smaller than this are treated as debris after a failure
    pub min_output_bytes: u64,
    /// Marker inserted before the extension of the temp output
    pub temp_marker: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ffmpeg_program: "ffmpeg".to_string(),
            ffprobe_program: "ffprobe".to_string(),
            terminate_grace: Duration::from_secs(3),
            kill_grace: Duration::from_secs(2),
            diagnostic_lines: 20,
            min_output_bytes: 1024 * 1024, // 1 MiB
            temp_marker: "tmp".to_string(),
        }
    }
}

impl ExportConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_program: std::env::var("NAMACUT_FFMPEG").unwrap_or(defaults.ffmpeg_program),
            ffprobe_program: std::env::var("NAMACUT_FFPROBE").unwrap_or(defaults.ffprobe_program),
            terminate_grace: std::env::var("NAMACUT_TERMINATE_GRACE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.terminate_grace),
            kill_grace: std::env::var("NAMACUT_KILL_GRACE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.kill_grace),
            diagnostic_lines: std::env::var("NAMACUT_DIAGNOSTIC_LINES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.diagnostic_lines),
            min_output_bytes: std::env::var("NAMACUT_MIN_OUTPUT_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_output_bytes),
            temp_marker: std::env::var("NAMACUT_TEMP_MARKER")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.temp_marker),
        }
    }

    /// Use a specific encoder binary.
    pub fn with_ffmpeg(mut self, program: impl Into<String>) -> Self {
        self.ffmpeg_program = program.into();
        self
    }

    /// Override both grace periods.
    pub fn with_grace(mut self, terminate: Duration, kill: Duration) -> Self {
        self.terminate_grace = terminate;
        self.kill_grace = kill;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.terminate_grace, Duration::from_secs(3));
        assert_eq!(config.kill_grace, Duration::from_secs(2));
        assert_eq!(config.diagnostic_lines, 20);
        assert_eq!(config.min_output_bytes, 1_048_576);
        assert_eq!(config.temp_marker, "tmp");
    }

    #[test]
    fn test_builders() {
        let config = ExportConfig::default()
            .with_ffmpeg("/opt/ffmpeg/bin/ffmpeg")
            .with_grace(Duration::from_millis(100), Duration::from_millis(50));
        assert_eq!(config.ffmpeg_program, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.terminate_grace, Duration::from_millis(100));
    }
}
