//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use namacut_models::TimestampError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while planning or running an export.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    /// File missing, unreadable, or not a recognized video.
    #[error("Unsupported or unreadable file {path}: {message}")]
    InputError { path: PathBuf, message: String },

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(#[from] TimestampError),

    #[error("Unsupported combination: {0}")]
    UnsupportedCombination(String),

    #[error("An export is already in progress")]
    AlreadyInProgress,

    #[error("FFmpeg exited with status {exit_code:?}")]
    ProcessFailure {
        exit_code: Option<i32>,
        /// Tail of unmatched diagnostic lines.
        diagnostics: Vec<String>,
    },

    /// User-requested cancellation.
    #[error("Export aborted")]
    Aborted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn input_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InputError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedCombination(message.into())
    }

    pub fn process_failure(exit_code: Option<i32>, diagnostics: Vec<String>) -> Self {
        Self::ProcessFailure {
            exit_code,
            diagnostics,
        }
    }

    /// Aborts are expected outcomes and must not be presented as errors.
    pub fn is_user_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Errors raised before any process was spawned.
    pub fn is_rejected_before_spawn(&self) -> bool {
        matches!(
            self,
            Self::InputError { .. }
                | Self::InvalidTimeRange(_)
                | Self::UnsupportedCombination(_)
                | Self::AlreadyInProgress
                | Self::FfmpegNotFound
        )
    }
}
