//! Export job identity, lifecycle state, warnings, and the event stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::settings::{AudioCodec, Container, VideoCodec};

/// Unique identifier for an export job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of the export slot.
///
/// `Idle -> Running -> {Succeeded, Failed, Aborted}`, with
/// `Running -> Aborting -> Aborted` as the cancellation path. Terminal states
/// behave like `Idle` for the purpose of starting a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Aborting,
    Succeeded,
    Failed,
    Aborted,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Aborting => "aborting",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Aborted => "aborted",
        }
    }

    /// Whether a job currently owns the slot.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Running | JobState::Aborting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Aborted
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Non-fatal adjustment made while planning an export.
///
/// Callers must surface these to the user; nothing is substituted silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    /// Requested video codec is illegal in the container.
    CodecSubstituted {
        container: Container,
        requested: VideoCodec,
        substituted: VideoCodec,
    },
    /// Requested audio codec is illegal in the container.
    AudioCodecSubstituted {
        container: Container,
        requested: AudioCodec,
        substituted: AudioCodec,
    },
    /// Constant-quality factor was outside the codec family's range.
    QualityClamped { requested: u8, clamped: u8 },
    /// Some filters were dropped for a container with filter limitations.
    FiltersDropped {
        container: Container,
        dropped: Vec<String>,
    },
    /// Stream copy was requested but the plan needs a re-encode.
    ReencodeRequired { reason: String },
    /// The crop selection mapped to nothing and was ignored.
    CropIgnored,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::CodecSubstituted {
                container,
                requested,
                substituted,
            } => write!(
                f,
                "{} does not support {}; using {} instead",
                container, requested, substituted
            ),
            Warning::AudioCodecSubstituted {
                container,
                requested,
                substituted,
            } => write!(
                f,
                "{} does not support {} audio; using {} instead",
                container, requested, substituted
            ),
            Warning::QualityClamped { requested, clamped } => {
                write!(f, "quality factor {} out of range; using {}", requested, clamped)
            }
            Warning::FiltersDropped { container, dropped } => write!(
                f,
                "{} cannot apply the full filter chain; dropped {}",
                container,
                dropped.join(", ")
            ),
            Warning::ReencodeRequired { reason } => {
                write!(f, "stream copy not possible ({}); re-encoding", reason)
            }
            Warning::CropIgnored => write!(f, "crop selection too small; exporting uncropped"),
        }
    }
}

/// Why a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Success,
    /// Encoder exited non-zero, or the commit failed.
    Failed,
    /// User-requested cancellation. Not an error for presentation purposes.
    Aborted,
}

/// Final outcome of a job. Exactly one per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub job_id: JobId,
    pub output_path: PathBuf,
    pub success: bool,
    pub reason: CompletionReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Tail of the encoder's unmatched diagnostic lines (failures only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

impl Completion {
    pub fn succeeded(job_id: JobId, output_path: PathBuf) -> Self {
        Self {
            job_id,
            output_path,
            success: true,
            reason: CompletionReason::Success,
            exit_code: Some(0),
            diagnostics: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn failed(
        job_id: JobId,
        output_path: PathBuf,
        exit_code: Option<i32>,
        diagnostics: Vec<String>,
    ) -> Self {
        Self {
            job_id,
            output_path,
            success: false,
            reason: CompletionReason::Failed,
            exit_code,
            diagnostics,
            finished_at: Utc::now(),
        }
    }

    pub fn aborted(job_id: JobId, output_path: PathBuf) -> Self {
        Self {
            job_id,
            output_path,
            success: false,
            reason: CompletionReason::Aborted,
            exit_code: None,
            diagnostics: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.reason == CompletionReason::Aborted
    }

    /// Job state this completion leaves the slot in.
    pub fn final_state(&self) -> JobState {
        match self.reason {
            CompletionReason::Success => JobState::Succeeded,
            CompletionReason::Failed => JobState::Failed,
            CompletionReason::Aborted => JobState::Aborted,
        }
    }
}

/// Event emitted by the export manager.
///
/// Order per job: one `Started`, zero or more non-decreasing `Progress`,
/// then exactly one `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportEvent {
    Started {
        job_id: JobId,
        output_path: PathBuf,
        started_at: DateTime<Utc>,
    },
    Progress {
        job_id: JobId,
        fraction: f64,
    },
    Completed(Completion),
}

impl ExportEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            ExportEvent::Started { job_id, .. } => job_id,
            ExportEvent::Progress { job_id, .. } => job_id,
            ExportEvent::Completed(completion) => &completion.job_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ExportEvent::Completed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_unique() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
        assert_eq!(JobId::from_string("abc").to_string(), "abc");
    }

    #[test]
    fn test_job_state_predicates() {
        assert!(JobState::Running.is_active());
        assert!(JobState::Aborting.is_active());
        assert!(!JobState::Idle.is_active());
        assert!(JobState::Aborted.is_terminal());
        assert!(!JobState::Running.is_terminal());
    }

    #[test]
    fn test_completion_final_state() {
        let id = JobId::new();
        let done = Completion::succeeded(id.clone(), "out.mp4".into());
        assert!(done.success);
        assert_eq!(done.final_state(), JobState::Succeeded);

        let aborted = Completion::aborted(id, "out.mp4".into());
        assert!(!aborted.success);
        assert!(aborted.is_aborted());
        assert_eq!(aborted.final_state(), JobState::Aborted);
    }

    #[test]
    fn test_event_serde_tagged() {
        let event = ExportEvent::Progress {
            job_id: JobId::from_string("j1"),
            fraction: 0.5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["job_id"], "j1");
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning::CodecSubstituted {
            container: Container::Webm,
            requested: VideoCodec::H264,
            substituted: VideoCodec::Vp9,
        };
        assert_eq!(warning.to_string(), "webm does not support h264; using vp9 instead");
    }
}
