//! Shared data models for the NamaCut export core.
//!
//! This crate provides Serde-serializable value types for:
//! - Source media descriptors and display geometry
//! - The interactive transform state and the actions that replace it
//! - Output settings (container, codecs, quality, resolution)
//! - Export job identity, state, and the event stream

pub mod geometry;
pub mod job;
pub mod media;
pub mod settings;
pub mod timestamp;
pub mod transform;

// Re-export common types
pub use geometry::{CropRect, DisplayGeometry, Rect, Rotation};
pub use job::{Completion, CompletionReason, ExportEvent, JobId, JobState, Warning};
pub use media::SourceMedia;
pub use settings::{
    AudioCodec, AudioOnlyFormat, Container, ExportKind, OutputSettings, QualityMode,
    ResolutionPreset, SettingsParseError, VideoCodec, DEFAULT_AUDIO_BITRATE_KBPS,
    DEFAULT_FLAC_COMPRESSION, MAX_FLAC_COMPRESSION,
};
pub use timestamp::{format_hmsms, parse_timestamp, validate_range, TimeRange, TimestampError};
pub use transform::{AspectRatioPreset, TransformAction, TransformState};
