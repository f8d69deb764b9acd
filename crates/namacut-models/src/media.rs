//! Source media descriptor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Video codecs from the VC-1/WMV family. These never survive a stream copy
/// into a modern container and always need a re-encode.
pub const LEGACY_VIDEO_CODECS: &[&str] = &["wmv1", "wmv2", "wmv3", "vc1", "wmva", "wmvp"];

/// Probed facts about a loaded file.
///
/// Replaced wholesale when a new file is loaded; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMedia {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    /// Codec name as reported by the probe, `None` when unknown.
    #[serde(default)]
    pub video_codec: Option<String>,
}

impl SourceMedia {
    pub fn new(path: impl Into<PathBuf>, duration_seconds: f64, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            duration_seconds: duration_seconds.max(0.0),
            width,
            height,
            video_codec: None,
        }
    }

    pub fn with_video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = Some(codec.into());
        self
    }

    /// Whether the source uses a VC-1/WMV family codec.
    pub fn is_legacy_codec(&self) -> bool {
        self.video_codec
            .as_deref()
            .map(|codec| LEGACY_VIDEO_CODECS.contains(&codec.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Source aspect ratio (width / height), `None` for degenerate dimensions.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(self.width as f64 / self.height as f64)
        }
    }

    /// File stem used when suggesting output names.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string())
    }
}
