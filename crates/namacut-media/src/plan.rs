//! Export planning: from source, transform, and settings to the exact
//! filter chain and codec arguments.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use namacut_models::{
    Container, DisplayGeometry, OutputSettings, SourceMedia, TransformState, Warning,
};

use crate::codec::{codec_spec, CodecContext, CodecSpec};
use crate::error::MediaResult;
use crate::filters::{build_filter_chain, simplify_for_container, FilterChain};
use crate::fs_utils::{suggest_base_name, unique_output_path};

/// Everything needed to start an export, minus paths and the time range.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub filter_chain: Option<FilterChain>,
    pub codec: CodecSpec,
    /// Ordered user-facing notices about changed or dropped settings.
    pub warnings: Vec<Warning>,
    /// Output extension without the dot.
    pub extension: String,
}

impl ExportPlan {
    pub fn is_stream_copy(&self) -> bool {
        self.codec.is_stream_copy()
    }

    /// Free output path in `dir` named after the source and settings.
    pub fn suggest_output_path(
        &self,
        dir: &Path,
        source: &SourceMedia,
        settings: &OutputSettings,
    ) -> PathBuf {
        let base = suggest_base_name(&source.stem(), settings);
        unique_output_path(dir, &base, &self.extension)
    }
}

fn source_extension(source: &SourceMedia) -> String {
    source
        .path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Container whose muxer will actually be used.
fn effective_container(settings: &OutputSettings, source_ext: &str) -> Option<Container> {
    match settings.container {
        Container::Original => Container::from_str(source_ext).ok(),
        container => Some(container),
    }
}

/// Plan an export of `source` with the current transform and settings.
///
/// Audio-only exports ignore the transform. An enabled crop that maps to no
/// usable source rectangle is dropped with [`Warning::CropIgnored`].
pub fn plan_export(
    source: &SourceMedia,
    transform: &TransformState,
    geometry: &DisplayGeometry,
    settings: &OutputSettings,
) -> MediaResult<ExportPlan> {
    let source_ext = source_extension(source);
    let extension = settings.output_extension(&source_ext);
    let container = effective_container(settings, &source_ext);
    let mut warnings = Vec::new();

    let filter_chain = if settings.is_audio_only() {
        None
    } else {
        let chain = build_filter_chain(transform, geometry, settings.resolution);

        if transform.active_crop().is_some() && chain.as_ref().and_then(|c| c.crop()).is_none() {
            warnings.push(Warning::CropIgnored);
        }

        match (chain, container) {
            (Some(chain), Some(container)) => {
                let (chain, warning) = simplify_for_container(chain, container);
                warnings.extend(warning);
                Some(chain).filter(|c| !c.is_empty())
            }
            (chain, _) => chain,
        }
    };

    let context = CodecContext {
        has_filters: filter_chain.is_some(),
        legacy_source: source.is_legacy_codec(),
        source_container: container,
    };
    let codec = codec_spec(settings, context)?;
    warnings.extend(codec.warnings.iter().cloned());

    for warning in &warnings {
        tracing::warn!(source = %source.path.display(), "{}", warning);
    }

    Ok(ExportPlan {
        filter_chain,
        codec,
        warnings,
        extension,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::display_geometry;
    use namacut_models::{AudioOnlyFormat, Rect, Rotation, TransformAction, VideoCodec};
    use tempfile::TempDir;

    fn hd_source(name: &str) -> SourceMedia {
        SourceMedia::new(name, 60.0, 1920, 1080).with_video_codec("h264")
    }

    fn hd_geometry(rotation: Rotation) -> DisplayGeometry {
        display_geometry(1920, 1080, rotation, 960, 540)
    }

    #[test]
    fn test_untouched_original_is_stream_copy() {
        let plan = plan_export(
            &hd_source("in.mkv"),
            &TransformState::default(),
            &hd_geometry(Rotation::Deg0),
            &OutputSettings::original(),
        )
        .unwrap();

        assert!(plan.is_stream_copy());
        assert!(plan.filter_chain.is_none());
        assert!(plan.warnings.is_empty());
        assert_eq!(plan.extension, "mkv");
    }

    #[test]
    fn test_rotation_forces_reencode_in_original() {
        let transform = TransformState::default().apply(TransformAction::RotateRight);
        let plan = plan_export(
            &hd_source("in.mp4"),
            &transform,
            &hd_geometry(Rotation::Deg90),
            &OutputSettings::original(),
        )
        .unwrap();

        assert!(!plan.is_stream_copy());
        assert_eq!(plan.filter_chain.unwrap().to_filter_string(), "transpose=1");
        assert!(matches!(plan.warnings[0], Warning::ReencodeRequired { .. }));
    }

    #[test]
    fn test_rotated_webm_in_original_stays_webm_compatible() {
        let source = SourceMedia::new("/v/clip.webm", 60.0, 1920, 1080).with_video_codec("vp9");
        let transform = TransformState::default().apply(TransformAction::RotateRight);
        let plan = plan_export(
            &source,
            &transform,
            &hd_geometry(Rotation::Deg90),
            &OutputSettings::original(),
        )
        .unwrap();

        assert_eq!(plan.extension, "webm");
        let args = plan.codec.output_args();
        let after = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };
        assert_eq!(after("-c:v").as_deref(), Some("libvpx-vp9"));
        assert_eq!(after("-c:a").as_deref(), Some("libopus"));
        assert!(!args.iter().any(|a| a == "libx264" || a == "aac"));

        assert!(matches!(plan.warnings[0], Warning::ReencodeRequired { .. }));
        assert!(plan.warnings.iter().any(|w| matches!(
            w,
            Warning::CodecSubstituted {
                container: Container::Webm,
                substituted: VideoCodec::Vp9,
                ..
            }
        )));
        assert!(plan
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::AudioCodecSubstituted { .. })));
    }

    #[test]
    fn test_legacy_container_drops_flips() {
        let transform = TransformState::default()
            .apply(TransformAction::RotateRight)
            .apply(TransformAction::FlipHorizontal)
            .apply(TransformAction::SetCrop(Rect::new(400.0, 100.0, 100.0, 200.0)));
        let plan = plan_export(
            &hd_source("in.mp4"),
            &transform,
            &hd_geometry(Rotation::Deg90),
            &OutputSettings::default().with_container(Container::Avi),
        )
        .unwrap();

        let filters = plan.filter_chain.unwrap().to_filter_string();
        assert!(filters.starts_with("crop="));
        assert!(filters.ends_with("transpose=1"));
        assert!(!filters.contains("hflip"));
        assert!(plan
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::FiltersDropped { .. })));
    }

    #[test]
    fn test_codec_substitution_warning_propagates() {
        let settings = OutputSettings::default()
            .with_container(Container::Webm)
            .with_video_codec(VideoCodec::H264);
        let plan = plan_export(
            &hd_source("in.mp4"),
            &TransformState::default(),
            &hd_geometry(Rotation::Deg0),
            &settings,
        )
        .unwrap();

        assert_eq!(plan.extension, "webm");
        assert!(plan.warnings.iter().any(|w| matches!(
            w,
            Warning::CodecSubstituted {
                substituted: VideoCodec::Vp9,
                ..
            }
        )));
    }

    #[test]
    fn test_stale_crop_is_reported() {
        // Crop drawn while rotated, geometry still describes the old rotation
        let transform = TransformState::default()
            .apply(TransformAction::RotateRight)
            .apply(TransformAction::SetCrop(Rect::new(100.0, 100.0, 200.0, 200.0)));
        let plan = plan_export(
            &hd_source("in.mp4"),
            &transform,
            &hd_geometry(Rotation::Deg0),
            &OutputSettings::default(),
        )
        .unwrap();

        assert_eq!(plan.warnings[0], Warning::CropIgnored);
        assert_eq!(plan.filter_chain.unwrap().to_filter_string(), "transpose=1");
    }

    #[test]
    fn test_audio_only_ignores_transform() {
        let transform = TransformState::default().apply(TransformAction::FlipVertical);
        let plan = plan_export(
            &hd_source("in.mp4"),
            &transform,
            &hd_geometry(Rotation::Deg0),
            &OutputSettings::audio_only(AudioOnlyFormat::Aac),
        )
        .unwrap();

        assert!(plan.filter_chain.is_none());
        assert!(plan.codec.is_audio_only());
        assert_eq!(plan.extension, "m4a");
    }

    #[test]
    fn test_suggest_output_path() {
        let dir = TempDir::new().unwrap();
        let source = hd_source("/videos/holiday.mp4");
        let settings = OutputSettings::default();
        let plan = plan_export(
            &source,
            &TransformState::default(),
            &hd_geometry(Rotation::Deg0),
            &settings,
        )
        .unwrap();

        assert_eq!(
            plan.suggest_output_path(dir.path(), &source, &settings),
            dir.path().join("holiday.original.h264.mp4")
        );
    }
}
