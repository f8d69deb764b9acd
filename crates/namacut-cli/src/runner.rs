//! One export run: probe, plan, start, and follow the event stream.

use std::path::PathBuf;

use tracing::{info, warn};

use namacut_media::{
    apply_aspect_ratio, completion_result, default_crop_rect, display_geometry, plan_export,
    probe_media, Anchor, ExportConfig, ExportManager, ExportRequest,
};
use namacut_models::{
    format_hmsms, parse_timestamp, Completion, DisplayGeometry, ExportEvent, SourceMedia,
    TransformAction, TransformState,
};

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

pub const USAGE: &str = "namacut-export <input> [start] [end]";

/// Positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArgs {
    pub input: PathBuf,
    pub start_secs: f64,
    /// `None` exports to the end of the source
    pub end_secs: Option<f64>,
}

impl ExportArgs {
    /// `<input> [start] [end]`; timestamps accept `HH:MM:SS.mmm`, `MM:SS`,
    /// or seconds.
    pub fn parse<I>(args: I) -> CliResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let input = args
            .next()
            .map(PathBuf::from)
            .ok_or_else(|| CliError::usage(USAGE))?;
        let start_secs = args
            .next()
            .map(|ts| parse_timestamp(&ts))
            .transpose()?
            .unwrap_or(0.0);
        let end_secs = args.next().map(|ts| parse_timestamp(&ts)).transpose()?;

        if args.next().is_some() {
            return Err(CliError::usage(USAGE));
        }

        Ok(Self {
            input,
            start_secs,
            end_secs,
        })
    }
}

/// Transform and display geometry for a headless run.
///
/// The viewport equals the rotated frame, so display pixels are frame pixels.
pub fn build_transform(config: &CliConfig, source: &SourceMedia) -> (TransformState, DisplayGeometry) {
    let mut state = TransformState::new();
    for _ in 0..config.rotation.degrees() / 90 {
        state = state.apply(TransformAction::RotateRight);
    }
    if config.flip_horizontal {
        state = state.apply(TransformAction::FlipHorizontal);
    }
    if config.flip_vertical {
        state = state.apply(TransformAction::FlipVertical);
    }
    state = state.apply(TransformAction::SetAspectRatio(config.aspect_ratio));

    let (viewport_w, viewport_h) = state
        .rotation
        .effective_dimensions(source.width, source.height);
    let geometry = display_geometry(
        source.width,
        source.height,
        state.rotation,
        viewport_w,
        viewport_h,
    );

    let crop = match (config.crop, config.aspect_ratio.ratio()) {
        (Some(rect), Some(ratio)) => Some(apply_aspect_ratio(rect, ratio, Anchor::TopLeft)),
        (Some(rect), None) => Some(rect),
        (None, Some(_)) => default_crop_rect(&geometry, &state, config.aspect_ratio),
        (None, None) => None,
    };
    if let Some(rect) = crop {
        state = state.apply(TransformAction::SetCrop(rect));
    }

    (state, geometry)
}

/// Run one export to a successful completion.
///
/// An encoder failure ends the run with `MediaError::ProcessFailure`. Ctrl-C
/// aborts the export and ends it with `MediaError::Aborted`.
pub async fn run_export(
    args: &ExportArgs,
    config: &CliConfig,
    export_config: ExportConfig,
) -> CliResult<Completion> {
    let source = probe_media(&export_config.ffprobe_program, &args.input).await?;
    info!(
        input = %source.path.display(),
        width = source.width,
        height = source.height,
        codec = source.video_codec.as_deref().unwrap_or("unknown"),
        "Loaded {}", format_hmsms(source.duration_seconds)
    );

    let end_secs = args.end_secs.unwrap_or(source.duration_seconds);
    let settings = config.output_settings();
    let (transform, geometry) = build_transform(config, &source);
    let plan = plan_export(&source, &transform, &geometry, &settings)?;

    let dir = config.output_directory(settings.kind);
    tokio::fs::create_dir_all(&dir).await?;
    let output = plan.suggest_output_path(&dir, &source, &settings);

    let manager = ExportManager::new(export_config);
    let request = ExportRequest::from_plan(&source.path, &output, args.start_secs, end_secs, &plan)
        .with_source_duration(source.duration_seconds);
    let mut handle = manager.start(request)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut abort_sent = false;
    let mut last_decile = -1;

    loop {
        tokio::select! {
            event = handle.recv() => match event {
                Some(ExportEvent::Started { output_path, .. }) => info!(
                    output = %output_path.display(),
                    "Exporting {} - {}",
                    format_hmsms(args.start_secs),
                    format_hmsms(end_secs)
                ),
                Some(ExportEvent::Progress { fraction, .. }) => {
                    let decile = (fraction * 10.0).floor() as i32;
                    if decile > last_decile {
                        last_decile = decile;
                        info!("Progress {:.0}%", fraction * 100.0);
                    }
                }
                Some(ExportEvent::Completed(completion)) => {
                    return Ok(completion_result(completion)?);
                }
                None => break,
            },
            _ = &mut ctrl_c, if !abort_sent => {
                abort_sent = true;
                warn!("Interrupted; aborting export");
                manager.abort();
            }
        }
    }

    Ok(completion_result(handle.wait().await?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use namacut_models::{AspectRatioPreset, Rect, Rotation};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let parsed = ExportArgs::parse(args(&["in.mp4", "00:01:00", "90.5"])).unwrap();
        assert_eq!(parsed.input, PathBuf::from("in.mp4"));
        assert_eq!(parsed.start_secs, 60.0);
        assert_eq!(parsed.end_secs, Some(90.5));

        let parsed = ExportArgs::parse(args(&["in.mp4"])).unwrap();
        assert_eq!(parsed.start_secs, 0.0);
        assert_eq!(parsed.end_secs, None);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(matches!(ExportArgs::parse(args(&[])), Err(CliError::Usage(_))));
        assert!(matches!(
            ExportArgs::parse(args(&["in.mp4", "soon"])),
            Err(CliError::Timestamp(_))
        ));
        assert!(ExportArgs::parse(args(&["a", "1", "2", "3"])).is_err());
    }

    #[test]
    fn test_build_transform_rotation_and_crop() {
        let config = CliConfig {
            rotation: Rotation::Deg90,
            flip_horizontal: true,
            crop: Some(Rect::new(0.0, 0.0, 540.0, 960.0)),
            ..Default::default()
        };
        let source = SourceMedia::new("in.mp4", 10.0, 1920, 1080);
        let (state, geometry) = build_transform(&config, &source);

        assert_eq!(state.rotation, Rotation::Deg90);
        assert!(state.flip_horizontal);
        assert_eq!(state.active_crop(), Some(Rect::new(0.0, 0.0, 540.0, 960.0)));
        assert_eq!((geometry.viewport_width, geometry.viewport_height), (1080, 1920));
        assert_eq!((geometry.pad_x, geometry.pad_y), (0.0, 0.0));
    }

    #[test]
    fn test_build_transform_aspect_default_crop() {
        let config = CliConfig {
            aspect_ratio: AspectRatioPreset::Square,
            ..Default::default()
        };
        let source = SourceMedia::new("in.mp4", 10.0, 1920, 1080);
        let (state, _) = build_transform(&config, &source);

        let crop = state.active_crop().unwrap();
        assert!((crop.width - crop.height).abs() < 2.0);
        assert_eq!(state.aspect_ratio, AspectRatioPreset::Square);
    }

    #[test]
    fn test_run_export_rejects_missing_input() {
        let parsed = ExportArgs::parse(args(&["/nonexistent/in.mp4", "0", "5"])).unwrap();
        let err = tokio_test::block_on(run_export(
            &parsed,
            &CliConfig::default(),
            ExportConfig::default(),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            CliError::Media(namacut_media::MediaError::InputError { .. })
        ));
    }

    #[test]
    fn test_build_transform_identity() {
        let source = SourceMedia::new("in.mp4", 10.0, 1280, 720);
        let (state, _) = build_transform(&CliConfig::default(), &source);
        assert!(!state.has_orientation_change());
        assert!(state.active_crop().is_none());
    }
}
