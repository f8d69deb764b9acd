//! CLI configuration.
//!
//! Output settings and the picture transform come from `NAMACUT_*`
//! environment variables (a `.env` file works too). Crop coordinates are
//! pixels of the rotated frame, since the CLI has no viewport of its own.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use namacut_models::{
    AspectRatioPreset, AudioCodec, AudioOnlyFormat, Container, ExportKind, OutputSettings,
    QualityMode, Rect, ResolutionPreset, Rotation, VideoCodec, DEFAULT_AUDIO_BITRATE_KBPS,
    DEFAULT_FLAC_COMPRESSION, MAX_FLAC_COMPRESSION,
};

use crate::error::{CliError, CliResult};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// Explicit output directory; defaults to `~/Videos|Music/NamaCut_Output`
    pub output_dir: Option<PathBuf>,
    /// Home directory used for the default output directory
    pub home_dir: PathBuf,
    pub container: Container,
    pub video_codec: VideoCodec,
    pub quality: QualityMode,
    pub resolution: ResolutionPreset,
    pub audio_codec: AudioCodec,
    pub audio_bitrate_kbps: u32,
    /// Audio-only export format, if any
    pub audio_only: Option<AudioOnlyFormat>,
    pub flac_compression_level: u8,
    pub rotation: Rotation,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// Crop in rotated-frame pixels
    pub crop: Option<Rect>,
    /// Aspect preset; without an explicit crop it selects the default crop box
    pub aspect_ratio: AspectRatioPreset,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            home_dir: PathBuf::from("."),
            container: Container::Mp4,
            video_codec: VideoCodec::H264,
            quality: QualityMode::Auto,
            resolution: ResolutionPreset::Original,
            audio_codec: AudioCodec::Aac,
            audio_bitrate_kbps: DEFAULT_AUDIO_BITRATE_KBPS,
            audio_only: None,
            flac_compression_level: DEFAULT_FLAC_COMPRESSION,
            rotation: Rotation::Deg0,
            flip_horizontal: false,
            flip_vertical: false,
            crop: None,
            aspect_ratio: AspectRatioPreset::Free,
        }
    }
}

impl CliConfig {
    /// Create config from environment variables.
    pub fn from_env() -> CliResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CliResult<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rotation = match var("NAMACUT_ROTATION") {
            Some(v) => {
                let degrees: i32 = v
                    .trim()
                    .parse()
                    .map_err(|_| CliError::config(format!("NAMACUT_ROTATION: {}", v)))?;
                Rotation::try_from(degrees).map_err(CliError::Config)?
            }
            None => defaults.rotation,
        };

        let (flip_horizontal, flip_vertical) = match var("NAMACUT_FLIP") {
            Some(v) => parse_flip(&v)?,
            None => (false, false),
        };

        Ok(Self {
            output_dir: var("NAMACUT_OUTPUT_DIR").map(PathBuf::from),
            home_dir: var("HOME").map(PathBuf::from).unwrap_or(defaults.home_dir),
            container: parse_or(var("NAMACUT_CONTAINER"), defaults.container)?,
            video_codec: parse_or(var("NAMACUT_VIDEO_CODEC"), defaults.video_codec)?,
            quality: parse_or(var("NAMACUT_QUALITY"), defaults.quality)?,
            resolution: parse_or(var("NAMACUT_RESOLUTION"), defaults.resolution)?,
            audio_codec: parse_or(var("NAMACUT_AUDIO_CODEC"), defaults.audio_codec)?,
            audio_bitrate_kbps: var("NAMACUT_AUDIO_BITRATE")
                .and_then(|s| s.trim().trim_end_matches('k').parse().ok())
                .filter(|kbps| *kbps > 0)
                .unwrap_or(defaults.audio_bitrate_kbps),
            audio_only: var("NAMACUT_AUDIO_ONLY")
                .map(|v| AudioOnlyFormat::from_str(&v))
                .transpose()?,
            flac_compression_level: var("NAMACUT_FLAC_LEVEL")
                .and_then(|s| s.trim().parse::<u8>().ok())
                .map(|level| level.min(MAX_FLAC_COMPRESSION))
                .unwrap_or(defaults.flac_compression_level),
            rotation,
            flip_horizontal,
            flip_vertical,
            crop: var("NAMACUT_CROP").map(|v| parse_crop(&v)).transpose()?,
            aspect_ratio: parse_or(var("NAMACUT_ASPECT"), defaults.aspect_ratio)?,
        })
    }

    /// Output settings handed to planning.
    pub fn output_settings(&self) -> OutputSettings {
        OutputSettings {
            kind: match self.audio_only {
                Some(format) => ExportKind::AudioOnly(format),
                None => ExportKind::Video,
            },
            container: self.container,
            video_codec: self.video_codec,
            quality: self.quality,
            audio_codec: self.audio_codec,
            audio_bitrate_kbps: self.audio_bitrate_kbps,
            resolution: self.resolution,
            flac_compression_level: self.flac_compression_level,
        }
    }

    /// Directory the export is written to.
    pub fn output_directory(&self, kind: ExportKind) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => namacut_media::output_directory(Path::new(&self.home_dir), kind),
        }
    }
}

fn parse_or<T>(value: Option<String>, default: T) -> CliResult<T>
where
    T: FromStr,
    CliError: From<T::Err>,
{
    match value {
        Some(v) => Ok(T::from_str(&v)?),
        None => Ok(default),
    }
}

/// `h`, `v`, `hv`/`vh`, or `none`.
fn parse_flip(value: &str) -> CliResult<(bool, bool)> {
    match value.trim().to_lowercase().as_str() {
        "none" => Ok((false, false)),
        "h" | "horizontal" => Ok((true, false)),
        "v" | "vertical" => Ok((false, true)),
        "hv" | "vh" | "both" => Ok((true, true)),
        other => Err(CliError::config(format!("NAMACUT_FLIP: {}", other))),
    }
}

/// `x,y,width,height` in pixels.
fn parse_crop(value: &str) -> CliResult<Rect> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| CliError::config(format!("NAMACUT_CROP: {}", value)))?;

    match parts.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok(Rect::new(*x, *y, *w, *h)),
        _ => Err(CliError::config(format!(
            "NAMACUT_CROP must be x,y,width,height: {}",
            value
        ))),
    }
}
