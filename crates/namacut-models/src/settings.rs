//! Output settings supplied by the caller at export time.
//!
//! `OutputSettings` is a plain value: it is copied into the export plan when
//! an export starts and never read from ambient state afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default audio bitrate in kbps.
pub const DEFAULT_AUDIO_BITRATE_KBPS: u32 = 192;
/// Default FLAC compression level.
pub const DEFAULT_FLAC_COMPRESSION: u8 = 5;
/// Highest FLAC compression level accepted by the encoder.
pub const MAX_FLAC_COMPRESSION: u8 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct SettingsParseError {
    pub kind: &'static str,
    pub value: String,
}

impl SettingsParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Target container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    /// Keep the source container (stream copy when nothing else changes).
    Original,
    #[default]
    Mp4,
    Mkv,
    Webm,
    Avi,
    Mov,
    Wmv,
    Flv,
    Mpeg,
    Ts,
}

impl Container {
    pub const ALL: &'static [Container] = &[
        Container::Original,
        Container::Mp4,
        Container::Mkv,
        Container::Webm,
        Container::Avi,
        Container::Mov,
        Container::Wmv,
        Container::Flv,
        Container::Mpeg,
        Container::Ts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Container::Original => "original",
            Container::Mp4 => "mp4",
            Container::Mkv => "mkv",
            Container::Webm => "webm",
            Container::Avi => "avi",
            Container::Mov => "mov",
            Container::Wmv => "wmv",
            Container::Flv => "flv",
            Container::Mpeg => "mpeg",
            Container::Ts => "ts",
        }
    }

    /// File extension, `None` for `Original` (taken from the source file).
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Container::Original => None,
            other => Some(other.as_str()),
        }
    }

    /// Containers whose muxers/filters misbehave with long filter chains.
    pub fn has_filter_limitations(&self) -> bool {
        matches!(
            self,
            Container::Avi | Container::Wmv | Container::Flv | Container::Mpeg
        )
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Container {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "original" | "source" => Ok(Container::Original),
            "mp4" | "m4v" => Ok(Container::Mp4),
            "mkv" | "matroska" => Ok(Container::Mkv),
            "webm" => Ok(Container::Webm),
            "avi" => Ok(Container::Avi),
            "mov" => Ok(Container::Mov),
            "wmv" => Ok(Container::Wmv),
            "flv" => Ok(Container::Flv),
            "mpeg" | "mpg" => Ok(Container::Mpeg),
            "ts" | "mpegts" => Ok(Container::Ts),
            _ => Err(SettingsParseError::new("container", s)),
        }
    }
}

/// Video codec choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
    Vp9,
    Av1,
    Mpeg2,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
            VideoCodec::Vp9 => "vp9",
            VideoCodec::Av1 => "av1",
            VideoCodec::Mpeg2 => "mpeg2",
        }
    }

    /// Encoder name passed to `-c:v`.
    pub fn encoder(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::H265 => "libx265",
            VideoCodec::Vp9 => "libvpx-vp9",
            VideoCodec::Av1 => "libsvtav1",
            VideoCodec::Mpeg2 => "mpeg2video",
        }
    }

    /// Upper bound of the constant-quality scale (lower = better).
    pub fn max_crf(&self) -> u8 {
        match self {
            VideoCodec::Vp9 | VideoCodec::Av1 => 63,
            VideoCodec::H264 | VideoCodec::H265 | VideoCodec::Mpeg2 => 51,
        }
    }

    /// H.264/H.265 family, which needs a 4:2:0 pixel format for playback.
    pub fn is_avc_family(&self) -> bool {
        matches!(self, VideoCodec::H264 | VideoCodec::H265)
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoCodec {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "h264" | "h.264" | "avc" | "libx264" => Ok(VideoCodec::H264),
            "h265" | "h.265" | "hevc" | "libx265" => Ok(VideoCodec::H265),
            "vp9" | "libvpx-vp9" => Ok(VideoCodec::Vp9),
            "av1" | "libsvtav1" => Ok(VideoCodec::Av1),
            "mpeg2" | "mpeg-2" | "mpeg2video" => Ok(VideoCodec::Mpeg2),
            _ => Err(SettingsParseError::new("video codec", s)),
        }
    }
}

/// Audio codec for video exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    #[default]
    Aac,
    Mp3,
    Ac3,
    Opus,
    Wma,
    /// Copy the source audio stream untouched.
    Copy,
}

impl AudioCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Ac3 => "ac3",
            AudioCodec::Opus => "opus",
            AudioCodec::Wma => "wma",
            AudioCodec::Copy => "copy",
        }
    }

    /// Encoder name passed to `-c:a`.
    pub fn encoder(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Mp3 => "libmp3lame",
            AudioCodec::Ac3 => "ac3",
            AudioCodec::Opus => "libopus",
            AudioCodec::Wma => "wmav2",
            AudioCodec::Copy => "copy",
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AudioCodec {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aac" => Ok(AudioCodec::Aac),
            "mp3" | "libmp3lame" => Ok(AudioCodec::Mp3),
            "ac3" => Ok(AudioCodec::Ac3),
            "opus" | "libopus" => Ok(AudioCodec::Opus),
            "wma" | "wmav2" => Ok(AudioCodec::Wma),
            "copy" => Ok(AudioCodec::Copy),
            _ => Err(SettingsParseError::new("audio codec", s)),
        }
    }
}

/// Video quality mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum QualityMode {
    /// Per-codec, per-resolution default quality factor.
    #[default]
    Auto,
    /// Constant-quality factor; lower is better.
    Crf(u8),
    /// Fixed video bitrate in kbps.
    Bitrate(u32),
}

impl fmt::Display for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityMode::Auto => write!(f, "auto"),
            QualityMode::Crf(crf) => write!(f, "crf{}", crf),
            QualityMode::Bitrate(kbps) => write!(f, "{}k", kbps),
        }
    }
}

impl FromStr for QualityMode {
    type Err = SettingsParseError;

    /// Accepts `auto`, `crf23`, `crf:23`, a bare number (CRF), or `4000k`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        if value == "auto" {
            return Ok(QualityMode::Auto);
        }
        if let Some(kbps) = value.strip_suffix('k') {
            return kbps
                .parse()
                .map(QualityMode::Bitrate)
                .map_err(|_| SettingsParseError::new("quality mode", s));
        }
        let crf = value
            .strip_prefix("crf")
            .map(|rest| rest.trim_start_matches(':'))
            .unwrap_or(value.as_str());
        crf.parse()
            .map(QualityMode::Crf)
            .map_err(|_| SettingsParseError::new("quality mode", s))
    }
}

/// Target resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPreset {
    #[default]
    Original,
    Uhd4k,
    Qhd2k,
    Fhd1080,
    Hd720,
    Sd480,
}

impl ResolutionPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionPreset::Original => "original",
            ResolutionPreset::Uhd4k => "4k",
            ResolutionPreset::Qhd2k => "2k",
            ResolutionPreset::Fhd1080 => "1080p",
            ResolutionPreset::Hd720 => "720p",
            ResolutionPreset::Sd480 => "480p",
        }
    }

    /// Landscape target box, `None` for `Original`.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            ResolutionPreset::Original => None,
            ResolutionPreset::Uhd4k => Some((3840, 2160)),
            ResolutionPreset::Qhd2k => Some((2560, 1440)),
            ResolutionPreset::Fhd1080 => Some((1920, 1080)),
            ResolutionPreset::Hd720 => Some((1280, 720)),
            ResolutionPreset::Sd480 => Some((854, 480)),
        }
    }
}

impl fmt::Display for ResolutionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResolutionPreset {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "original" | "source" => Ok(ResolutionPreset::Original),
            "4k" | "2160p" | "uhd" => Ok(ResolutionPreset::Uhd4k),
            "2k" | "1440p" | "qhd" => Ok(ResolutionPreset::Qhd2k),
            "1080p" | "1080" | "fhd" => Ok(ResolutionPreset::Fhd1080),
            "720p" | "720" | "hd" => Ok(ResolutionPreset::Hd720),
            "480p" | "480" | "sd" => Ok(ResolutionPreset::Sd480),
            _ => Err(SettingsParseError::new("resolution preset", s)),
        }
    }
}

/// Format for audio-only exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioOnlyFormat {
    #[default]
    Mp3,
    Aac,
    Flac,
    Wav,
}

impl AudioOnlyFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioOnlyFormat::Mp3 => "mp3",
            AudioOnlyFormat::Aac => "aac",
            AudioOnlyFormat::Flac => "flac",
            AudioOnlyFormat::Wav => "wav",
        }
    }

    pub fn encoder(&self) -> &'static str {
        match self {
            AudioOnlyFormat::Mp3 => "libmp3lame",
            AudioOnlyFormat::Aac => "aac",
            AudioOnlyFormat::Flac => "flac",
            AudioOnlyFormat::Wav => "pcm_s16le",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioOnlyFormat::Mp3 => "mp3",
            AudioOnlyFormat::Aac => "m4a",
            AudioOnlyFormat::Flac => "flac",
            AudioOnlyFormat::Wav => "wav",
        }
    }

    /// Lossy formats take a bitrate; FLAC takes a compression level.
    pub fn uses_bitrate(&self) -> bool {
        matches!(self, AudioOnlyFormat::Mp3 | AudioOnlyFormat::Aac)
    }
}

impl fmt::Display for AudioOnlyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AudioOnlyFormat {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(AudioOnlyFormat::Mp3),
            "aac" | "m4a" => Ok(AudioOnlyFormat::Aac),
            "flac" => Ok(AudioOnlyFormat::Flac),
            "wav" | "pcm" => Ok(AudioOnlyFormat::Wav),
            _ => Err(SettingsParseError::new("audio format", s)),
        }
    }
}

/// Whether an export produces video or audio only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "format", rename_all = "snake_case")]
pub enum ExportKind {
    #[default]
    Video,
    AudioOnly(AudioOnlyFormat),
}

/// Settings for one export invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputSettings {
    pub kind: ExportKind,
    pub container: Container,
    pub video_codec: VideoCodec,
    pub quality: QualityMode,
    pub audio_codec: AudioCodec,
    pub audio_bitrate_kbps: u32,
    pub resolution: ResolutionPreset,
    pub flac_compression_level: u8,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            kind: ExportKind::Video,
            container: Container::Mp4,
            video_codec: VideoCodec::H264,
            quality: QualityMode::Auto,
            audio_codec: AudioCodec::Aac,
            audio_bitrate_kbps: DEFAULT_AUDIO_BITRATE_KBPS,
            resolution: ResolutionPreset::Original,
            flac_compression_level: DEFAULT_FLAC_COMPRESSION,
        }
    }
}

impl OutputSettings {
    /// Settings that keep the source container and copy streams when possible.
    pub fn original() -> Self {
        Self {
            container: Container::Original,
            ..Default::default()
        }
    }

    /// Settings for an audio-only export.
    pub fn audio_only(format: AudioOnlyFormat) -> Self {
        Self {
            kind: ExportKind::AudioOnly(format),
            ..Default::default()
        }
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    pub fn with_video_codec(mut self, codec: VideoCodec) -> Self {
        self.video_codec = codec;
        self
    }

    pub fn with_quality(mut self, quality: QualityMode) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_resolution(mut self, resolution: ResolutionPreset) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self.kind, ExportKind::AudioOnly(_))
    }

    /// Output file extension; `source_extension` is used for `Original`.
    pub fn output_extension(&self, source_extension: &str) -> String {
        match self.kind {
            ExportKind::AudioOnly(format) => format.extension().to_string(),
            ExportKind::Video => self
                .container
                .extension()
                .map(str::to_string)
                .unwrap_or_else(|| {
                    let ext = source_extension.trim_start_matches('.');
                    if ext.is_empty() {
                        "mp4".to_string()
                    } else {
                        ext.to_lowercase()
                    }
                }),
        }
    }
}
