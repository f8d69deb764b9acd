//! Codec, quality, and container argument selection.
//!
//! Everything is driven by two tables: [`CONTAINER_RULES`] (legal codecs and
//! flags per container) and [`AUTO_CRF`] (default quality per codec and
//! resolution). Illegal requests are substituted with a [`Warning`], never
//! silently.

use std::str::FromStr;

use namacut_models::{
    AudioCodec, AudioOnlyFormat, Container, ExportKind, OutputSettings, QualityMode,
    ResolutionPreset, VideoCodec, Warning,
};

use crate::error::{MediaError, MediaResult};

use namacut_models::AudioCodec as A;
use namacut_models::VideoCodec as V;

/// Legal codecs and flags for one container. Codec lists are in order of
/// preference; the first audio codec is the container default.
#[derive(Debug)]
pub struct ContainerRule {
    pub container: Container,
    pub video: &'static [VideoCodec],
    pub audio: &'static [AudioCodec],
    /// Move the index to the front for progressive playback
    pub faststart: bool,
}

pub const CONTAINER_RULES: &[ContainerRule] = &[
    ContainerRule {
        container: Container::Mp4,
        video: &[V::H264, V::H265, V::Av1, V::Vp9],
        audio: &[A::Aac, A::Mp3, A::Ac3, A::Opus, A::Copy],
        faststart: true,
    },
    ContainerRule {
        container: Container::Mkv,
        video: &[V::H264, V::H265, V::Vp9, V::Av1, V::Mpeg2],
        audio: &[A::Aac, A::Mp3, A::Ac3, A::Opus, A::Wma, A::Copy],
        faststart: false,
    },
    ContainerRule {
        container: Container::Webm,
        video: &[V::Vp9, V::Av1],
        audio: &[A::Opus],
        faststart: false,
    },
    ContainerRule {
        container: Container::Avi,
        video: &[V::H264, V::Mpeg2],
        audio: &[A::Mp3, A::Ac3, A::Aac, A::Copy],
        faststart: false,
    },
    ContainerRule {
        container: Container::Mov,
        video: &[V::H264],
        audio: &[A::Aac, A::Mp3, A::Ac3, A::Copy],
        faststart: true,
    },
    ContainerRule {
        container: Container::Wmv,
        video: &[V::H264],
        audio: &[A::Wma],
        faststart: false,
    },
    ContainerRule {
        container: Container::Flv,
        video: &[V::H264],
        audio: &[A::Aac, A::Mp3],
        faststart: false,
    },
    ContainerRule {
        container: Container::Mpeg,
        video: &[V::Mpeg2, V::H264],
        audio: &[A::Mp3, A::Ac3],
        faststart: false,
    },
    ContainerRule {
        container: Container::Ts,
        video: &[V::H264, V::H265, V::Mpeg2],
        audio: &[A::Aac, A::Mp3, A::Ac3, A::Opus, A::Copy],
        faststart: false,
    },
];

/// Auto CRF per codec, indexed by resolution:
/// `[original, 4k, 2k, 1080p, 720p, 480p]`.
pub const AUTO_CRF: &[(VideoCodec, [u8; 6])] = &[
    (V::H264, [23, 18, 20, 23, 23, 23]),
    (V::H265, [26, 22, 24, 26, 26, 26]),
    (V::Vp9, [30, 25, 28, 30, 30, 30]),
    (V::Av1, [30, 25, 28, 30, 32, 35]),
];

/// MPEG-2 has no CRF; it uses a fixed quantizer scale instead.
const MPEG2_AUTO_QSCALE: u8 = 5;
const MPEG2_QSCALE_RANGE: (u8, u8) = (1, 31);

/// Parameters of the re-encode used when the source container is kept but
/// pixels change.
const ORIGINAL_REENCODE_CRF: u8 = 18;
const ORIGINAL_REENCODE_AUDIO_KBPS: u32 = 192;

/// Nearest replacements for each codec, closest first.
fn substitution_order(codec: VideoCodec) -> &'static [VideoCodec] {
    match codec {
        V::H264 => &[V::H265, V::Mpeg2, V::Vp9, V::Av1],
        V::H265 => &[V::H264, V::Av1, V::Vp9, V::Mpeg2],
        V::Vp9 => &[V::Av1, V::H265, V::H264, V::Mpeg2],
        V::Av1 => &[V::Vp9, V::H265, V::H264, V::Mpeg2],
        V::Mpeg2 => &[V::H264, V::H265, V::Vp9, V::Av1],
    }
}

pub fn rule_for(container: Container) -> Option<&'static ContainerRule> {
    CONTAINER_RULES.iter().find(|rule| rule.container == container)
}

/// Default quality factor for `codec` at `resolution`; `None` for MPEG-2.
pub fn auto_crf(codec: VideoCodec, resolution: ResolutionPreset) -> Option<u8> {
    let index = match resolution {
        ResolutionPreset::Original => 0,
        ResolutionPreset::Uhd4k => 1,
        ResolutionPreset::Qhd2k => 2,
        ResolutionPreset::Fhd1080 => 3,
        ResolutionPreset::Hd720 => 4,
        ResolutionPreset::Sd480 => 5,
    };
    AUTO_CRF
        .iter()
        .find(|(c, _)| *c == codec)
        .map(|(_, row)| row[index])
}

/// Video side of an encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoStream {
    Copy,
    Encode { codec: VideoCodec, args: Vec<String> },
    /// Audio-only export
    Disabled,
}

/// Audio side of an encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioStream {
    Copy,
    Encode { encoder: &'static str, args: Vec<String> },
}

/// Codec and container arguments for one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecSpec {
    pub container: Container,
    pub video: VideoStream,
    pub audio: AudioStream,
    pub container_args: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl CodecSpec {
    /// Both streams copied bit-for-bit.
    pub fn is_stream_copy(&self) -> bool {
        self.video == VideoStream::Copy && self.audio == AudioStream::Copy
    }

    pub fn is_audio_only(&self) -> bool {
        self.video == VideoStream::Disabled
    }

    /// Encoder arguments placed after the input (and after any `-vf`).
    pub fn output_args(&self) -> Vec<String> {
        if self.is_stream_copy() {
            let mut args = vec!["-c".to_string(), "copy".to_string()];
            args.extend(self.container_args.iter().cloned());
            return args;
        }

        let mut args = Vec::new();
        match &self.video {
            VideoStream::Copy => args.extend(["-c:v".to_string(), "copy".to_string()]),
            VideoStream::Encode { args: video, .. } => args.extend(video.iter().cloned()),
            VideoStream::Disabled => args.push("-vn".to_string()),
        }
        match &self.audio {
            AudioStream::Copy => args.extend(["-c:a".to_string(), "copy".to_string()]),
            AudioStream::Encode { args: audio, .. } => args.extend(audio.iter().cloned()),
        }
        args.extend(self.container_args.iter().cloned());
        args
    }
}

/// Facts about the job that influence codec choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecContext {
    /// A filter chain exists, so video must be re-encoded
    pub has_filters: bool,
    /// Source uses a VC-1/WMV family codec
    pub legacy_source: bool,
    /// Container of the source file, used when the output keeps it
    pub source_container: Option<Container>,
}

/// Table lookup keyed by `(container, codec)`.
///
/// Unknown container tags are the only hard error.
pub fn select_codec_parameters(
    container_tag: &str,
    codec: VideoCodec,
    quality: QualityMode,
) -> MediaResult<CodecSpec> {
    let container = Container::from_str(container_tag)
        .map_err(|e| MediaError::unsupported(e.to_string()))?;
    let settings = OutputSettings {
        container,
        video_codec: codec,
        quality,
        ..Default::default()
    };
    codec_spec(&settings, CodecContext::default())
}

/// Full codec selection for `settings`.
pub fn codec_spec(settings: &OutputSettings, context: CodecContext) -> MediaResult<CodecSpec> {
    if let ExportKind::AudioOnly(format) = settings.kind {
        return Ok(audio_only_spec(
            format,
            settings.audio_bitrate_kbps,
            settings.flac_compression_level,
        ));
    }

    if settings.container == Container::Original {
        return Ok(original_container_spec(context));
    }

    let rule = rule_for(settings.container).ok_or_else(|| {
        MediaError::unsupported(format!("no codec table for container {}", settings.container))
    })?;

    let mut warnings = Vec::new();

    let codec = if rule.video.contains(&settings.video_codec) {
        settings.video_codec
    } else {
        let substitute = substitution_order(settings.video_codec)
            .iter()
            .copied()
            .find(|candidate| rule.video.contains(candidate))
            .ok_or_else(|| {
                MediaError::unsupported(format!(
                    "{} has no codec compatible with {}",
                    settings.container, settings.video_codec
                ))
            })?;
        warnings.push(Warning::CodecSubstituted {
            container: settings.container,
            requested: settings.video_codec,
            substituted: substitute,
        });
        substitute
    };

    let mut video_args = vec!["-c:v".to_string(), codec.encoder().to_string()];
    video_args.extend(quality_args(codec, settings.quality, settings.resolution, &mut warnings));
    if codec == V::H265 && rule.faststart {
        video_args.extend(["-tag:v".to_string(), "hvc1".to_string()]);
    }
    if codec.is_avc_family() {
        video_args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
    }

    let audio_codec = if rule.audio.contains(&settings.audio_codec) {
        settings.audio_codec
    } else {
        let substitute = rule.audio[0];
        warnings.push(Warning::AudioCodecSubstituted {
            container: settings.container,
            requested: settings.audio_codec,
            substituted: substitute,
        });
        substitute
    };

    let mut container_args = Vec::new();
    if rule.faststart {
        container_args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }
    if context.legacy_source {
        container_args.extend(["-strict".to_string(), "-2".to_string()]);
    }

    Ok(CodecSpec {
        container: settings.container,
        video: VideoStream::Encode {
            codec,
            args: video_args,
        },
        audio: audio_stream(audio_codec, settings.audio_bitrate_kbps),
        container_args,
        warnings,
    })
}

fn quality_args(
    codec: VideoCodec,
    quality: QualityMode,
    resolution: ResolutionPreset,
    warnings: &mut Vec<Warning>,
) -> Vec<String> {
    let mut args = Vec::new();
    match codec {
        V::H264 | V::H265 => args.extend(["-preset".to_string(), "medium".to_string()]),
        V::Av1 => args.extend(["-preset".to_string(), "8".to_string()]),
        V::Vp9 | V::Mpeg2 => {}
    }

    if codec == V::Mpeg2 {
        match quality {
            QualityMode::Bitrate(kbps) if kbps > 0 => {
                args.extend(["-b:v".to_string(), format!("{}k", kbps)]);
            }
            QualityMode::Crf(value) => {
                let (lo, hi) = MPEG2_QSCALE_RANGE;
                let clamped = clamp_quality(value, lo, hi, warnings);
                args.extend(["-q:v".to_string(), clamped.to_string()]);
            }
            _ => args.extend(["-q:v".to_string(), MPEG2_AUTO_QSCALE.to_string()]),
        }
        return args;
    }

    let crf = match quality {
        QualityMode::Bitrate(kbps) if kbps > 0 => {
            args.extend(["-b:v".to_string(), format!("{}k", kbps)]);
            return args;
        }
        QualityMode::Crf(value) => clamp_quality(value, 0, codec.max_crf(), warnings),
        QualityMode::Bitrate(_) | QualityMode::Auto => {
            auto_crf(codec, resolution).unwrap_or(ORIGINAL_REENCODE_CRF)
        }
    };

    args.extend(["-crf".to_string(), crf.to_string()]);
    if codec == V::Vp9 {
        // Constant-quality mode in libvpx needs an unconstrained bitrate
        args.extend(["-b:v".to_string(), "0".to_string()]);
    }
    args
}

fn clamp_quality(value: u8, lo: u8, hi: u8, warnings: &mut Vec<Warning>) -> u8 {
    let clamped = value.clamp(lo, hi);
    if clamped != value {
        warnings.push(Warning::QualityClamped {
            requested: value,
            clamped,
        });
    }
    clamped
}

fn audio_stream(codec: AudioCodec, bitrate_kbps: u32) -> AudioStream {
    if codec == A::Copy {
        return AudioStream::Copy;
    }
    AudioStream::Encode {
        encoder: codec.encoder(),
        args: vec![
            "-c:a".to_string(),
            codec.encoder().to_string(),
            "-b:a".to_string(),
            format!("{}k", bitrate_kbps.max(1)),
            "-ac".to_string(),
            "2".to_string(),
            "-ar".to_string(),
            "48000".to_string(),
        ],
    }
}

/// Stream copy when nothing changes; otherwise a fast H.264 + AAC
/// re-encode, with each codec substituted when the source container cannot
/// carry it.
fn original_container_spec(context: CodecContext) -> CodecSpec {
    if !context.has_filters && !context.legacy_source {
        return CodecSpec {
            container: Container::Original,
            video: VideoStream::Copy,
            audio: AudioStream::Copy,
            container_args: Vec::new(),
            warnings: Vec::new(),
        };
    }

    let reason = if context.legacy_source {
        "legacy source codec"
    } else {
        "video filters applied"
    };
    let mut warnings = vec![Warning::ReencodeRequired {
        reason: reason.to_string(),
    }];
    let rule = context.source_container.and_then(rule_for);

    let codec = match rule {
        Some(rule) if !rule.video.contains(&V::H264) => {
            let substitute = substitution_order(V::H264)
                .iter()
                .copied()
                .find(|candidate| rule.video.contains(candidate))
                .unwrap_or(rule.video[0]);
            warnings.push(Warning::CodecSubstituted {
                container: rule.container,
                requested: V::H264,
                substituted: substitute,
            });
            substitute
        }
        _ => V::H264,
    };

    let mut video_args = vec!["-c:v".to_string(), codec.encoder().to_string()];
    if codec == V::H264 {
        video_args.extend([
            "-preset".to_string(),
            "fast".to_string(),
            "-crf".to_string(),
            ORIGINAL_REENCODE_CRF.to_string(),
        ]);
    } else {
        video_args.extend(quality_args(
            codec,
            QualityMode::Auto,
            ResolutionPreset::Original,
            &mut warnings,
        ));
    }

    let audio_codec = match rule {
        Some(rule) if !rule.audio.contains(&A::Aac) => {
            warnings.push(Warning::AudioCodecSubstituted {
                container: rule.container,
                requested: A::Aac,
                substituted: rule.audio[0],
            });
            rule.audio[0]
        }
        _ => A::Aac,
    };

    let mut container_args = vec!["-pix_fmt".to_string(), "yuv420p".to_string()];
    if context.legacy_source {
        container_args.extend(["-strict".to_string(), "-2".to_string()]);
    }

    CodecSpec {
        container: Container::Original,
        video: VideoStream::Encode {
            codec,
            args: video_args,
        },
        audio: audio_stream(audio_codec, ORIGINAL_REENCODE_AUDIO_KBPS),
        container_args,
        warnings,
    }
}

fn audio_only_spec(format: AudioOnlyFormat, bitrate_kbps: u32, flac_level: u8) -> CodecSpec {
    let mut args = vec!["-c:a".to_string(), format.encoder().to_string()];
    let mut warnings = Vec::new();
    match format {
        AudioOnlyFormat::Mp3 | AudioOnlyFormat::Aac => {
            args.extend(["-b:a".to_string(), format!("{}k", bitrate_kbps.max(1))]);
        }
        AudioOnlyFormat::Flac => {
            let level = clamp_quality(
                flac_level,
                0,
                namacut_models::settings::MAX_FLAC_COMPRESSION,
                &mut warnings,
            );
            args.extend(["-compression_level".to_string(), level.to_string()]);
        }
        AudioOnlyFormat::Wav => {}
    }
    args.extend([
        "-ac".to_string(),
        "2".to_string(),
        "-ar".to_string(),
        "48000".to_string(),
    ]);

    CodecSpec {
        container: Container::Original,
        video: VideoStream::Disabled,
        audio: AudioStream::Encode {
            encoder: format.encoder(),
            args,
        },
        container_args: Vec::new(),
        warnings,
    }
}
