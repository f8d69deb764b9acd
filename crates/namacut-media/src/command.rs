//! FFmpeg command builder.

use std::path::{Path, PathBuf};

use namacut_models::TimeRange;

use crate::codec::CodecSpec;
use crate::error::{MediaError, MediaResult};
use crate::filters::FilterChain;

/// Seconds to seek short of the cut point before decoding for an accurate cut.
pub const ACCURATE_SEEK_MARGIN_SECS: f64 = 1.0;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level; must stay at `info` or above for `time=` stats lines
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "info".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Fast demuxer-level seek (before input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Decoding seek (after input), frame accurate.
    pub fn output_seek(self, seconds: f64) -> Self {
        self.output_arg("-ss").output_arg(format!("{:.3}", seconds))
    }

    /// Limit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-hide_banner".to_string()];

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());
        args.push("-stats".to_string());

        args.extend(self.input_args.iter().cloned());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Build the export command writing to `output` (the temp path).
///
/// Stream copies seek on the demuxer only. Re-encodes seek to
/// [`ACCURATE_SEEK_MARGIN_SECS`] before the cut and then decode up to it,
/// so the first frame is exact.
pub fn build_export_command(
    input: &Path,
    output: &Path,
    range: TimeRange,
    filter_chain: Option<&FilterChain>,
    codec: &CodecSpec,
) -> MediaResult<FfmpegCommand> {
    if filter_chain.is_some() && codec.is_stream_copy() {
        return Err(MediaError::unsupported(
            "stream copy cannot carry a filter chain",
        ));
    }

    let mut cmd = FfmpegCommand::new(input, output);

    if codec.is_stream_copy() {
        if range.start_secs > 0.0 {
            cmd = cmd.seek(range.start_secs);
        }
    } else {
        let coarse = (range.start_secs - ACCURATE_SEEK_MARGIN_SECS).max(0.0);
        let fine = range.start_secs - coarse;
        if coarse > 0.0 {
            cmd = cmd.seek(coarse);
        }
        if fine > 0.0 {
            cmd = cmd.output_seek(fine);
        }
    }

    cmd = cmd.duration(range.duration());

    if let Some(chain) = filter_chain {
        cmd = cmd.video_filter(chain.to_filter_string());
    }

    Ok(cmd.output_args(codec.output_args()))
}

/// Resolve the encoder binary.
pub fn check_ffmpeg(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::FfmpegNotFound)
}

/// Resolve the probe binary.
pub fn check_ffprobe(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::FfprobeNotFound)
}
