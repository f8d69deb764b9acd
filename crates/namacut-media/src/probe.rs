//! FFprobe source inspection.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use namacut_models::SourceMedia;

use crate::error::{MediaError, MediaResult};

/// Extensions accepted as video input (lowercase, without the dot).
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "avi", "mov", "wmv", "flv", "m4v", "3gp", "mpg", "mpeg", "ts", "mts",
    "m2ts", "ogv", "qt", "rm", "rmvb", "asf", "vob",
];

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Whether `path` carries a known video extension.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Probe a source file with the given ffprobe program.
pub async fn probe_media(program: &str, path: impl AsRef<Path>) -> MediaResult<SourceMedia> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(MediaError::input_error(path, "file not found"));
    }
    if !is_video_file(path) {
        return Err(MediaError::input_error(path, "not a recognized video file"));
    }

    which::which(program).map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new(program)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::input_error(
            path,
            format!("ffprobe failed: {}", stderr.trim()),
        ));
    }

    parse_probe_output(path, &output.stdout)
}

/// Turn ffprobe JSON into a [`SourceMedia`].
fn parse_probe_output(path: &Path, stdout: &[u8]) -> MediaResult<SourceMedia> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::input_error(path, format!("unreadable probe output: {}", e)))?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::input_error(path, "no video stream found"))?;

    let (width, height) = match (video_stream.width, video_stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(MediaError::input_error(path, "video stream has no dimensions")),
    };

    // Container duration first, stream duration as fallback
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video_stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::input_error(path, "could not determine duration"))?;

    let mut source = SourceMedia::new(path, duration, width, height);
    if let Some(codec) = &video_stream.codec_name {
        source = source.with_video_codec(codec.clone());
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"codec_type": "audio", "codec_name": "aac"},
            {"codec_type": "video", "codec_name": "wmv3", "width": 1280, "height": 720, "duration": "9.5"}
        ],
        "format": {"duration": "10.010000"}
    }"#;

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("clip.MP4")));
        assert!(is_video_file(Path::new("/a/b/movie.m2ts")));
        assert!(!is_video_file(Path::new("song.mp3")));
        assert!(!is_video_file(Path::new("noext")));
    }

    #[test]
    fn test_parse_probe_output() {
        let source = parse_probe_output(Path::new("in.wmv"), SAMPLE.as_bytes()).unwrap();
        assert_eq!(source.width, 1280);
        assert_eq!(source.height, 720);
        assert!((source.duration_seconds - 10.01).abs() < 1e-9);
        assert_eq!(source.video_codec.as_deref(), Some("wmv3"));
        assert!(source.is_legacy_codec());
    }

    #[test]
    fn test_parse_probe_stream_duration_fallback() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 480, "duration": "3.5"}], "format": {}}"#;
        let source = parse_probe_output(Path::new("in.mp4"), json.as_bytes()).unwrap();
        assert_eq!(source.duration_seconds, 3.5);
        assert_eq!(source.video_codec, None);
    }

    #[test]
    fn test_parse_probe_rejects_audio_only() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "mp3"}], "format": {"duration": "3.0"}}"#;
        let err = parse_probe_output(Path::new("in.mp4"), json.as_bytes()).unwrap_err();
        assert!(matches!(err, MediaError::InputError { .. }));
    }

    #[test]
    fn test_parse_probe_rejects_garbage() {
        let err = parse_probe_output(Path::new("in.mp4"), b"not json").unwrap_err();
        assert!(err.is_rejected_before_spawn());
    }

    #[test]
    fn test_probe_rejects_before_running_ffprobe() {
        let err = tokio_test::block_on(probe_media("ffprobe", "/nonexistent/clip.mp4")).unwrap_err();
        assert!(matches!(err, MediaError::InputError { .. }));

        let dir = tempfile::TempDir::new().unwrap();
        let song = dir.path().join("song.mp3");
        std::fs::write(&song, b"ID3").unwrap();
        let err = tokio_test::block_on(probe_media("ffprobe", &song)).unwrap_err();
        assert!(err.to_string().contains("not a recognized video file"));
    }
}
