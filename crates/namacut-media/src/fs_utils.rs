//! Filesystem helpers for export outputs.
//!
//! Outputs are written to a sibling temp file (`name.tmp.ext`) and renamed
//! into place only after the encoder succeeded, so the final path never holds
//! a partial file.

use std::path::{Path, PathBuf};
use tokio::fs;

use namacut_models::{ExportKind, OutputSettings};

use crate::error::MediaResult;

/// Characters replaced in suggested file names.
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Output folder name under the user's Videos/Music directory.
pub const OUTPUT_FOLDER: &str = "NamaCut_Output";

/// Sibling temp path: `clip.mp4` -> `clip.tmp.mp4` (same directory, same
/// extension, so the final rename never crosses filesystems).
pub fn temp_output_path(output: &Path, marker: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{}.{}.{}", stem, marker, ext.to_string_lossy()),
        None => format!("{}.{}", stem, marker),
    };
    output.with_file_name(name)
}

/// Flush `temp` to disk, rename it over `output`, then flush the directory.
///
/// The directory sync is best effort; not every platform can open a
/// directory for syncing.
pub async fn commit_atomic(temp: &Path, output: &Path) -> MediaResult<()> {
    let file = fs::OpenOptions::new().write(true).open(temp).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(temp, output).await?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        match fs::File::open(parent).await {
            Ok(dir) => {
                if let Err(e) = dir.sync_all().await {
                    tracing::debug!("Directory sync not supported for {}: {}", parent.display(), e);
                }
            }
            Err(e) => tracing::debug!("Could not open {} for sync: {}", parent.display(), e),
        }
    }

    Ok(())
}

/// Remove a file if it exists; returns whether something was removed.
pub async fn remove_if_exists(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// Remove an existing final output smaller than `min_bytes`.
///
/// Such files are treated as debris from an earlier failed run. Larger files
/// are left alone.
pub async fn remove_debris(output: &Path, min_bytes: u64) -> bool {
    match fs::metadata(output).await {
        Ok(meta) if meta.is_file() && meta.len() < min_bytes => {
            tracing::info!(
                "Removing undersized output {} ({} bytes)",
                output.display(),
                meta.len()
            );
            remove_if_exists(output).await
        }
        _ => false,
    }
}

/// Replace characters that are invalid in file names with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if INVALID_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Base name (no extension) for an export of `stem` with `settings`.
///
/// - video, original container: `clip.original`
/// - video: `clip.1080p.h264`
/// - audio: `clip.192`, `clip.L5` (FLAC), `clip.lossless` (WAV)
pub fn suggest_base_name(stem: &str, settings: &OutputSettings) -> String {
    use namacut_models::{AudioOnlyFormat, Container};

    let suffix = match settings.kind {
        ExportKind::AudioOnly(AudioOnlyFormat::Flac) => {
            format!("L{}", settings.flac_compression_level)
        }
        ExportKind::AudioOnly(AudioOnlyFormat::Wav) => "lossless".to_string(),
        ExportKind::AudioOnly(_) => settings.audio_bitrate_kbps.to_string(),
        ExportKind::Video if settings.container == Container::Original => "original".to_string(),
        ExportKind::Video => format!("{}.{}", settings.resolution, settings.video_codec),
    };
    sanitize_filename(&format!("{}.{}", stem, suffix))
}

/// Default output directory under `home` for the export kind.
pub fn output_directory(home: &Path, kind: ExportKind) -> PathBuf {
    match kind {
        ExportKind::AudioOnly(_) => home.join("Music").join(OUTPUT_FOLDER),
        ExportKind::Video => home.join("Videos").join(OUTPUT_FOLDER),
    }
}

/// First free path among `dir/base.ext`, `dir/base(1).ext`, `dir/base(2).ext`, ...
pub fn unique_output_path(dir: &Path, base_name: &str, extension: &str) -> PathBuf {
    let extension = extension.trim_start_matches('.');
    let file_name = |suffix: &str| {
        if extension.is_empty() {
            format!("{}{}", base_name, suffix)
        } else {
            format!("{}{}.{}", base_name, suffix, extension)
        }
    };

    let candidate = dir.join(file_name(""));
    if !candidate.exists() {
        return candidate;
    }

    let mut i: u32 = 1;
    loop {
        let candidate = dir.join(file_name(&format!("({})", i)));
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}
