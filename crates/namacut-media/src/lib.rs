#![deny(unreachable_patterns)]
//! Crop geometry, filter synthesis, and FFmpeg export supervision.
//!
//! This crate provides:
//! - Display/source coordinate mapping for crop selections (`geometry`)
//! - FFmpeg filter chains and codec/container argument tables (`filters`, `codec`)
//! - Type-safe FFmpeg command building (`command`)
//! - A single-slot export manager with progress, atomic commit, and abort (`export`)

pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod export;
pub mod filters;
pub mod fs_utils;
pub mod geometry;
pub mod logging;
pub mod plan;
pub mod probe;
pub mod progress;

pub use codec::{codec_spec, select_codec_parameters, AudioStream, CodecContext, CodecSpec, VideoStream};
pub use command::{build_export_command, check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use config::ExportConfig;
pub use error::{MediaError, MediaResult};
pub use export::{completion_result, ExportManager, ExportRequest, JobHandle};
pub use filters::{build_filter_chain, simplify_for_container, FilterChain, FilterOp, Transpose};
pub use fs_utils::{output_directory, suggest_base_name, unique_output_path};
pub use geometry::{
    apply_aspect_ratio, compute_padding, default_crop_rect, display_geometry, display_to_source,
    source_to_display, Anchor,
};
pub use logging::JobLogger;
pub use plan::{plan_export, ExportPlan};
pub use probe::{is_video_file, probe_media};
pub use progress::{parse_time_marker, ProgressTracker};
