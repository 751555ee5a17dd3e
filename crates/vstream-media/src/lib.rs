//! FFmpeg wrapper for HLS transcoding.
//!
//! This crate provides:
//! - The [`Transcoder`] capability used by the queue worker
//! - An ffmpeg implementation producing an adaptive HLS ladder
//! - FFmpeg command building with progress parsing and stderr capture
//! - FFprobe inspection and filesystem helpers for staged uploads

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod hls;
pub mod probe;
pub mod progress;
pub mod transcoder;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use hls::HlsConfig;
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use transcoder::{output_dir_for, FfmpegHlsTranscoder, Transcoder};
