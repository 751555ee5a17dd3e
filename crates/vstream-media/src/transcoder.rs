//! The transcode capability and its ffmpeg implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};
use crate::hls::{self, HlsConfig};
use crate::probe::probe_video;

/// Converts one staged video into an HLS output tree.
///
/// Implementations are all-or-nothing: on error the caller does not inspect
/// whatever was written.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Encode `input` and return the directory holding `master.m3u8`.
    async fn encode(&self, input: &Path) -> MediaResult<PathBuf>;
}

/// Directory an encode of `input` writes into, named after the input's stem.
///
/// A staged upload at `<root>/<token>/<token>.mp4` encodes into its own
/// `<root>/<token>/`. Any other input gets a sibling directory, so
/// `/tmp/abc.mp4` encodes into `/tmp/abc/` and never into `/tmp`.
pub fn output_dir_for(input: &Path) -> MediaResult<PathBuf> {
    let stem = input
        .file_stem()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MediaError::InvalidVideo(format!("{} has no file name", input.display())))?;
    let parent = input
        .parent()
        .ok_or_else(|| MediaError::InvalidVideo(format!("{} has no parent", input.display())))?;

    if parent.file_name() == Some(stem) {
        return Ok(parent.to_path_buf());
    }

    let dir = parent.join(stem);
    if dir == input {
        return Err(MediaError::InvalidVideo(format!(
            "{} has no extension to strip for its output directory",
            input.display()
        )));
    }
    Ok(dir)
}

/// Runs ffmpeg to produce an adaptive ladder in the input's job directory.
#[derive(Debug, Clone, Default)]
pub struct FfmpegHlsTranscoder {
    config: HlsConfig,
    timeout_secs: Option<u64>,
}

impl FfmpegHlsTranscoder {
    pub fn new(config: HlsConfig) -> Self {
        Self {
            config,
            timeout_secs: None,
        }
    }

    /// Kill ffmpeg and fail the encode after `secs` seconds.
    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[async_trait]
impl Transcoder for FfmpegHlsTranscoder {
    async fn encode(&self, input: &Path) -> MediaResult<PathBuf> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let output_dir = output_dir_for(input)?;

        let info = probe_video(input).await?;
        let heights = hls::ladder(info.height);

        info!(
            input = %input.display(),
            source_height = info.height,
            has_audio = info.has_audio,
            variants = ?heights,
            "Starting HLS encode"
        );

        hls::prepare_variant_dirs(&output_dir, heights.len()).await?;
        let cmd = hls::build_hls_command(input, &output_dir, &heights, info.has_audio, &self.config);

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }

        let total_ms = (info.duration * 1000.0) as i64;
        runner
            .run_with_progress(&cmd, move |p| {
                debug!(
                    percent = p.percentage(total_ms),
                    speed = p.speed,
                    "Encode progress"
                );
            })
            .await?;

        Ok(output_dir)
    }
}
