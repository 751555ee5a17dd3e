//! Adaptive HLS ladder and ffmpeg argument construction.
//!
//! Output layout inside the job directory:
//!
//! ```text
//! master.m3u8
//! v0/prog_index.m3u8
//! v0/fileSequence0.ts
//! v1/...
//! ```

use std::path::{Path, PathBuf};

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Top-level playlist name.
pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// Per-variant playlist name.
pub const VARIANT_PLAYLIST: &str = "prog_index.m3u8";

/// Standard rungs, kept only when strictly below the source height.
const STANDARD_HEIGHTS: [u32; 3] = [720, 1080, 1440];

/// Used when ffprobe reports no height.
const FALLBACK_HEIGHT: u32 = 720;

/// Encoder settings for HLS output.
#[derive(Debug, Clone)]
pub struct HlsConfig {
    /// Target segment duration in seconds
    pub segment_seconds: u32,
    /// x264 preset
    pub preset: String,
    /// x264 constant rate factor
    pub crf: u8,
    /// Audio bitrate per variant
    pub audio_bitrate: String,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            segment_seconds: 6,
            preset: "veryfast".to_string(),
            crf: 20,
            audio_bitrate: "128k".to_string(),
        }
    }
}

impl HlsConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            segment_seconds: std::env::var("HLS_SEGMENT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s| *s > 0)
                .unwrap_or(defaults.segment_seconds),
            preset: std::env::var("HLS_PRESET").unwrap_or(defaults.preset),
            crf: std::env::var("HLS_CRF")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|c| *c <= 51)
                .unwrap_or(defaults.crf),
            audio_bitrate: defaults.audio_bitrate,
        }
    }
}

/// Output heights for a source, ascending, topped by the source height.
pub fn ladder(source_height: u32) -> Vec<u32> {
    // libx264 requires even dimensions
    let top = source_height & !1;
    if top == 0 {
        return vec![FALLBACK_HEIGHT];
    }

    let mut heights: Vec<u32> = STANDARD_HEIGHTS
        .iter()
        .copied()
        .filter(|h| *h < top)
        .collect();
    heights.push(top);
    heights
}

/// Directory of variant `index` under `output_dir`.
pub fn variant_dir(output_dir: &Path, index: usize) -> PathBuf {
    output_dir.join(format!("v{index}"))
}

/// Create `v{i}` directories before ffmpeg writes into them.
pub async fn prepare_variant_dirs(output_dir: &Path, count: usize) -> MediaResult<()> {
    for i in 0..count {
        tokio::fs::create_dir_all(variant_dir(output_dir, i)).await?;
    }
    Ok(())
}

/// Build the single ffmpeg invocation that emits every rung plus the master playlist.
pub fn build_hls_command(
    input: &Path,
    output_dir: &Path,
    heights: &[u32],
    has_audio: bool,
    config: &HlsConfig,
) -> FfmpegCommand {
    let count = heights.len();

    let split_labels: String = (0..count).map(|i| format!("[s{i}]")).collect();
    let mut filter = format!("[0:v]split={count}{split_labels}");
    for (i, h) in heights.iter().enumerate() {
        filter.push_str(&format!(";[s{i}]scale=-2:{h}[v{i}out]"));
    }

    let output_pattern = output_dir.join("v%v").join(VARIANT_PLAYLIST);
    let segment_pattern = output_dir.join("v%v").join("fileSequence%d.ts");

    let mut cmd = FfmpegCommand::new(input, output_pattern.to_string_lossy())
        .filter_complex(filter);

    for i in 0..count {
        cmd = cmd.map(format!("[v{i}out]"));
        if has_audio {
            cmd = cmd.map("a:0");
        }
    }

    cmd = cmd
        .output_args(["-c:v", "libx264"])
        .preset(config.preset.clone())
        .crf(config.crf)
        .output_args([
            "-sc_threshold".to_string(),
            "0".to_string(),
            "-force_key_frames".to_string(),
            format!("expr:gte(t,n_forced*{})", config.segment_seconds),
        ]);

    if has_audio {
        cmd = cmd.output_args([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            config.audio_bitrate.clone(),
            "-ac".to_string(),
            "2".to_string(),
        ]);
    }

    let stream_map = (0..count)
        .map(|i| {
            if has_audio {
                format!("v:{i},a:{i}")
            } else {
                format!("v:{i}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    cmd.output_args([
        "-var_stream_map".to_string(),
        stream_map,
        "-master_pl_name".to_string(),
        MASTER_PLAYLIST.to_string(),
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        config.segment_seconds.to_string(),
        "-hls_list_size".to_string(),
        "0".to_string(),
        "-hls_playlist_type".to_string(),
        "vod".to_string(),
        "-hls_segment_filename".to_string(),
        segment_pattern.to_string_lossy().to_string(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_keeps_rungs_below_source() {
        assert_eq!(ladder(2160), vec![720, 1080, 1440, 2160]);
        assert_eq!(ladder(1080), vec![720, 1080]);
        assert_eq!(ladder(720), vec![720]);
        assert_eq!(ladder(480), vec![480]);
    }

    #[test]
    fn test_ladder_rounds_odd_heights_and_handles_unknown() {
        assert_eq!(ladder(1081), vec![720, 1080]);
        assert_eq!(ladder(0), vec![720]);
    }

    #[test]
    fn test_hls_command_with_audio() {
        let cmd = build_hls_command(
            Path::new("/staging/abc/abc.mp4"),
            Path::new("/staging/abc"),
            &[720, 1080],
            true,
            &HlsConfig::default(),
        );
        let args = cmd.build_args();

        let filter_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(
            args[filter_pos + 1],
            "[0:v]split=2[s0][s1];[s0]scale=-2:720[v0out];[s1]scale=-2:1080[v1out]"
        );

        let map_pos = args.iter().position(|a| a == "-var_stream_map").unwrap();
        assert_eq!(args[map_pos + 1], "v:0,a:0 v:1,a:1");
        assert_eq!(args.iter().filter(|a| *a == "a:0").count(), 2);
        assert!(args.contains(&"master.m3u8".to_string()));
        assert!(args.contains(&"/staging/abc/v%v/fileSequence%d.ts".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some("/staging/abc/v%v/prog_index.m3u8")
        );
    }

    #[test]
    fn test_hls_command_without_audio() {
        let cmd = build_hls_command(
            Path::new("in.mov"),
            Path::new("out"),
            &[480],
            false,
            &HlsConfig::default(),
        );
        let args = cmd.build_args();

        let map_pos = args.iter().position(|a| a == "-var_stream_map").unwrap();
        assert_eq!(args[map_pos + 1], "v:0");
        assert!(!args.contains(&"aac".to_string()));
    }

    #[tokio::test]
    async fn test_prepare_variant_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        prepare_variant_dirs(dir.path(), 3).await.unwrap();
        assert!(dir.path().join("v0").is_dir());
        assert!(dir.path().join("v2").is_dir());
        assert!(!dir.path().join("v3").exists());
    }
}
