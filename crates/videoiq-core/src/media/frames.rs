//! Keyframe Sampling
//!
//! Samples one still image per fixed interval of video. A keyframe's
//! timestamp is `index * interval`, not the decoder's presentation time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::FFmpegError;
use crate::fs::recreate_dir;
use crate::{CoreError, CoreResult, MediaSource};

// =============================================================================
// Keyframe
// =============================================================================

/// A still image standing in for one sampling interval of video
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyframe {
    /// Whole seconds from the start, a multiple of the sampling interval
    pub timestamp: u32,
    /// Location of the sampled image
    pub image_path: PathBuf,
}

impl Keyframe {
    /// Creates the `index`-th keyframe of a sequence sampled every `interval_secs`
    pub fn new(index: usize, interval_secs: u32, image_path: impl Into<PathBuf>) -> Self {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        Self {
            timestamp: index.saturating_mul(interval_secs),
            image_path: image_path.into(),
        }
    }
}

// =============================================================================
// Frame Sampler Trait
// =============================================================================

/// Produces ordered keyframes at a fixed interval.
///
/// An empty sequence is valid and means "no visual content".
#[async_trait]
pub trait FrameSampler: Send + Sync {
    async fn sample(&self, source: &MediaSource, interval_secs: u32) -> CoreResult<Vec<Keyframe>>;
}

// =============================================================================
// FFmpeg Frame Sampler
// =============================================================================

/// Samples JPEG keyframes with the ffmpeg `fps=1/N` filter.
///
/// Frames of the current run are written to `{output_root}/frames`, which is
/// cleared before every run.
pub struct FfmpegFrameSampler {
    ffmpeg_path: PathBuf,
    output_root: PathBuf,
}

impl FfmpegFrameSampler {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            output_root: output_root.into(),
        }
    }

    /// Directory holding the frames of the current run
    pub fn frames_dir(&self) -> PathBuf {
        self.output_root.join("frames")
    }
}

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    async fn sample(&self, source: &MediaSource, interval_secs: u32) -> CoreResult<Vec<Keyframe>> {
        if interval_secs == 0 {
            return Err(CoreError::ValidationError(
                "Frame interval must be at least one second".to_string(),
            ));
        }

        let frames_dir = self.frames_dir();
        recreate_dir(&frames_dir)?;

        let pattern = frames_dir.join("frame_%06d.jpg");
        let output = tokio::process::Command::new(&self.ffmpeg_path)
            .args([
                "-i",
                &source.path().to_string_lossy(),
                "-vf",
                &format!("fps=1/{}", interval_secs),
                "-q:v",
                "2",
                "-y",
                &pattern.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| CoreError::DecodeFailed(FFmpegError::ProcessError(e).to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::DecodeFailed(
                FFmpegError::ExecutionFailed(format!("Frame sampling failed: {}", stderr.trim()))
                    .to_string(),
            ));
        }

        let frames = collect_keyframes(&frames_dir, interval_secs)?;
        debug!(
            "Sampled {} keyframes from {}",
            frames.len(),
            source.path().display()
        );
        Ok(frames)
    }
}

/// Lists the JPEG files in `dir` in name order as keyframes
pub fn collect_keyframes(dir: &Path, interval_secs: u32) -> CoreResult<Vec<Keyframe>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"))
        })
        .collect();
    images.sort();

    Ok(images
        .into_iter()
        .enumerate()
        .map(|(index, path)| Keyframe::new(index, interval_secs, path))
        .collect())
}
