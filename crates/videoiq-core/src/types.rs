//! VideoIQ Core Type Definitions
//!
//! Defines fundamental types used throughout the project.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{CoreError, CoreResult};

// =============================================================================
// ID Types
// =============================================================================

/// Analysis session unique identifier (ULID)
pub type SessionId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds from the start of the media (floating point)
pub type TimeSec = f64;

/// Formats seconds as `"{m}m {s}s"` for display next to a hit.
pub fn format_timestamp(seconds: TimeSec) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}m {}s", total / 60, total % 60)
}

// =============================================================================
// Media Source
// =============================================================================

/// Which embedding pipelines a source feeds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Modality {
    /// Speech only; the visual pipeline is skipped
    AudioOnly,
    /// Speech and keyframes
    AudioVideo,
}

impl Modality {
    /// Returns true when keyframes should be sampled
    pub fn has_video(&self) -> bool {
        matches!(self, Modality::AudioVideo)
    }

    /// Stable string form used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::AudioOnly => "audioOnly",
            Modality::AudioVideo => "audioVideo",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Modality {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audioOnly" => Ok(Modality::AudioOnly),
            "audioVideo" => Ok(Modality::AudioVideo),
            other => Err(CoreError::ValidationError(format!(
                "Unknown modality: {}",
                other
            ))),
        }
    }
}

/// A readable media file whose modality is already known.
///
/// Immutable for the duration of an analysis run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSource {
    path: PathBuf,
    modality: Modality,
}

impl MediaSource {
    /// Creates a media source
    pub fn new(path: impl Into<PathBuf>, modality: Modality) -> Self {
        Self {
            path: path.into(),
            modality,
        }
    }

    /// Creates an audio-only source
    pub fn audio_only(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Modality::AudioOnly)
    }

    /// Creates an audio+video source
    pub fn audio_video(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Modality::AudioVideo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    /// Returns true when the source has no visual track to index
    pub fn is_audio_only(&self) -> bool {
        self.modality == Modality::AudioOnly
    }

    /// Validates that the source points at an existing file
    pub fn ensure_readable(&self) -> CoreResult<()> {
        if !self.path.is_file() {
            return Err(CoreError::FileNotFound(
                self.path.to_string_lossy().to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
