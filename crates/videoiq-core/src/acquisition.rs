//! Source Acquisition
//!
//! Turns user input (a local path or a remote URL) into a `MediaSource` with
//! its modality decided. Nothing here touches the index, so an acquisition
//! failure leaves the previous session intact.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::fs::{is_remote_url, validate_local_input_path};
use crate::{CoreError, CoreResult, MediaSource, Modality};

/// Extensions treated as audio-only media
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg", "opus"];

/// Extensions treated as audio+video media
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi", "m4v"];

// =============================================================================
// Local Files
// =============================================================================

/// Decides the modality of a local file from its extension
pub fn classify_extension(path: &Path) -> CoreResult<Modality> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Ok(Modality::AudioOnly)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Ok(Modality::AudioVideo)
    } else {
        Err(CoreError::UnsupportedMediaFormat(
            path.to_string_lossy().to_string(),
        ))
    }
}

/// Acquires a local media file.
///
/// `force_audio_only` skips the visual pipeline even for a video container.
pub fn acquire_local(path: &str, force_audio_only: bool) -> CoreResult<MediaSource> {
    let path = validate_local_input_path(path, "Media path")?;
    let modality = match classify_extension(&path)? {
        _ if force_audio_only => Modality::AudioOnly,
        detected => detected,
    };

    debug!("Acquired local source {} ({})", path.display(), modality);
    Ok(MediaSource::new(path, modality))
}

// =============================================================================
// Remote URLs
// =============================================================================

/// Downloads remote media with the `yt-dlp` command line tool
pub struct YtDlpDownloader {
    binary: PathBuf,
    download_dir: PathBuf,
}

impl YtDlpDownloader {
    pub fn new(binary: impl Into<PathBuf>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            download_dir: download_dir.into(),
        }
    }

    /// Downloads `url`, preferring an MP4 rendition.
    ///
    /// Every download gets a fresh short file ID so runs never collide.
    pub async fn download(&self, url: &str) -> CoreResult<MediaSource> {
        std::fs::create_dir_all(&self.download_dir)?;

        let file_id = new_file_id();
        let template = self.download_dir.join(format!("{}.%(ext)s", file_id));

        info!("Downloading {}", url);
        let output = tokio::process::Command::new(&self.binary)
            .args([
                "--format",
                "best[ext=mp4]/best",
                "--output",
                &template.to_string_lossy(),
                "--quiet",
                "--no-warnings",
                "--no-playlist",
                "--dump-json",
                "--no-simulate",
                url,
            ])
            .output()
            .await
            .map_err(|e| {
                CoreError::AcquisitionFailed(format!(
                    "Failed to run {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::AcquisitionFailed(format!(
                "Download failed: {}",
                stderr.trim()
            )));
        }

        let info: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            CoreError::AcquisitionFailed(format!("Unreadable downloader metadata: {}", e))
        })?;

        let path = find_downloaded_file(&self.download_dir, &file_id)?;
        let modality = modality_from_info(&info);

        info!("Downloaded {} ({})", path.display(), modality);
        Ok(MediaSource::new(path, modality))
    }
}

/// Short random file ID (first 8 characters of a v4 UUID)
fn new_file_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Audio-only when the chosen format has no video codec or is labelled audio
fn modality_from_info(info: &Value) -> Modality {
    let no_video = info.get("vcodec").and_then(Value::as_str) == Some("none");
    let audio_note = info
        .get("format_note")
        .and_then(Value::as_str)
        .is_some_and(|note| note.to_lowercase().contains("audio"));

    if no_video || audio_note {
        Modality::AudioOnly
    } else {
        Modality::AudioVideo
    }
}

/// Locates `{file_id}.{ext}` in the download directory
fn find_downloaded_file(dir: &Path, file_id: &str) -> CoreResult<PathBuf> {
    let prefix = format!("{}.", file_id);

    std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .find(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix) && !n.ends_with(".part"))
        })
        .ok_or_else(|| {
            CoreError::AcquisitionFailed(format!("Downloaded file {} not found", file_id))
        })
}

// =============================================================================
// Entry Point
// =============================================================================

/// Acquires `input`, downloading it first when it is a URL
pub async fn acquire(
    input: &str,
    force_audio_only: bool,
    downloader: &YtDlpDownloader,
) -> CoreResult<MediaSource> {
    if is_remote_url(input) {
        let source = downloader.download(input.trim()).await?;
        if force_audio_only {
            return Ok(MediaSource::audio_only(source.path()));
        }
        Ok(source)
    } else {
        acquire_local(input, force_audio_only)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_extension() {
        assert_eq!(
            classify_extension(Path::new("/m/talk.mp3")).unwrap(),
            Modality::AudioOnly
        );
        assert_eq!(
            classify_extension(Path::new("/m/talk.WAV")).unwrap(),
            Modality::AudioOnly
        );
        assert_eq!(
            classify_extension(Path::new("/m/talk.mp4")).unwrap(),
            Modality::AudioVideo
        );
        assert!(matches!(
            classify_extension(Path::new("/m/notes.txt")),
            Err(CoreError::UnsupportedMediaFormat(_))
        ));
        assert!(classify_extension(Path::new("/m/noext")).is_err());
    }

    #[test]
    fn test_acquire_local_video() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"fake").unwrap();

        let source = acquire_local(path.to_str().unwrap(), false).unwrap();
        assert_eq!(source.modality(), Modality::AudioVideo);
        assert_eq!(source.path(), path.as_path());
    }

    #[test]
    fn test_acquire_local_audio_only_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"fake").unwrap();

        let source = acquire_local(path.to_str().unwrap(), true).unwrap();
        assert!(source.is_audio_only());
    }

    #[test]
    fn test_acquire_local_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.mp4");
        assert!(matches!(
            acquire_local(path.to_str().unwrap(), false),
            Err(CoreError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_modality_from_info() {
        assert_eq!(
            modality_from_info(&json!({"vcodec": "none", "format_note": "medium"})),
            Modality::AudioOnly
        );
        assert_eq!(
            modality_from_info(&json!({"vcodec": "avc1", "format_note": "Audio only"})),
            Modality::AudioOnly
        );
        assert_eq!(
            modality_from_info(&json!({"vcodec": "avc1.64001F", "format_note": "720p"})),
            Modality::AudioVideo
        );
        assert_eq!(modality_from_info(&json!({})), Modality::AudioVideo);
    }

    #[test]
    fn test_new_file_id() {
        let a = new_file_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, new_file_id());
    }

    #[test]
    fn test_find_downloaded_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abcd1234.mp4.part"), b"partial").unwrap();
        std::fs::write(dir.path().join("abcd1234.mp4"), b"done").unwrap();
        std::fs::write(dir.path().join("other.mp4"), b"x").unwrap();

        let found = find_downloaded_file(dir.path(), "abcd1234").unwrap();
        assert!(found.ends_with("abcd1234.mp4"));
        assert!(find_downloaded_file(dir.path(), "ffff0000").is_err());
    }
}
