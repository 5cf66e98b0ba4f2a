//! FFmpeg Detection
//!
//! Locates the ffmpeg/ffprobe binaries: an explicitly configured path wins,
//! then common install locations, then a `which`/`where` lookup.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use super::{FFmpegError, FFmpegResult};

/// Information about a detected FFmpeg installation
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Version string reported by `ffmpeg -version`
    pub version: String,
}

/// Detects FFmpeg, preferring explicitly configured binaries
pub fn detect_ffmpeg(
    ffmpeg_override: Option<&Path>,
    ffprobe_override: Option<&Path>,
) -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = match ffmpeg_override {
        Some(path) if path.exists() => path.to_path_buf(),
        Some(path) => {
            return Err(FFmpegError::InvalidInput(format!(
                "Configured ffmpeg does not exist: {}",
                path.display()
            )))
        }
        None => find_binary("ffmpeg")?,
    };

    let ffprobe_path = match ffprobe_override {
        Some(path) => path.to_path_buf(),
        None => find_binary("ffprobe").unwrap_or_else(|_| sibling_binary(&ffmpeg_path, "ffprobe")),
    };

    let version = get_ffmpeg_version(&ffmpeg_path)?;
    debug!("Using FFmpeg {} at {}", version, ffmpeg_path.display());

    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
    })
}

/// Platform-specific executable name
fn binary_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// `ffprobe` next to a known `ffmpeg`
fn sibling_binary(ffmpeg_path: &Path, name: &str) -> PathBuf {
    ffmpeg_path
        .parent()
        .map(|dir| dir.join(binary_name(name)))
        .unwrap_or_else(|| PathBuf::from(binary_name(name)))
}

/// Finds a binary in common locations, then in PATH
fn find_binary(name: &str) -> FFmpegResult<PathBuf> {
    let file_name = binary_name(name);

    for dir in get_common_ffmpeg_paths() {
        let candidate = dir.join(&file_name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let lookup = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    let output = Command::new(lookup)
        .arg(name)
        .output()
        .map_err(|_| FFmpegError::NotFound)?;

    if output.status.success() {
        let path_str = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = path_str.lines().next() {
            let trimmed = first_line.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }
    }

    Err(FFmpegError::NotFound)
}

/// Common FFmpeg installation directories for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));

        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }

        if let Ok(userprofile) = std::env::var("USERPROFILE") {
            paths.push(PathBuf::from(userprofile).join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin"));
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Reads the version from the first line of `ffmpeg -version`
fn get_ffmpeg_version(ffmpeg_path: &Path) -> FFmpegResult<String> {
    let output = Command::new(ffmpeg_path)
        .arg("-version")
        .output()
        .map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to get FFmpeg version".to_string(),
        ));
    }

    parse_version_line(&String::from_utf8_lossy(&output.stdout))
}

fn parse_version_line(output: &str) -> FFmpegResult<String> {
    let first_line = output
        .lines()
        .next()
        .ok_or_else(|| FFmpegError::ParseError("Could not parse FFmpeg version".to_string()))?;

    Ok(first_line
        .strip_prefix("ffmpeg version ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or(first_line)
        .to_string())
}
