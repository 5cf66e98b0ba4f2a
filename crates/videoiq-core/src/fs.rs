//! Filesystem utilities.
//!
//! Crash-tolerant writes for the settings file and validation of local media
//! paths handed to acquisition.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{CoreError, CoreResult};

// =============================================================================
// Path Validation
// =============================================================================

/// Returns true when `input` looks like a remote URL rather than a local path.
pub fn is_remote_url(input: &str) -> bool {
    let lower = input.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Validates and resolves a local file path for input operations.
///
/// - Rejects empty paths and URLs
/// - Requires absolute paths
/// - Verifies the file exists and is a regular file
pub fn validate_local_input_path(path: &str, label: &str) -> CoreResult<PathBuf> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(CoreError::ValidationError(format!("{label} is empty")));
    }

    if trimmed.contains("://") {
        return Err(CoreError::ValidationError(format!(
            "{label} must be a local file path, not a URL"
        )));
    }

    let pb = PathBuf::from(trimmed);
    if !pb.is_absolute() {
        return Err(CoreError::ValidationError(format!(
            "{label} must be an absolute path: {}",
            pb.display()
        )));
    }

    let meta = std::fs::metadata(&pb)
        .map_err(|_| CoreError::FileNotFound(pb.to_string_lossy().to_string()))?;
    if !meta.is_file() {
        return Err(CoreError::ValidationError(format!(
            "{label} is not a file: {}",
            pb.display()
        )));
    }

    Ok(pb)
}

/// Recreates `dir` as an empty directory.
pub fn recreate_dir(dir: &Path) -> CoreResult<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

// =============================================================================
// Atomic Writes
// =============================================================================

/// Write bytes to `path` using an atomic replace pattern.
///
/// Implementation notes:
/// - Write to a sibling temporary file.
/// - Flush and sync the temp file.
/// - Swap into place by renaming.
/// - If the destination exists, it is first moved aside as a `.bak` file, then removed.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = sibling_path(path, "tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    atomic_replace(path, &tmp_path)
}

/// Write a JSON file atomically with pretty formatting.
pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write_bytes(path, &bytes)
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| suffix.to_string());
    path.with_file_name(format!("{file_name}.{suffix}"))
}

fn atomic_replace(dest: &Path, src_tmp: &Path) -> CoreResult<()> {
    if !dest.exists() {
        std::fs::rename(src_tmp, dest)?;
        return Ok(());
    }

    // Windows: rename-over-existing may fail depending on filesystem; use a backup swap.
    let bak = sibling_path(dest, "bak");
    if bak.exists() {
        let _ = std::fs::remove_file(&bak);
    }

    std::fs::rename(dest, &bak)?;
    match std::fs::rename(src_tmp, dest) {
        Ok(()) => {
            let _ = std::fs::remove_file(&bak);
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::rename(&bak, dest);
            let _ = std::fs::remove_file(src_tmp);
            Err(CoreError::IoError(e))
        }
    }
}
