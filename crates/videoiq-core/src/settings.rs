//! Settings Persistence
//!
//! Persistent configuration with:
//! - Per-field defaults, so partial or older files still load
//! - Tolerant normalization (out-of-range values are clamped)
//! - Atomic writes under an advisory lock
//!
//! Storage location: {data_dir}/settings.json

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::fs::atomic_write_json_pretty;
use crate::pipeline::IndexingConfig;
use crate::query::QueryConfig;
use crate::summary::{DEFAULT_SUMMARY_BASE_URL, DEFAULT_SUMMARY_MODEL};
use crate::transcription::{TranscriptionOptions, WhisperModel};
use crate::{CoreError, CoreResult};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

/// Environment variable overriding `encoders.apiKey`
pub const ENCODER_API_KEY_ENV: &str = "VIDEOIQ_ENCODER_API_KEY";

/// Environment variable overriding `summary.apiKey`
pub const SUMMARY_API_KEY_ENV: &str = "VIDEOIQ_SUMMARY_API_KEY";

/// Default data directory: `{platform data dir}/videoiq`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("videoiq")
}

// =============================================================================
// App Settings
// =============================================================================

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub media: MediaSettings,

    #[serde(default)]
    pub transcription: TranscriptionSettings,

    #[serde(default)]
    pub encoders: EncoderSettings,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub summary: SummarySettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            index: IndexSettings::default(),
            media: MediaSettings::default(),
            transcription: TranscriptionSettings::default(),
            encoders: EncoderSettings::default(),
            search: SearchSettings::default(),
            summary: SummarySettings::default(),
        }
    }
}

impl AppSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Bad values are corrected instead of rejected, so an edited or old
    /// file never prevents startup.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        if self.index.dimension == 0 {
            self.index.dimension = default_dimension();
        }

        self.media.frame_interval_secs = self.media.frame_interval_secs.clamp(1, 60);
        if self.media.ytdlp_path.trim().is_empty() {
            self.media.ytdlp_path = default_ytdlp_path();
        }

        self.transcription.language = self.transcription.language.trim().to_ascii_lowercase();
        if self.transcription.language.is_empty() {
            self.transcription.language = default_language();
        }
        self.transcription.threads = self.transcription.threads.min(64);

        self.encoders.base_url = normalize_url(&self.encoders.base_url, default_encoder_url());
        self.encoders.timeout_secs = self.encoders.timeout_secs.clamp(1, 600);
        normalize_key(&mut self.encoders.api_key);

        self.search.visual_top_k = self.search.visual_top_k.clamp(1, 100);
        self.search.exact_match_limit = self.search.exact_match_limit.clamp(1, 100);
        self.search.semantic_top_k = self.search.semantic_top_k.clamp(1, 100);

        self.summary.base_url = normalize_url(&self.summary.base_url, default_summary_url());
        self.summary.temperature = clamp_f32(self.summary.temperature, 0.0, 2.0);
        self.summary.max_tokens = self.summary.max_tokens.clamp(64, 32_768);
        self.summary.timeout_secs = self.summary.timeout_secs.clamp(1, 600);
        normalize_key(&mut self.summary.api_key);
    }

    /// Applies API key overrides from the environment.
    ///
    /// Overrides live only in memory and are never saved.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENCODER_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.encoders.api_key = Some(key);
        }
        if let Some(key) = lookup(SUMMARY_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.summary.api_key = Some(key);
        }
    }

    /// Index database location
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        self.index
            .database_path
            .clone()
            .unwrap_or_else(|| data_dir.join("index.db"))
    }

    /// Scratch directory for extracted audio and keyframes
    pub fn work_dir(&self, data_dir: &Path) -> PathBuf {
        self.media
            .work_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("work"))
    }

    /// Directory receiving remote downloads
    pub fn download_dir(&self, data_dir: &Path) -> PathBuf {
        self.media
            .download_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("downloads"))
    }

    /// Whisper model file for the configured model size
    pub fn whisper_model_path(&self, data_dir: &Path) -> PathBuf {
        self.transcription
            .model_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("models").join("whisper"))
            .join(self.transcription.model.filename())
    }

    pub fn indexing_config(&self) -> IndexingConfig {
        IndexingConfig {
            frame_interval_secs: self.media.frame_interval_secs,
        }
    }

    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            visual_top_k: self.search.visual_top_k,
            exact_match_limit: self.search.exact_match_limit,
            semantic_top_k: self.search.semantic_top_k,
        }
    }

    pub fn transcription_options(&self) -> TranscriptionOptions {
        TranscriptionOptions {
            language: Some(self.transcription.language.clone()),
            threads: self.transcription.threads,
        }
    }
}

fn clamp_f32(value: f32, min: f32, max: f32) -> f32 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

fn normalize_url(value: &str, fallback: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        fallback
    }
}

fn normalize_key(key: &mut Option<String>) {
    if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
        *key = None;
    }
}

// =============================================================================
// Index Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    /// Database file; `{data_dir}/index.db` when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Vector dimension of both collections
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            dimension: default_dimension(),
        }
    }
}

fn default_dimension() -> usize {
    512
}

// =============================================================================
// Media Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaSettings {
    /// Explicit ffmpeg binary; detected when unset
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// yt-dlp executable used for remote sources
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,

    /// Seconds between sampled keyframes (1-60)
    #[serde(default = "default_frame_interval")]
    pub frame_interval_secs: u32,

    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            ytdlp_path: default_ytdlp_path(),
            frame_interval_secs: default_frame_interval(),
            work_dir: None,
            download_dir: None,
        }
    }
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_frame_interval() -> u32 {
    1
}

// =============================================================================
// Transcription Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionSettings {
    #[serde(default)]
    pub model: WhisperModel,

    /// Directory holding ggml model files
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    /// Language code or "auto"
    #[serde(default = "default_language")]
    pub language: String,

    /// 0 = let whisper decide
    #[serde(default)]
    pub threads: u32,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: WhisperModel::default(),
            model_dir: None,
            language: default_language(),
            threads: 0,
        }
    }
}

fn default_language() -> String {
    "auto".to_string()
}

// =============================================================================
// Encoder Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncoderSettings {
    #[serde(default = "default_encoder_url")]
    pub base_url: String,

    #[serde(default = "default_encoder_model")]
    pub text_model: String,

    #[serde(default = "default_encoder_model")]
    pub image_model: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            base_url: default_encoder_url(),
            text_model: default_encoder_model(),
            image_model: default_encoder_model(),
            timeout_secs: default_timeout(),
            api_key: None,
        }
    }
}

fn default_encoder_url() -> String {
    "http://127.0.0.1:8080/v1".to_string()
}

fn default_encoder_model() -> String {
    "clip-ViT-B-32".to_string()
}

fn default_timeout() -> u64 {
    60
}

// =============================================================================
// Search Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchSettings {
    #[serde(default = "default_visual_top_k")]
    pub visual_top_k: usize,

    #[serde(default = "default_exact_match_limit")]
    pub exact_match_limit: usize,

    #[serde(default = "default_semantic_top_k")]
    pub semantic_top_k: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            visual_top_k: default_visual_top_k(),
            exact_match_limit: default_exact_match_limit(),
            semantic_top_k: default_semantic_top_k(),
        }
    }
}

fn default_visual_top_k() -> usize {
    12
}

fn default_exact_match_limit() -> usize {
    5
}

fn default_semantic_top_k() -> usize {
    5
}

// =============================================================================
// Summary Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummarySettings {
    #[serde(default = "default_summary_url")]
    pub base_url: String,

    #[serde(default = "default_summary_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            base_url: default_summary_url(),
            model: default_summary_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_summary_url() -> String {
    DEFAULT_SUMMARY_BASE_URL.to_string()
}

fn default_summary_model() -> String {
    DEFAULT_SUMMARY_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_max_tokens() -> u32 {
    2048
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Settings manager for loading, saving, and resetting settings
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Creates a settings manager for the given data directory
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            settings_path: data_dir.join(SETTINGS_FILE),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(&self, exclusive: bool, op: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)?;
        } else {
            fs2::FileExt::lock_shared(&lock_file)?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Loads settings, falling back to defaults when missing or unreadable
    pub fn load(&self) -> AppSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(AppSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)?;
            let mut settings = serde_json::from_str::<AppSettings>(&content)?;

            if settings.version < SETTINGS_VERSION {
                info!(
                    "Migrating settings from version {} to {}",
                    settings.version, SETTINGS_VERSION
                );
                settings.version = SETTINGS_VERSION;
            }

            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                AppSettings::default()
            }
        }
    }

    /// Normalizes and saves settings atomically; returns what was written
    pub fn save(&self, settings: &AppSettings) -> CoreResult<AppSettings> {
        self.with_lock(true, || {
            let mut normalized = settings.clone();
            normalized.normalize();

            atomic_write_json_pretty(&self.settings_path, &normalized).map_err(|e| {
                CoreError::Internal(format!("Failed to write settings file: {}", e))
            })?;

            info!("Settings saved to {}", self.settings_path.display());
            Ok(normalized)
        })
    }

    /// Deletes the settings file and returns defaults
    pub fn reset(&self) -> CoreResult<AppSettings> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path)?;
                info!("Settings file deleted");
            }
            Ok(AppSettings::default())
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // -------------------------------------------------------------------------
    // Defaults and Normalization
    // -------------------------------------------------------------------------

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.index.dimension, 512);
        assert_eq!(settings.media.frame_interval_secs, 1);
        assert_eq!(settings.search.visual_top_k, 12);
        assert_eq!(settings.search.exact_match_limit, 5);
        assert_eq!(settings.search.semantic_top_k, 5);
        assert_eq!(settings.summary.model, "llama-3.3-70b-versatile");
        assert_eq!(settings.transcription.model, WhisperModel::Base);
    }

    #[test]
    fn test_settings_serialization_camel_case() {
        let json = serde_json::to_value(AppSettings::default()).unwrap();
        assert_eq!(json["media"]["frameIntervalSecs"], 1);
        assert_eq!(json["search"]["visualTopK"], 12);

        let back: AppSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, AppSettings::default());
    }

    #[test]
    fn test_normalization_clamps_values() {
        let mut settings = AppSettings::default();
        settings.media.frame_interval_secs = 0;
        settings.search.visual_top_k = 0;
        settings.search.semantic_top_k = 10_000;
        settings.summary.temperature = f32::NAN;
        settings.index.dimension = 0;
        settings.encoders.base_url = "not a url".to_string();
        settings.encoders.api_key = Some("  ".to_string());

        settings.normalize();

        assert_eq!(settings.media.frame_interval_secs, 1);
        assert_eq!(settings.search.visual_top_k, 1);
        assert_eq!(settings.search.semantic_top_k, 100);
        assert_eq!(settings.summary.temperature, 0.0);
        assert_eq!(settings.index.dimension, 512);
        assert_eq!(settings.encoders.base_url, default_encoder_url());
        assert!(settings.encoders.api_key.is_none());
    }

    #[test]
    fn test_frame_interval_upper_bound() {
        let mut settings = AppSettings::default();
        settings.media.frame_interval_secs = 600;
        settings.normalize();
        assert_eq!(settings.media.frame_interval_secs, 60);
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = AppSettings::default();
        settings.apply_overrides(|name| match name {
            ENCODER_API_KEY_ENV => Some("enc-key".to_string()),
            SUMMARY_API_KEY_ENV => Some("".to_string()),
            _ => None,
        });

        assert_eq!(settings.encoders.api_key.as_deref(), Some("enc-key"));
        assert!(settings.summary.api_key.is_none());
    }

    #[test]
    fn test_derived_paths() {
        let settings = AppSettings::default();
        let data_dir = Path::new("/data/videoiq");

        assert_eq!(settings.database_path(data_dir), data_dir.join("index.db"));
        assert_eq!(settings.work_dir(data_dir), data_dir.join("work"));
        assert!(settings
            .whisper_model_path(data_dir)
            .ends_with("models/whisper/ggml-base.bin"));
    }

    #[test]
    fn test_query_and_indexing_config() {
        let mut settings = AppSettings::default();
        settings.media.frame_interval_secs = 2;

        assert_eq!(settings.indexing_config().frame_interval_secs, 2);
        assert_eq!(settings.query_config(), QueryConfig::default());
    }

    // -------------------------------------------------------------------------
    // Settings Manager
    // -------------------------------------------------------------------------

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        assert_eq!(manager.load(), AppSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        let mut settings = AppSettings::default();
        settings.transcription.language = "EN".to_string();
        settings.search.visual_top_k = 20;

        let saved = manager.save(&settings).unwrap();
        assert_eq!(saved.transcription.language, "en");

        let loaded = manager.load();
        assert_eq!(loaded.transcription.language, "en");
        assert_eq!(loaded.search.visual_top_k, 20);
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        manager.save(&AppSettings::default()).unwrap();
        manager.save(&AppSettings::default()).unwrap();

        assert!(manager.settings_path().exists());
        assert!(!temp_dir.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn test_reset_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        manager.save(&AppSettings::default()).unwrap();
        let reset = manager.reset().unwrap();

        assert!(!manager.settings_path().exists());
        assert_eq!(reset, AppSettings::default());
    }

    #[test]
    fn test_invalid_json_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(SETTINGS_FILE), "invalid json {{{").unwrap();

        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        assert_eq!(manager.load(), AppSettings::default());
    }

    #[test]
    fn test_partial_json_uses_defaults_for_missing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(SETTINGS_FILE),
            r#"{"version": 1, "media": {"frameIntervalSecs": 5}}"#,
        )
        .unwrap();

        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        let settings = manager.load();

        assert_eq!(settings.media.frame_interval_secs, 5);
        assert_eq!(settings.media.ytdlp_path, "yt-dlp");
        assert_eq!(settings.search, SearchSettings::default());
    }
}
