//! VideoIQ command line interface
//!
//! Indexes one video at a time and answers questions about it.

mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use videoiq_core::acquisition::{acquire, YtDlpDownloader};
use videoiq_core::embedding::{EmbeddingServiceClient, EmbeddingServiceConfig};
use videoiq_core::index::{IndexDb, VectorIndex};
use videoiq_core::media::{detect_ffmpeg, FfmpegFrameSampler};
use videoiq_core::pipeline::IndexingOrchestrator;
use videoiq_core::query::QueryResolver;
use videoiq_core::session::load_session;
use videoiq_core::settings::{default_data_dir, AppSettings, SettingsManager, SUMMARY_API_KEY_ENV};
use videoiq_core::summary::{ChatSummaryConfig, ChatSummaryGenerator, SummaryGenerator};
use videoiq_core::transcription::{Transcriber, UnavailableTranscriber, WhisperTranscriber};
use videoiq_core::CoreError;

#[derive(Parser)]
#[command(name = "videoiq", version)]
#[command(about = "Index a video and ask it questions", long_about = None)]
struct Cli {
    /// Directory holding settings, the index and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log progress details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a local media file or a URL, replacing the current session
    Analyze {
        /// Absolute file path or http(s) URL
        source: String,

        /// Skip visual analysis even for video files
        #[arg(long)]
        audio_only: bool,
    },

    /// Search the current session
    Search {
        /// Free-text query
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize the current session's transcript
    Summarize,

    /// Show the current session and collection sizes
    Status {
        /// Print status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Wipe the index and forget the current session
    Reset,
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(data_dir: &Path, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if verbose { "info" } else { "warn" })
    });

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let log_dir = data_dir.join("logs");
    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::daily(&log_dir, "videoiq.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
    guard
}

// =============================================================================
// Wiring
// =============================================================================

/// Whisper when it loaded, otherwise a stand-in that fails every call.
///
/// The flag reports whether speech can actually be transcribed.
fn speech_backend(loaded: Result<WhisperTranscriber, CoreError>) -> (Arc<dyn Transcriber>, bool) {
    match loaded {
        Ok(transcriber) => (Arc::new(transcriber), true),
        Err(e) => {
            warn!("Speech transcription unavailable: {}", e);
            eprintln!("warning: speech transcription unavailable ({}); indexing visuals only", e);
            (Arc::new(UnavailableTranscriber::new(e.to_string())), false)
        }
    }
}

struct App {
    data_dir: PathBuf,
    settings: AppSettings,
}

impl App {
    fn load(data_dir: PathBuf) -> Self {
        let settings = SettingsManager::new(data_dir.clone())
            .load()
            .with_env_overrides();
        Self { data_dir, settings }
    }

    fn open_index(&self) -> Result<Arc<IndexDb>> {
        let path = self.settings.database_path(&self.data_dir);
        let db = IndexDb::create(&path, self.settings.index.dimension)
            .with_context(|| format!("Cannot open index at {}", path.display()))?;
        Ok(Arc::new(db))
    }

    fn encoder(&self) -> Result<Arc<EmbeddingServiceClient>> {
        let encoders = &self.settings.encoders;
        let client = EmbeddingServiceClient::new(EmbeddingServiceConfig {
            base_url: encoders.base_url.clone(),
            text_model: encoders.text_model.clone(),
            image_model: encoders.image_model.clone(),
            api_key: encoders.api_key.clone(),
            timeout_secs: encoders.timeout_secs,
            dimension: self.settings.index.dimension,
        })?;
        Ok(Arc::new(client))
    }

    fn transcriber(&self, ffmpeg_path: &Path, work_dir: &Path) -> (Arc<dyn Transcriber>, bool) {
        speech_backend(WhisperTranscriber::new(
            &self.settings.whisper_model_path(&self.data_dir),
            ffmpeg_path,
            work_dir,
            self.settings.transcription_options(),
        ))
    }

    async fn analyze(&self, input: &str, audio_only: bool) -> Result<()> {
        let settings = &self.settings;
        let media = &settings.media;

        // Everything that can fail locally is checked before a download.
        let ffmpeg = detect_ffmpeg(media.ffmpeg_path.as_deref(), media.ffprobe_path.as_deref())
            .context("FFmpeg is required for analysis")?;
        let work_dir = settings.work_dir(&self.data_dir);
        let encoder = self.encoder()?;
        let db = self.open_index()?;
        let (transcriber, has_speech) = self.transcriber(&ffmpeg.ffmpeg_path, &work_dir);
        if audio_only && !has_speech {
            bail!("Audio-only analysis needs a transcription backend");
        }

        let downloader = YtDlpDownloader::new(&media.ytdlp_path, settings.download_dir(&self.data_dir));
        let source = acquire(input, audio_only, &downloader).await?;
        info!("Acquired {} as {}", source.path().display(), source.modality());
        if source.is_audio_only() && !has_speech {
            bail!(
                "{} has no video track and no transcription backend is available",
                source.path().display()
            );
        }

        let sampler = FfmpegFrameSampler::new(&ffmpeg.ffmpeg_path, &work_dir);
        let orchestrator = IndexingOrchestrator::new(
            db.clone(),
            transcriber,
            Arc::new(sampler),
            encoder.clone(),
            encoder,
            settings.indexing_config(),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let renderer = tokio::spawn(output::render_progress(rx));
        let result = orchestrator.analyze(source, Some(tx)).await;
        let _ = renderer.await;

        let session = result?;
        output::print_analysis(&session, &db.get_stats()?);
        Ok(())
    }

    async fn search(&self, query: &str, json: bool) -> Result<()> {
        let db = self.open_index()?;
        let session = load_session(&db)?.ok_or(CoreError::SessionNotReady)?;
        let resolver = QueryResolver::new(db, self.encoder()?, self.settings.query_config());

        match resolver.resolve(&session, query).await? {
            None => println!("Empty query, nothing to search."),
            Some(results) if json => println!("{}", serde_json::to_string_pretty(&results)?),
            Some(results) => print!("{}", output::format_results(&results)),
        }
        Ok(())
    }

    async fn summarize(&self) -> Result<()> {
        let db = self.open_index()?;
        let session = load_session(&db)?.ok_or(CoreError::SessionNotReady)?;

        let summary = &self.settings.summary;
        let api_key = summary
            .api_key
            .clone()
            .with_context(|| format!("No summary API key; set {}", SUMMARY_API_KEY_ENV))?;

        let generator = ChatSummaryGenerator::new(ChatSummaryConfig {
            base_url: summary.base_url.clone(),
            model: summary.model.clone(),
            api_key,
            temperature: Some(summary.temperature),
            max_tokens: Some(summary.max_tokens),
            timeout_secs: summary.timeout_secs,
        })?;

        let text = generator.summarize(&session.transcript_text()).await?;
        println!("{}", text);
        Ok(())
    }

    fn status(&self, json: bool) -> Result<()> {
        let db = self.open_index()?;
        let stats = db.get_stats()?;
        let session = load_session(&db)?;

        if json {
            let value = serde_json::json!({
                "dataDir": self.data_dir,
                "dimension": db.dimension(),
                "stats": stats,
                "session": session,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            print!("{}", output::format_status(session.as_ref(), &stats));
        }
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let db = self.open_index()?;
        db.reset()?;
        println!("Index cleared.");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let _log_guard = init_logging(&data_dir, cli.verbose);

    let app = App::load(data_dir);

    match cli.command {
        Commands::Analyze { source, audio_only } => app.analyze(&source, audio_only).await,
        Commands::Search { query, json } => app.search(&query.join(" "), json).await,
        Commands::Summarize => app.summarize().await,
        Commands::Status { json } => app.status(json),
        Commands::Reset => app.reset(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------------------
    // Speech backend fallback
    // ---------------------------------------------------------------------------

    #[tokio::test]
    async fn test_missing_model_falls_back_to_failing_transcriber() {
        let (transcriber, has_speech) =
            speech_backend(Err(CoreError::FileNotFound("ggml-base.bin".to_string())));

        assert!(!has_speech);
        assert_eq!(transcriber.name(), "unavailable");

        let source = videoiq_core::MediaSource::audio_only("/tmp/talk.mp3");
        let err = transcriber.transcribe(&source).await.unwrap_err();
        assert!(matches!(err, CoreError::TranscriptionFailed(msg) if msg.contains("ggml-base.bin")));
    }
}
