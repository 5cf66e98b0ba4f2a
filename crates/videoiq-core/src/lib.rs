//! VideoIQ Core Library
//!
//! Indexes a video's spoken and visual content into per-modality vector
//! collections and answers natural-language queries with time-addressed hits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          VideoIQ Core                             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  acquisition    - Local file / URL → MediaSource                  │
//! │  media          - FFmpeg audio extraction and keyframe sampling   │
//! │  transcription  - Transcriber trait + Whisper backend             │
//! │  embedding      - Text/image encoder traits + HTTP client         │
//! │  index          - SQLite-backed vector collections                │
//! │  pipeline       - Indexing orchestrator (state machine, progress) │
//! │  query          - Hybrid exact/semantic query resolver            │
//! │  summary        - Transcript summary generator                    │
//! │  settings       - Persistent configuration                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod acquisition;
pub mod embedding;
pub mod fs;
pub mod index;
pub mod media;
pub mod pipeline;
pub mod query;
pub mod session;
pub mod settings;
pub mod summary;
pub mod transcription;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
