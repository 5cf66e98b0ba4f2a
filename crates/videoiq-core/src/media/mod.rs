//! Media Module
//!
//! FFmpeg-backed decoding primitives: audio extraction for transcription and
//! fixed-interval keyframe sampling.

pub mod audio;
pub mod detection;
pub mod frames;

pub use detection::{detect_ffmpeg, FFmpegInfo};
pub use frames::{FfmpegFrameSampler, FrameSampler, Keyframe};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or set its path in settings.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("Output path error: {0}")]
    OutputError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;
