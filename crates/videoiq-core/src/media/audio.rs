//! Audio Extraction
//!
//! Extracts a media file's audio track as 16kHz mono 16-bit WAV, the input
//! format Whisper expects, and loads it back as normalized samples.

use std::path::Path;

use super::{FFmpegError, FFmpegResult};

/// Sample rate required by Whisper
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Size of a canonical WAV header; anything not larger holds no samples
const WAV_HEADER_LEN: u64 = 44;

/// Extracts audio from a video/audio file as 16kHz mono WAV.
///
/// Fails when the input has no decodable audio track.
pub async fn extract_audio_for_transcription(
    ffmpeg_path: &Path,
    input_path: &Path,
    output_path: &Path,
) -> FFmpegResult<()> {
    if !input_path.is_file() {
        return Err(FFmpegError::InvalidInput(format!(
            "Input file does not exist: {}",
            input_path.display()
        )));
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(FFmpegError::OutputError(format!(
                "Output directory does not exist: {}",
                parent.display()
            )));
        }
    }

    let output = tokio::process::Command::new(ffmpeg_path)
        .args([
            "-i",
            &input_path.to_string_lossy(),
            "-vn",
            "-ar",
            "16000",
            "-ac",
            "1",
            "-c:a",
            "pcm_s16le",
            "-y",
            &output_path.to_string_lossy(),
        ])
        .output()
        .await
        .map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FFmpegError::ExecutionFailed(format!(
            "Audio extraction failed: {}",
            stderr.trim()
        )));
    }

    let written = std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(0);
    if written <= WAV_HEADER_LEN {
        return Err(FFmpegError::ExecutionFailed(format!(
            "No audio track in {}",
            input_path.display()
        )));
    }

    Ok(())
}

/// Loads a 16kHz mono WAV file as f32 samples in [-1.0, 1.0]
pub fn load_audio_samples(wav_path: &Path) -> FFmpegResult<Vec<f32>> {
    let reader = hound::WavReader::open(wav_path)
        .map_err(|e| FFmpegError::ParseError(format!("Failed to open WAV file: {}", e)))?;

    let spec = reader.spec();

    if spec.sample_rate != WHISPER_SAMPLE_RATE {
        return Err(FFmpegError::ParseError(format!(
            "Expected 16kHz sample rate, got {} Hz",
            spec.sample_rate
        )));
    }

    if spec.channels != 1 {
        return Err(FFmpegError::ParseError(format!(
            "Expected mono audio, got {} channels",
            spec.channels
        )));
    }

    let samples: Vec<f32> = match spec.bits_per_sample {
        16 => reader
            .into_samples::<i16>()
            .filter_map(Result::ok)
            .map(|s| s as f32 / 32768.0)
            .collect(),
        32 => reader
            .into_samples::<i32>()
            .filter_map(Result::ok)
            .map(|s| s as f32 / 2147483648.0)
            .collect(),
        bits => {
            return Err(FFmpegError::ParseError(format!(
                "Unsupported bit depth: {}",
                bits
            )));
        }
    };

    Ok(samples)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, samples: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..samples {
            let sample = ((i as f32 / 100.0).sin() * 16000.0) as i16;
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[tokio::test]
    async fn test_extract_audio_input_not_found() {
        let result = extract_audio_for_transcription(
            Path::new("ffmpeg"),
            Path::new("/nonexistent/video.mp4"),
            Path::new("/tmp/output.wav"),
        )
        .await;

        assert!(matches!(result, Err(FFmpegError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_extract_audio_output_dir_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let input_path = temp_dir.path().join("input.mp4");
        std::fs::write(&input_path, b"test").unwrap();

        let result = extract_audio_for_transcription(
            Path::new("ffmpeg"),
            &input_path,
            Path::new("/nonexistent/dir/output.wav"),
        )
        .await;

        assert!(matches!(result, Err(FFmpegError::OutputError(_))));
    }

    #[test]
    fn test_load_audio_samples_file_not_found() {
        assert!(load_audio_samples(Path::new("/nonexistent/audio.wav")).is_err());
    }

    #[test]
    fn test_load_audio_samples_valid_wav() {
        let temp_dir = TempDir::new().unwrap();
        let wav_path = temp_dir.path().join("test.wav");
        write_wav(&wav_path, 1, 16000, 1600);

        let samples = load_audio_samples(&wav_path).unwrap();
        assert_eq!(samples.len(), 1600);
        assert!(samples.iter().all(|&s| (-1.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_load_audio_wrong_sample_rate() {
        let temp_dir = TempDir::new().unwrap();
        let wav_path = temp_dir.path().join("wrong_rate.wav");
        write_wav(&wav_path, 1, 44100, 1);

        let err = load_audio_samples(&wav_path).unwrap_err();
        assert!(err.to_string().contains("16kHz"));
    }

    #[test]
    fn test_load_audio_wrong_channels() {
        let temp_dir = TempDir::new().unwrap();
        let wav_path = temp_dir.path().join("stereo.wav");
        write_wav(&wav_path, 2, 16000, 2);

        let err = load_audio_samples(&wav_path).unwrap_err();
        assert!(err.to_string().contains("mono"));
    }
}
