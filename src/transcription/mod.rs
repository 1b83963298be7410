use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::WhisperConfig;

/// Transcription segment with timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
}

/// Complete transcription result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Full transcription text
    pub text: String,
    /// Individual segments with timestamps
    #[serde(default)]
    pub segments: Vec<TranscriptionSegment>,
    /// Detected language
    #[serde(default)]
    pub language: Option<String>,
}

/// Per-video transcription failures. The pipeline routes these to an
/// empty transcript; they never abort the run.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("audio file not found: {0}")]
    MissingAudio(PathBuf),

    #[error("whisper invocation failed: {0}")]
    CommandFailed(String),

    #[error("whisper output unreadable: {0}")]
    BadOutput(String),
}

/// Owned handle to the Whisper speech-to-text model. Loading probes the
/// binary once so a missing installation fails before any audio work;
/// the handle is then passed into the transcriber and lives for the
/// whole run.
#[derive(Debug, Clone)]
pub struct WhisperModel {
    model: String,
    language: String,
}

impl WhisperModel {
    pub async fn load(config: &WhisperConfig) -> Result<Self, TranscriptionError> {
        info!("🎤 Loading Whisper model: {}", config.model);

        let status = Command::new("whisper")
            .arg("--help")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| TranscriptionError::CommandFailed(format!("whisper not found: {}", e)))?;

        if !status.success() {
            return Err(TranscriptionError::CommandFailed(
                "whisper --help returned a failure status".to_string(),
            ));
        }

        Ok(Self {
            model: config.model.clone(),
            language: config.language.clone(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

/// Audio transcriber owning a loaded Whisper model handle
pub struct AudioTranscriber {
    model: WhisperModel,
}

/// Whisper's JSON output file (subset)
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    text: String,
}

impl AudioTranscriber {
    pub fn new(model: WhisperModel) -> Self {
        Self { model }
    }

    /// Transcribe one audio file, returning text, segments, and the
    /// detected language
    pub async fn transcribe(
        &self,
        audio_path: &Path,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        if !audio_path.exists() {
            return Err(TranscriptionError::MissingAudio(audio_path.to_path_buf()));
        }

        info!("🎤 Transcribing audio: {}", audio_path.display());

        let output_dir = audio_path
            .parent()
            .map(|p| p.join("transcripts"))
            .unwrap_or_else(|| PathBuf::from("transcripts"));

        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| TranscriptionError::CommandFailed(e.to_string()))?;

        let mut command = Command::new("whisper");
        command
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model.model)
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(&output_dir)
            .arg("--verbose")
            .arg("False");

        if self.model.language != "auto" {
            command.arg("--language").arg(&self.model.language);
        }

        let output = command
            .output()
            .await
            .map_err(|e| TranscriptionError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscriptionError::CommandFailed(stderr.trim().to_string()));
        }

        let stem = audio_path
            .file_stem()
            .unwrap_or_else(|| std::ffi::OsStr::new("audio"));
        let json_path = output_dir.join(stem).with_extension("json");

        let content = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| TranscriptionError::BadOutput(format!("{}: {}", json_path.display(), e)))?;

        let parsed: WhisperOutput = serde_json::from_str(&content)
            .map_err(|e| TranscriptionError::BadOutput(e.to_string()))?;

        let result = TranscriptionResult {
            text: parsed.text.trim().to_string(),
            segments: parsed
                .segments
                .into_iter()
                .map(|s| TranscriptionSegment {
                    start: s.start,
                    end: s.end,
                    text: s.text.trim().to_string(),
                })
                .collect(),
            language: parsed.language,
        };

        info!(
            "✅ Transcription completed: {} characters, {} segments",
            result.text.chars().count(),
            result.segments.len()
        );

        Ok(result)
    }
}

/// Fill in transcripts for every record flagged `needs_transcription`.
/// Failures leave the transcript empty so the analyzer skips the video;
/// they never abort the batch.
pub async fn transcribe_pending(
    transcriber: &AudioTranscriber,
    records: &mut [crate::fetcher::VideoRecord],
) {
    let pending = records.iter().filter(|r| r.needs_transcription).count();
    if pending == 0 {
        info!("✅ All videos have subtitles, no transcription needed");
        return;
    }

    info!("🎤 Transcribing {} videos without subtitles...", pending);

    for record in records.iter_mut().filter(|r| r.needs_transcription) {
        let Some(audio_file) = record.audio_file.clone() else {
            warn!("Video {} needs transcription but has no audio file", record.video_id);
            continue;
        };

        match transcriber.transcribe(&audio_file).await {
            Ok(result) => {
                debug!(
                    "Transcribed {}: {} chars",
                    record.video_id,
                    result.text.chars().count()
                );
                record.subtitle_text = result.text;
            }
            Err(e) => {
                warn!("Transcription failed for {}: {}", record.video_id, e);
                record.subtitle_text = String::new();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_output_parsing() {
        let json = r#"{
            "text": " 大家好 今天聊聊健身 ",
            "segments": [
                {"start": 0.0, "end": 2.5, "text": " 大家好"},
                {"start": 2.5, "end": 5.0, "text": " 今天聊聊健身"}
            ],
            "language": "zh"
        }"#;

        let parsed: WhisperOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text.trim(), "大家好 今天聊聊健身");
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.language.as_deref(), Some("zh"));
    }

    #[test]
    fn test_whisper_output_tolerates_missing_fields() {
        let parsed: WhisperOutput = serde_json::from_str("{}").unwrap();
        assert!(parsed.text.is_empty());
        assert!(parsed.segments.is_empty());
        assert!(parsed.language.is_none());
    }

    #[tokio::test]
    async fn test_missing_audio_is_typed_error() {
        let model = WhisperModel {
            model: "base".to_string(),
            language: "zh".to_string(),
        };
        let transcriber = AudioTranscriber::new(model);

        let err = transcriber
            .transcribe(Path::new("/nonexistent/audio.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::MissingAudio(_)));
    }
}
