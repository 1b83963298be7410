use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::cache::CacheStore;
use crate::config::Config;

/// One video's metadata plus resolved transcript text. Created by the
/// fetch stage, enriched with `subtitle_text` by subtitle extraction or
/// transcription, then read-only for the rest of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub upload_date: String,
    #[serde(default)]
    pub subtitle_text: String,
    #[serde(default)]
    pub needs_transcription: bool,
    #[serde(default)]
    pub audio_file: Option<PathBuf>,
}

/// Whole-channel fetch failures. Per-video problems are logged and the
/// video dropped; only these abort the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch channel data: {0}")]
    Unavailable(String),

    #[error("channel contains no videos")]
    EmptyChannel,
}

/// yt-dlp flat playlist payload (subset)
#[derive(Debug, Deserialize)]
struct PlaylistInfo {
    channel: Option<String>,
    uploader: Option<String>,
    #[serde(default)]
    entries: Vec<Option<PlaylistEntry>>,
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    id: Option<String>,
    #[serde(default)]
    title: String,
}

/// yt-dlp single-video payload (subset)
#[derive(Debug, Deserialize)]
struct VideoDetails {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    view_count: Option<u64>,
    #[serde(default)]
    like_count: Option<u64>,
    #[serde(default)]
    upload_date: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
}

/// YouTube channel data fetcher backed by yt-dlp
pub struct ChannelFetcher {
    max_videos: usize,
    subtitle_languages: Vec<String>,
    audio_format: String,
    audio_quality: String,
    raw_dir: PathBuf,
}

impl ChannelFetcher {
    pub fn new(config: &Config) -> Self {
        Self {
            max_videos: config.youtube.max_videos,
            subtitle_languages: config.youtube.subtitle_languages.clone(),
            audio_format: config.youtube.audio_format.clone(),
            audio_quality: config.youtube.audio_quality.clone(),
            raw_dir: config.system.data_dir.join("raw"),
        }
    }

    /// Verify the yt-dlp binary is reachable, failing loudly before any
    /// network work starts
    pub async fn probe() -> Result<(), FetchError> {
        let status = Command::new("yt-dlp")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| FetchError::Unavailable(format!("yt-dlp not found: {}", e)))?;

        if !status.success() {
            return Err(FetchError::Unavailable(
                "yt-dlp --version returned a failure status".to_string(),
            ));
        }

        Ok(())
    }

    /// Fetch the complete enriched record list for a channel. A cache hit
    /// short-circuits the entire live fetch; a successful live fetch is
    /// written back to the cache (best-effort).
    pub async fn fetch_all(
        &self,
        channel_url: &str,
        cache: Option<&CacheStore>,
    ) -> Result<Vec<VideoRecord>, FetchError> {
        Url::parse(channel_url)
            .map_err(|e| FetchError::Unavailable(format!("invalid channel URL: {}", e)))?;

        info!("🔍 Fetching channel video list: {}", channel_url);
        let (channel_name, entries) = self.fetch_channel_videos(channel_url).await?;

        if entries.is_empty() {
            return Err(FetchError::EmptyChannel);
        }

        if let Some(cache) = cache {
            if let Some(cached) = cache.get(&channel_name).await {
                info!("📚 Using cached data for channel: {}", channel_name);
                return Ok(cached);
            }
        }

        info!("📹 Processing {} videos...", entries.len());

        let mut records = Vec::new();
        for (index, (video_id, _)) in entries.iter().enumerate() {
            let video_url = format!("https://www.youtube.com/watch?v={}", video_id);
            debug!("Fetching video {}/{}: {}", index + 1, entries.len(), video_id);

            match self.fetch_video_record(&video_url, video_id, &channel_name).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!("Failed to process video {}: {}", video_id, e);
                }
            }
        }

        if records.is_empty() {
            return Err(FetchError::Unavailable(
                "no videos could be fetched".to_string(),
            ));
        }

        info!("✅ Fetched {} video records", records.len());

        if let Some(cache) = cache {
            cache.put(&channel_name, &records).await;
        }

        Ok(records)
    }

    /// List channel uploads via a flat playlist extraction
    async fn fetch_channel_videos(
        &self,
        channel_url: &str,
    ) -> Result<(String, Vec<(String, String)>), FetchError> {
        let mut command = Command::new("yt-dlp");
        command
            .arg("-J")
            .arg("--flat-playlist")
            .arg("--no-warnings");

        if self.max_videos > 0 {
            command.arg("--playlist-end").arg(self.max_videos.to_string());
        }

        let output = command
            .arg(channel_url)
            .output()
            .await
            .map_err(|e| FetchError::Unavailable(format!("failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Unavailable(format!(
                "yt-dlp playlist extraction failed: {}",
                stderr.trim()
            )));
        }

        let playlist: PlaylistInfo = serde_json::from_slice(&output.stdout)
            .map_err(|e| FetchError::Unavailable(format!("invalid playlist JSON: {}", e)))?;

        let channel_name = playlist
            .channel
            .or(playlist.uploader)
            .unwrap_or_else(|| "Unknown_Channel".to_string());

        info!("📺 Channel name: {}", channel_name);

        let entries: Vec<(String, String)> = playlist
            .entries
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.id.map(|id| (id, entry.title)))
            .collect();

        Ok((channel_name, entries))
    }

    /// Fetch one video's details and resolve its transcript source
    async fn fetch_video_record(
        &self,
        video_url: &str,
        video_id: &str,
        channel_name: &str,
    ) -> Result<VideoRecord> {
        let details = self.fetch_video_details(video_url).await?;

        let mut record = VideoRecord {
            video_id: details.id,
            title: details.title,
            description: details.description,
            url: video_url.to_string(),
            channel: details
                .channel
                .or(details.uploader)
                .unwrap_or_else(|| channel_name.to_string()),
            duration: details.duration.unwrap_or(0.0),
            view_count: details.view_count.unwrap_or(0),
            like_count: details.like_count.unwrap_or(0),
            upload_date: details.upload_date.unwrap_or_default(),
            subtitle_text: String::new(),
            needs_transcription: false,
            audio_file: None,
        };

        match self.download_subtitles(video_url, video_id).await {
            Ok(Some(subtitle_file)) => {
                let content = tokio::fs::read_to_string(&subtitle_file).await?;
                record.subtitle_text = extract_vtt_text(&content);
            }
            Ok(None) => {
                warn!("No subtitles for {}, downloading audio for transcription", video_id);
                record.needs_transcription = true;
                match self.download_audio(video_url, video_id).await {
                    Ok(audio_file) => record.audio_file = Some(audio_file),
                    Err(e) => {
                        warn!("Audio download failed for {}: {}", video_id, e);
                    }
                }
            }
            Err(e) => {
                warn!("Subtitle download failed for {}: {}", video_id, e);
                record.needs_transcription = true;
            }
        }

        Ok(record)
    }

    async fn fetch_video_details(&self, video_url: &str) -> Result<VideoDetails> {
        let output = Command::new("yt-dlp")
            .arg("-J")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg(video_url)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("yt-dlp details failed: {}", stderr.trim()));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    /// Download subtitles, preferring manual tracks and falling back to
    /// auto-generated captions. Returns the VTT path if one landed.
    async fn download_subtitles(
        &self,
        video_url: &str,
        video_id: &str,
    ) -> Result<Option<PathBuf>> {
        let subtitle_dir = self.raw_dir.join("subtitles");
        tokio::fs::create_dir_all(&subtitle_dir).await?;

        let output_template = subtitle_dir.join(format!("{}.%(ext)s", video_id));

        let output = Command::new("yt-dlp")
            .arg("--skip-download")
            .arg("--write-subs")
            .arg("--write-auto-subs")
            .arg("--sub-langs")
            .arg(self.subtitle_languages.join(","))
            .arg("--sub-format")
            .arg("vtt")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&output_template)
            .arg(video_url)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("yt-dlp subtitle download failed: {}", stderr.trim()));
        }

        find_subtitle_file(&subtitle_dir, video_id).await
    }

    /// Download best audio for a video that has no usable subtitles
    async fn download_audio(&self, video_url: &str, video_id: &str) -> Result<PathBuf> {
        let audio_dir = self.raw_dir.join("audio");
        tokio::fs::create_dir_all(&audio_dir).await?;

        let audio_path = audio_dir.join(format!("{}.{}", video_id, self.audio_format));
        if audio_path.exists() {
            debug!("Audio file already exists: {}", audio_path.display());
            return Ok(audio_path);
        }

        let output_template = audio_dir.join(format!("{}.%(ext)s", video_id));

        let output = Command::new("yt-dlp")
            .arg("-f")
            .arg("bestaudio/best")
            .arg("-x")
            .arg("--audio-format")
            .arg(&self.audio_format)
            .arg("--audio-quality")
            .arg(&self.audio_quality)
            .arg("--no-warnings")
            .arg("-o")
            .arg(&output_template)
            .arg(video_url)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("yt-dlp audio download failed: {}", stderr.trim()));
        }

        if audio_path.exists() {
            Ok(audio_path)
        } else {
            Err(anyhow!("audio file missing after download"))
        }
    }
}

/// Locate a downloaded VTT file for a video; multiple language tracks
/// resolve to the lexicographically first one
async fn find_subtitle_file(subtitle_dir: &Path, video_id: &str) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(subtitle_dir).await?;
    let mut matches = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(video_id) && name.ends_with(".vtt") {
            matches.push(path);
        }
    }

    matches.sort();
    Ok(matches.into_iter().next())
}

/// Extract plain text from WebVTT content: drop the header block, cue
/// timings, cue numbers, and consecutive duplicate lines (auto captions
/// repeat rolling lines).
pub fn extract_vtt_text(content: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty()
            || line.starts_with("WEBVTT")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.contains("-->")
            || line.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }

        if lines.last().map(|l| l == line).unwrap_or(false) {
            continue;
        }

        lines.push(line.to_string());
    }

    lines.join("\n")
}
