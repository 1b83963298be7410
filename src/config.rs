use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::llm::AiProvider;

/// Configuration for the channel analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// YouTube fetch settings
    pub youtube: YoutubeConfig,

    /// Whisper transcription settings
    pub whisper: WhisperConfig,

    /// Content analysis settings
    pub analysis: AnalysisConfig,

    /// AI provider credentials and models
    #[serde(default)]
    pub api: ApiConfig,

    /// Knowledge base generation settings
    pub knowledge_base: KnowledgeBaseConfig,

    /// Storage and cache settings
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeConfig {
    /// Maximum number of videos to fetch per channel (0 = no limit)
    pub max_videos: usize,

    /// Subtitle language priority list passed to yt-dlp
    pub subtitle_languages: Vec<String>,

    /// Audio container format for downloads needing transcription
    pub audio_format: String,

    /// Audio quality passed to yt-dlp's extractor
    pub audio_quality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperConfig {
    /// Whisper model name (tiny/base/small/medium/large)
    pub model: String,

    /// Language hint ("auto" enables detection)
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Enable AI-backed analysis (falls back to keyword rules when
    /// credentials are missing)
    pub use_ai: bool,

    /// Which hosted provider to use when AI analysis is enabled
    pub ai_provider: AiProvider,

    /// Minimum subtitle length (chars) below which a video is skipped
    pub min_subtitle_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub openai: ProviderCredentials,

    #[serde(default)]
    pub anthropic: ProviderCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderCredentials {
    /// API key; the matching environment variable takes precedence
    pub api_key: Option<String>,

    /// Model identifier; empty selects the provider default
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Truncation for ranked topic/keyword distributions
    pub top_keywords: usize,

    /// Generate one Markdown file per analyzed video
    pub include_video_details: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Reuse cached channel data instead of refetching
    pub cache_enabled: bool,

    /// Directory for raw downloads and the channel cache
    pub data_dir: PathBuf,

    /// Directory for generated knowledge bases
    pub output_dir: PathBuf,
}

impl Config {
    /// Load configuration from file, searching the usual locations
    pub fn load(explicit_path: Option<&str>) -> Result<Self> {
        let default_paths = [
            "channel-analyzer.toml",
            "config/channel-analyzer.toml",
            "~/.config/channel-analyzer/config.toml",
        ];

        let candidates: Vec<&str> = match explicit_path {
            Some(p) => vec![p],
            None => default_paths.to_vec(),
        };

        for path in &candidates {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config.with_env_overrides());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        if explicit_path.is_some() {
            return Err(anyhow!("configuration file not found: {}", candidates[0]));
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Self::default().with_env_overrides())
    }

    /// Apply environment variable overrides on top of file values
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.api.openai.api_key = Some(key);
            }
        }

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.is_empty() {
                self.api.anthropic.api_key = Some(key);
            }
        }

        if let Ok(max) = std::env::var("CHANNEL_ANALYZER_MAX_VIDEOS") {
            if let Ok(parsed) = max.parse() {
                self.youtube.max_videos = parsed;
            }
        }

        self
    }

    /// Credentials for the configured AI provider
    pub fn provider_credentials(&self) -> &ProviderCredentials {
        match self.analysis.ai_provider {
            AiProvider::OpenAi => &self.api.openai,
            AiProvider::Anthropic => &self.api.anthropic,
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.analysis.min_subtitle_length == 0 {
            return Err(anyhow!("min_subtitle_length must be greater than 0"));
        }

        if self.knowledge_base.top_keywords == 0 {
            return Err(anyhow!("top_keywords must be greater than 0"));
        }

        if self.youtube.subtitle_languages.is_empty() {
            return Err(anyhow!("subtitle_languages must not be empty"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            youtube: YoutubeConfig {
                max_videos: 50,
                subtitle_languages: vec![
                    "zh-Hans".to_string(),
                    "zh".to_string(),
                    "en".to_string(),
                ],
                audio_format: "mp3".to_string(),
                audio_quality: "128K".to_string(),
            },
            whisper: WhisperConfig {
                model: "base".to_string(),
                language: "zh".to_string(),
            },
            analysis: AnalysisConfig {
                use_ai: true,
                ai_provider: AiProvider::OpenAi,
                min_subtitle_length: 50,
            },
            api: ApiConfig::default(),
            knowledge_base: KnowledgeBaseConfig {
                top_keywords: 20,
                include_video_details: true,
            },
            system: SystemConfig {
                cache_enabled: true,
                data_dir: PathBuf::from("data"),
                output_dir: PathBuf::from("output"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.min_subtitle_length, 50);
        assert_eq!(config.knowledge_base.top_keywords, 20);
        assert!(config.system.cache_enabled);
        assert_eq!(config.analysis.ai_provider, AiProvider::OpenAi);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let mut bad = Config::default();
        bad.analysis.min_subtitle_length = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_parse_config_file() {
        let toml_str = r#"
            [youtube]
            max_videos = 10
            subtitle_languages = ["zh"]
            audio_format = "mp3"
            audio_quality = "128K"

            [whisper]
            model = "base"
            language = "zh"

            [analysis]
            use_ai = false
            ai_provider = "anthropic"
            min_subtitle_length = 80

            [knowledge_base]
            top_keywords = 15
            include_video_details = false

            [system]
            cache_enabled = false
            data_dir = "d"
            output_dir = "o"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(!config.analysis.use_ai);
        assert_eq!(config.analysis.ai_provider, AiProvider::Anthropic);
        assert_eq!(config.analysis.min_subtitle_length, 80);
        assert_eq!(config.knowledge_base.top_keywords, 15);
    }
}
