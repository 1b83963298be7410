/// YouTube Channel Style Analyzer
///
/// Fetches a creator's published videos, derives a per-video content
/// profile (AI-backed with a deterministic keyword fallback), and
/// aggregates the profiles into a channel-level style knowledge base.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod fetcher;
pub mod knowledge;
pub mod llm;
pub mod summary;
pub mod transcription;

// Re-export main types for easy access
pub use crate::analysis::{
    AnalysisMethod, AnalysisOutcome, AnalysisRecord, AnalysisStrategy, ContentAnalyzer,
    VideoAnalysis,
};
pub use crate::cache::CacheStore;
pub use crate::config::Config;
pub use crate::fetcher::{ChannelFetcher, FetchError, VideoRecord};
pub use crate::knowledge::KnowledgeBaseGenerator;
pub use crate::llm::{AiError, AiProvider, Llm, LlmConfig};
pub use crate::summary::{ChannelSummary, StyleSummarizer, SummaryStatus};
pub use crate::transcription::{AudioTranscriber, TranscriptionResult, WhisperModel};
