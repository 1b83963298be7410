pub mod keyword;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::fetcher::VideoRecord;
use crate::llm::{create_llm, AiError, ChatMessage, Llm, LlmConfig};

/// Which analysis path produced a success record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    Ai,
    Keyword,
}

/// A field the AI returns either as a bare string or as a list. The
/// rule-based path emits a comma-joined string for `style`, matching
/// the shape the aggregation layer splits on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Labels {
    One(String),
    Many(Vec<String>),
}

impl Labels {
    /// Element-wise items; a bare string is a single item
    pub fn items(&self) -> Vec<String> {
        match self {
            Labels::One(value) => vec![value.clone()],
            Labels::Many(values) => values.clone(),
        }
    }

    /// Human-readable rendering for reports
    pub fn display(&self) -> String {
        match self {
            Labels::One(value) => value.clone(),
            Labels::Many(values) => values.join(", "),
        }
    }

    /// Items with comma-splitting applied to bare strings
    pub fn split_items(&self) -> Vec<String> {
        match self {
            Labels::One(value) => value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Labels::Many(values) => values.clone(),
        }
    }
}

/// The nine-field content profile shared by both analysis paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAnalysis {
    pub video_type: String,
    pub topics: Labels,
    pub style: Labels,
    pub tone: String,
    pub target_audience: String,
    pub content_structure: String,
    pub key_points: Vec<String>,
    pub keywords: Vec<String>,
    pub engagement_techniques: Labels,
}

/// Structured content profile for one video. Exactly one outcome is
/// active; records are created once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub video_id: String,
    pub title: String,
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "analysis_status", rename_all = "lowercase")]
pub enum AnalysisOutcome {
    Success {
        #[serde(flatten)]
        analysis: VideoAnalysis,
        analysis_method: AnalysisMethod,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

impl AnalysisRecord {
    pub fn success(video: &VideoRecord, analysis: VideoAnalysis, method: AnalysisMethod) -> Self {
        Self {
            video_id: video.video_id.clone(),
            title: video.title.clone(),
            outcome: AnalysisOutcome::Success {
                analysis,
                analysis_method: method,
            },
        }
    }

    pub fn skipped(video: &VideoRecord, reason: &str) -> Self {
        Self {
            video_id: video.video_id.clone(),
            title: video.title.clone(),
            outcome: AnalysisOutcome::Skipped {
                reason: reason.to_string(),
            },
        }
    }

    pub fn failed(video: &VideoRecord, error: String) -> Self {
        Self {
            video_id: video.video_id.clone(),
            title: video.title.clone(),
            outcome: AnalysisOutcome::Failed { error },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AnalysisOutcome::Success { .. })
    }

    pub fn analysis(&self) -> Option<&VideoAnalysis> {
        match &self.outcome {
            AnalysisOutcome::Success { analysis, .. } => Some(analysis),
            _ => None,
        }
    }
}

/// Analysis strategy, resolved once at construction. AI-backed requires
/// `analysis.use_ai` plus a provider credential; anything less runs the
/// rule-based path for the whole batch.
pub enum AnalysisStrategy {
    AiBacked(Box<dyn Llm>),
    RuleBased,
}

/// Per-video content analyzer with a two-tier strategy
pub struct ContentAnalyzer {
    strategy: AnalysisStrategy,
    min_subtitle_length: usize,
}

impl ContentAnalyzer {
    pub fn new(config: &Config) -> Self {
        Self {
            strategy: Self::resolve_strategy(config),
            min_subtitle_length: config.analysis.min_subtitle_length,
        }
    }

    /// Construct with an explicit strategy (used by tests and callers
    /// that already hold a client)
    pub fn with_strategy(strategy: AnalysisStrategy, min_subtitle_length: usize) -> Self {
        Self {
            strategy,
            min_subtitle_length,
        }
    }

    fn resolve_strategy(config: &Config) -> AnalysisStrategy {
        if !config.analysis.use_ai {
            info!("AI analysis disabled, using keyword analysis");
            return AnalysisStrategy::RuleBased;
        }

        let provider = config.analysis.ai_provider;
        let credentials = config.provider_credentials();

        let Some(api_key) = credentials.api_key.clone().filter(|k| !k.is_empty()) else {
            warn!(
                "No API key configured for {:?}, using keyword analysis",
                provider
            );
            return AnalysisStrategy::RuleBased;
        };

        let llm_config = LlmConfig::for_provider(provider, api_key, &credentials.model);
        match create_llm(&llm_config) {
            Ok(llm) => {
                info!("✅ AI analysis enabled ({:?}, model: {})", provider, llm_config.model);
                AnalysisStrategy::AiBacked(llm)
            }
            Err(e) => {
                warn!("Failed to initialize {:?} client: {}, using keyword analysis", provider, e);
                AnalysisStrategy::RuleBased
            }
        }
    }

    /// Analyze a single video. AI failures degrade to the rule-based
    /// path; the error channel is reserved for unexpected conditions,
    /// which the batch coordinator converts to `failed` records.
    pub async fn analyze(&self, video: &VideoRecord) -> Result<AnalysisRecord> {
        if video.subtitle_text.chars().count() < self.min_subtitle_length {
            warn!("Video {} subtitle too short, skipping analysis", video.video_id);
            return Ok(AnalysisRecord::skipped(video, "字幕内容太短"));
        }

        let record = match &self.strategy {
            AnalysisStrategy::AiBacked(llm) => {
                match self.analyze_with_ai(llm.as_ref(), video).await {
                    Ok(analysis) => {
                        info!("AI analysis completed: {}", video.video_id);
                        AnalysisRecord::success(video, analysis, AnalysisMethod::Ai)
                    }
                    Err(e) => self.degrade(video, e),
                }
            }
            AnalysisStrategy::RuleBased => {
                let analysis = keyword::analyze(video);
                info!("Keyword analysis completed: {}", video.video_id);
                AnalysisRecord::success(video, analysis, AnalysisMethod::Keyword)
            }
        };

        Ok(record)
    }

    /// The fallback transition, taken only on AI availability or parse
    /// failures. Logged, never surfaced as an error.
    fn degrade(&self, video: &VideoRecord, err: AiError) -> AnalysisRecord {
        warn!(
            "AI analysis failed for {} ({}), degrading to keyword analysis",
            video.video_id, err
        );
        AnalysisRecord::success(video, keyword::analyze(video), AnalysisMethod::Keyword)
    }

    async fn analyze_with_ai(
        &self,
        llm: &dyn Llm,
        video: &VideoRecord,
    ) -> Result<VideoAnalysis, AiError> {
        let prompt = build_analysis_prompt(video);

        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: "你是一个专业的视频内容分析专家,擅长分析 YouTube 视频的风格和特点。"
                    .to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: prompt,
            },
        ];

        let response = llm
            .chat(messages)
            .await
            .map_err(|e| AiError::Unavailable(e.to_string()))?;

        parse_ai_payload(&response.content)
    }

    /// Analyze a full batch sequentially, one record per input in input
    /// order. A per-video error becomes a `failed` record; it never
    /// aborts the batch.
    pub async fn analyze_all(&self, videos: &[VideoRecord]) -> Vec<AnalysisRecord> {
        info!("🔎 Analyzing {} videos", videos.len());

        let mut results = Vec::with_capacity(videos.len());
        for (index, video) in videos.iter().enumerate() {
            info!(
                "Analyzing video {}/{}: {} - {}",
                index + 1,
                videos.len(),
                video.video_id,
                video.title
            );

            let record = match self.analyze(video).await {
                Ok(record) => record,
                Err(e) => {
                    error!("Analysis error for {}: {}", video.video_id, e);
                    AnalysisRecord::failed(video, e.to_string())
                }
            };
            results.push(record);
        }

        let successful = results.iter().filter(|r| r.is_success()).count();
        info!("✅ Analyzed {}/{} videos successfully", successful, results.len());

        results
    }
}

const MAX_DESCRIPTION_CHARS: usize = 500;
const MAX_TRANSCRIPT_CHARS: usize = 3000;

/// Truncate to a char limit, appending an ellipsis marker when
/// anything was cut
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

/// Build the fixed-schema analysis prompt for one video
fn build_analysis_prompt(video: &VideoRecord) -> String {
    let description = if video.description.is_empty() {
        "无".to_string()
    } else {
        truncate_chars(&video.description, MAX_DESCRIPTION_CHARS)
    };
    let subtitle = truncate_chars(&video.subtitle_text, MAX_TRANSCRIPT_CHARS);

    format!(
        r#"请分析以下 YouTube 视频的内容,并以 JSON 格式返回分析结果。

视频标题: {title}

视频描述: {description}

字幕内容:
{subtitle}

请提供以下分析(用中文回答,以 JSON 格式返回):
1. video_type: 视频类型(如: 教程、娱乐、评测、Vlog、知识分享、搞笑、美食、旅游等)
2. topics: 主要话题/主题(列表,3-5个关键词)
3. style: 语言风格特点(如: 幽默风趣、专业严肃、口语化、激情澎湃等)
4. tone: 语气特点(如: 轻松、正式、亲切、激励等)
5. target_audience: 目标受众(如: 年轻人、专业人士、学生、大众等)
6. content_structure: 内容结构特点(如: 开场引入、主体讲解、结尾总结)
7. key_points: 核心要点(列表,2-3个要点)
8. keywords: 高频关键词(列表,5-10个)
9. engagement_techniques: 吸引观众的技巧(列表,如: 设置悬念、互动提问、视觉效果等)

返回格式示例:
{{
  "video_type": "知识分享",
  "topics": ["人工智能", "机器学习", "技术趋势"],
  "style": "专业且通俗易懂",
  "tone": "正式但友好",
  "target_audience": "技术爱好者和初学者",
  "content_structure": "问题引入 -> 概念解释 -> 案例说明 -> 总结",
  "key_points": ["AI的基本原理", "实际应用场景", "未来发展方向"],
  "keywords": ["人工智能", "算法", "数据", "应用", "未来"],
  "engagement_techniques": ["使用生活化例子", "设置思考问题", "视觉化展示"]
}}

请直接返回 JSON,不要包含其他说明文字。"#,
        title = video.title,
        description = description,
        subtitle = subtitle,
    )
}

/// Take the substring from the first `{` to the last `}` (the model
/// often wraps the object in prose or code fences)
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse a free-form model response into the nine-field schema
fn parse_ai_payload(content: &str) -> Result<VideoAnalysis, AiError> {
    let json = extract_json_object(content)
        .ok_or_else(|| AiError::Malformed("no JSON object in response".to_string()))?;

    serde_json::from_str::<VideoAnalysis>(json).map_err(|e| AiError::Malformed(e.to_string()))
}
