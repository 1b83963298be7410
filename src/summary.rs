use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::{AnalysisOutcome, AnalysisRecord, VideoAnalysis};
use crate::config::Config;

/// Frequency counter that preserves first-encounter insertion order.
/// Ranking uses a stable descending sort, so equal counts keep the
/// order keys were first seen in. This tie-break is intentional and
/// pinned by tests; do not replace it with alphabetical ordering.
#[derive(Debug, Default)]
pub struct Counter {
    entries: Vec<(String, usize)>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((key.to_string(), 1)),
        }
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, keys: I) {
        for key in keys {
            self.add(&key);
        }
    }

    /// Entries ranked by descending count, optionally truncated
    pub fn into_ranked(mut self, limit: Option<usize>) -> Vec<(String, usize)> {
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        if let Some(limit) = limit {
            self.entries.truncate(limit);
        }
        self.entries
    }
}

/// Percentage with a zero-total guard (renders as 0%)
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Success,
    Failed,
}

/// Title-level statistics across all successfully analyzed videos
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TitlePatterns {
    /// Average title length in chars, rounded to 1 decimal
    pub average_length: f64,
    /// Most frequent title openings, top 10
    pub common_starts: Vec<(String, usize)>,
    /// Videos whose title uses each punctuation class (full- or
    /// half-width)
    pub punctuation_usage: Vec<(String, usize)>,
    /// First few titles for reference
    pub sample_titles: Vec<String>,
}

/// Aggregate statistical profile of a channel, recomputed from scratch
/// on every run. Distribution fields are only meaningful when `status`
/// is `success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub total_videos: usize,
    pub analyzed_videos: usize,
    pub status: SummaryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub video_types: Vec<(String, usize)>,
    pub primary_type: String,

    pub topics: Vec<(String, usize)>,
    pub style_features: Vec<(String, usize)>,
    pub top_keywords: Vec<String>,
    pub content_patterns: Vec<(String, usize)>,

    pub target_audiences: Vec<(String, usize)>,
    pub primary_audience: String,

    pub engagement_techniques: Vec<(String, usize)>,
    pub title_patterns: TitlePatterns,
}

impl ChannelSummary {
    fn empty_failed(total: usize, message: &str) -> Self {
        Self {
            total_videos: total,
            analyzed_videos: 0,
            status: SummaryStatus::Failed,
            message: Some(message.to_string()),
            video_types: Vec::new(),
            primary_type: "未知".to_string(),
            topics: Vec::new(),
            style_features: Vec::new(),
            top_keywords: Vec::new(),
            content_patterns: Vec::new(),
            target_audiences: Vec::new(),
            primary_audience: "大众".to_string(),
            engagement_techniques: Vec::new(),
            title_patterns: TitlePatterns::default(),
        }
    }
}

/// Reduces per-video analysis records into the channel-level summary
pub struct StyleSummarizer {
    top_keywords: usize,
}

impl StyleSummarizer {
    pub fn new(config: &Config) -> Self {
        Self {
            top_keywords: config.knowledge_base.top_keywords,
        }
    }

    pub fn summarize(&self, records: &[AnalysisRecord]) -> ChannelSummary {
        info!("📊 Summarizing {} analysis records", records.len());

        let successful: Vec<(&AnalysisRecord, &VideoAnalysis)> = records
            .iter()
            .filter_map(|r| match &r.outcome {
                AnalysisOutcome::Success { analysis, .. } => Some((r, analysis)),
                _ => None,
            })
            .collect();

        if successful.is_empty() {
            warn!("No successfully analyzed videos");
            return ChannelSummary::empty_failed(records.len(), "没有成功分析的视频");
        }

        let video_types = self.count_video_types(&successful);
        let target_audiences = self.count_target_audiences(&successful);

        let primary_type = video_types
            .first()
            .map(|(t, _)| t.clone())
            .unwrap_or_else(|| "未知".to_string());
        let primary_audience = target_audiences
            .first()
            .map(|(a, _)| a.clone())
            .unwrap_or_else(|| "大众".to_string());

        let summary = ChannelSummary {
            total_videos: records.len(),
            analyzed_videos: successful.len(),
            status: SummaryStatus::Success,
            message: None,
            video_types,
            primary_type,
            topics: self.count_topics(&successful),
            style_features: self.count_styles(&successful),
            top_keywords: self.extract_top_keywords(&successful),
            content_patterns: self.count_content_patterns(&successful),
            target_audiences,
            primary_audience,
            engagement_techniques: self.count_engagement_techniques(&successful),
            title_patterns: analyze_title_patterns(&successful),
        };

        info!(
            "✅ Summary completed: {} analyzed, primary type {}",
            summary.analyzed_videos, summary.primary_type
        );
        summary
    }

    fn count_video_types(
        &self,
        analyses: &[(&AnalysisRecord, &VideoAnalysis)],
    ) -> Vec<(String, usize)> {
        let mut counter = Counter::new();
        for (_, analysis) in analyses {
            counter.add(&analysis.video_type);
        }
        counter.into_ranked(None)
    }

    fn count_topics(
        &self,
        analyses: &[(&AnalysisRecord, &VideoAnalysis)],
    ) -> Vec<(String, usize)> {
        let mut counter = Counter::new();
        for (_, analysis) in analyses {
            counter.extend(analysis.topics.items());
        }
        counter.into_ranked(Some(self.top_keywords))
    }

    fn count_styles(
        &self,
        analyses: &[(&AnalysisRecord, &VideoAnalysis)],
    ) -> Vec<(String, usize)> {
        let mut counter = Counter::new();
        for (_, analysis) in analyses {
            // Comma-joined style strings split into individual labels
            counter.extend(analysis.style.split_items());
        }
        counter.into_ranked(Some(10))
    }

    fn extract_top_keywords(
        &self,
        analyses: &[(&AnalysisRecord, &VideoAnalysis)],
    ) -> Vec<String> {
        let mut counter = Counter::new();
        for (_, analysis) in analyses {
            counter.extend(analysis.keywords.iter().cloned());
        }
        counter
            .into_ranked(Some(self.top_keywords))
            .into_iter()
            .map(|(keyword, _)| keyword)
            .collect()
    }

    fn count_content_patterns(
        &self,
        analyses: &[(&AnalysisRecord, &VideoAnalysis)],
    ) -> Vec<(String, usize)> {
        let mut counter = Counter::new();
        for (_, analysis) in analyses {
            counter.add(&analysis.content_structure);
        }
        counter.into_ranked(Some(10))
    }

    fn count_target_audiences(
        &self,
        analyses: &[(&AnalysisRecord, &VideoAnalysis)],
    ) -> Vec<(String, usize)> {
        let mut counter = Counter::new();
        for (_, analysis) in analyses {
            counter.add(&analysis.target_audience);
        }
        counter.into_ranked(None)
    }

    fn count_engagement_techniques(
        &self,
        analyses: &[(&AnalysisRecord, &VideoAnalysis)],
    ) -> Vec<(String, usize)> {
        let mut counter = Counter::new();
        for (_, analysis) in analyses {
            counter.extend(analysis.engagement_techniques.items());
        }
        counter.into_ranked(Some(10))
    }
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// The "start" of a title: its first whitespace-delimited token, except
/// that an unspaced CJK opening is cut to its first two characters
/// (whole CJK titles have no whitespace to split on).
fn title_start(title: &str) -> Option<String> {
    let first = title.split_whitespace().next()?;
    let chars: Vec<char> = first.chars().collect();
    if chars.len() > 2 && is_cjk(chars[0]) {
        Some(chars[..2].iter().collect())
    } else {
        Some(first.to_string())
    }
}

/// Punctuation classes counted in both full-width and half-width forms
const PUNCTUATION_CLASSES: &[(&str, &[char])] = &[
    ("问号(?)", &['?', '?']),
    ("感叹号(!)", &['!', '!']),
    ("冒号(:)", &[':', ':']),
    ("括号()", &['(', '(']),
];

fn analyze_title_patterns(
    analyses: &[(&AnalysisRecord, &VideoAnalysis)],
) -> TitlePatterns {
    let titles: Vec<&str> = analyses.iter().map(|(r, _)| r.title.as_str()).collect();

    let average_length = if titles.is_empty() {
        0.0
    } else {
        let total: usize = titles.iter().map(|t| t.chars().count()).sum();
        round1(total as f64 / titles.len() as f64)
    };

    let mut starts = Counter::new();
    for title in &titles {
        if let Some(start) = title_start(title) {
            starts.add(&start);
        }
    }

    let punctuation_usage = PUNCTUATION_CLASSES
        .iter()
        .map(|(label, variants)| {
            let count = titles
                .iter()
                .filter(|t| variants.iter().any(|v| t.contains(*v)))
                .count();
            (label.to_string(), count)
        })
        .collect();

    TitlePatterns {
        average_length,
        common_starts: starts.into_ranked(Some(10)),
        punctuation_usage,
        sample_titles: titles.iter().take(5).map(|t| t.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisMethod, Labels};
    use crate::fetcher::VideoRecord;

    fn video(id: &str, title: &str) -> VideoRecord {
        VideoRecord {
            video_id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            url: String::new(),
            channel: String::new(),
            duration: 0.0,
            view_count: 0,
            like_count: 0,
            upload_date: String::new(),
            subtitle_text: String::new(),
            needs_transcription: false,
            audio_file: None,
        }
    }

    fn success_record(id: &str, title: &str, analysis: VideoAnalysis) -> AnalysisRecord {
        AnalysisRecord::success(&video(id, title), analysis, AnalysisMethod::Keyword)
    }

    fn analysis_with(video_type: &str, audience: &str, style: Labels) -> VideoAnalysis {
        VideoAnalysis {
            video_type: video_type.to_string(),
            topics: Labels::Many(vec!["主题".to_string()]),
            style,
            tone: "友好亲切".to_string(),
            target_audience: audience.to_string(),
            content_structure: "标准结构".to_string(),
            key_points: vec![],
            keywords: vec!["关键词".to_string()],
            engagement_techniques: Labels::Many(vec!["内容吸引人".to_string()]),
        }
    }

    fn summarizer() -> StyleSummarizer {
        StyleSummarizer::new(&Config::default())
    }

    #[test]
    fn test_counter_insertion_order_tie_break() {
        let mut counter = Counter::new();
        for key in ["b", "a", "c", "a", "c"] {
            counter.add(key);
        }

        let ranked = counter.into_ranked(None);
        // a and c both count 2: a was first encountered, so it ranks
        // ahead; b (count 1) trails
        assert_eq!(
            ranked,
            vec![
                ("a".to_string(), 2),
                ("c".to_string(), 2),
                ("b".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_percentage_guard() {
        assert_eq!(percentage(1, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }

    #[test]
    fn test_empty_success_set_yields_failed_summary() {
        let records = vec![AnalysisRecord::skipped(&video("v1", "标题"), "字幕内容太短")];
        let summary = summarizer().summarize(&records);

        assert_eq!(summary.status, SummaryStatus::Failed);
        assert_eq!(summary.total_videos, 1);
        assert_eq!(summary.analyzed_videos, 0);
        assert!(summary.video_types.is_empty());
        assert!(summary.topics.is_empty());
        assert_eq!(summary.primary_type, "未知");
        assert_eq!(summary.primary_audience, "大众");
    }

    #[test]
    fn test_primary_type_and_audience_mode_with_tie_break() {
        let records = vec![
            success_record("v1", "一", analysis_with("教程", "学生", Labels::One("口语化".into()))),
            success_record("v2", "二", analysis_with("美食", "大众", Labels::One("口语化".into()))),
            success_record("v3", "三", analysis_with("美食", "学生", Labels::One("口语化".into()))),
            success_record("v4", "四", analysis_with("教程", "大众", Labels::One("口语化".into()))),
        ];

        let summary = summarizer().summarize(&records);

        // 教程 and 美食 tie at 2; 教程 was encountered first
        assert_eq!(summary.primary_type, "教程");
        assert_eq!(summary.video_types[0], ("教程".to_string(), 2));
        assert_eq!(summary.video_types[1], ("美食".to_string(), 2));

        // 学生 and 大众 tie at 2; 学生 was encountered first
        assert_eq!(summary.primary_audience, "学生");
    }

    #[test]
    fn test_style_strings_split_on_commas() {
        let records = vec![
            success_record(
                "v1",
                "一",
                analysis_with("教程", "大众", Labels::One("幽默风趣, 口语化".into())),
            ),
            success_record(
                "v2",
                "二",
                analysis_with(
                    "教程",
                    "大众",
                    Labels::Many(vec!["口语化".to_string(), "专业严肃".to_string()]),
                ),
            ),
        ];

        let summary = summarizer().summarize(&records);
        assert_eq!(
            summary.style_features,
            vec![
                ("口语化".to_string(), 2),
                ("幽默风趣".to_string(), 1),
                ("专业严肃".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_common_starts_for_cjk_titles() {
        let records = vec![
            success_record("v1", "如何做蛋糕", analysis_with("教程", "大众", Labels::One("口语化".into()))),
            success_record("v2", "如何健身", analysis_with("教程", "大众", Labels::One("口语化".into()))),
            success_record("v3", "游记分享", analysis_with("旅游", "大众", Labels::One("口语化".into()))),
        ];

        let summary = summarizer().summarize(&records);
        let top = &summary.title_patterns.common_starts[0];
        assert_eq!(top, &("如何".to_string(), 2));
    }

    #[test]
    fn test_common_starts_for_spaced_titles() {
        let records = vec![
            success_record("v1", "Top 10 tips", analysis_with("教程", "大众", Labels::One("口语化".into()))),
            success_record("v2", "Top 5 mistakes", analysis_with("教程", "大众", Labels::One("口语化".into()))),
        ];

        let summary = summarizer().summarize(&records);
        assert_eq!(
            summary.title_patterns.common_starts[0],
            ("Top".to_string(), 2)
        );
    }

    #[test]
    fn test_title_punctuation_counts_both_widths() {
        let records = vec![
            success_record("v1", "这是什么?", analysis_with("教程", "大众", Labels::One("口语化".into()))),
            success_record("v2", "真的吗? 太棒了!", analysis_with("教程", "大众", Labels::One("口语化".into()))),
            success_record("v3", "说明: 完整版(上)", analysis_with("教程", "大众", Labels::One("口语化".into()))),
        ];

        let summary = summarizer().summarize(&records);
        let punctuation = &summary.title_patterns.punctuation_usage;

        assert_eq!(punctuation[0], ("问号(?)".to_string(), 2));
        assert_eq!(punctuation[1], ("感叹号(!)".to_string(), 1));
        assert_eq!(punctuation[2], ("冒号(:)".to_string(), 1));
        assert_eq!(punctuation[3], ("括号()".to_string(), 1));
    }

    #[test]
    fn test_average_title_length_rounded() {
        let records = vec![
            success_record("v1", "四个字的", analysis_with("教程", "大众", Labels::One("口语化".into()))),
            success_record("v2", "五个字标题", analysis_with("教程", "大众", Labels::One("口语化".into()))),
        ];

        let summary = summarizer().summarize(&records);
        assert_eq!(summary.title_patterns.average_length, 4.5);
    }

    #[test]
    fn test_distribution_percentages_sum_to_100() {
        let records = vec![
            success_record("v1", "一", analysis_with("教程", "大众", Labels::One("口语化".into()))),
            success_record("v2", "二", analysis_with("教程", "大众", Labels::One("口语化".into()))),
            success_record("v3", "三", analysis_with("美食", "大众", Labels::One("口语化".into()))),
        ];

        let summary = summarizer().summarize(&records);
        let total: f64 = summary
            .video_types
            .iter()
            .map(|(_, count)| percentage(*count, summary.analyzed_videos))
            .sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_topic_distribution_truncated_to_top_n() {
        let mut config = Config::default();
        config.knowledge_base.top_keywords = 2;
        let summarizer = StyleSummarizer::new(&config);

        let mut analysis = analysis_with("教程", "大众", Labels::One("口语化".into()));
        analysis.topics = Labels::Many(vec![
            "一".to_string(),
            "二".to_string(),
            "三".to_string(),
        ]);

        let records = vec![success_record("v1", "标题", analysis)];
        let summary = summarizer.summarize(&records);
        assert_eq!(summary.topics.len(), 2);
    }
}
