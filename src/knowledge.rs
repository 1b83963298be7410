use anyhow::Result;
use chrono::Local;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

use crate::analysis::{AnalysisOutcome, AnalysisRecord, VideoAnalysis};
use crate::cache::sanitize_channel_name;
use crate::config::Config;
use crate::fetcher::VideoRecord;
use crate::summary::{percentage, ChannelSummary, SummaryStatus};

/// Renders the channel knowledge base: Markdown summary, statistics,
/// learning guide, and optional per-video detail files
pub struct KnowledgeBaseGenerator {
    output_dir: PathBuf,
    include_video_details: bool,
}

impl KnowledgeBaseGenerator {
    pub fn new(config: &Config) -> Self {
        Self {
            output_dir: config.system.output_dir.clone(),
            include_video_details: config.knowledge_base.include_video_details,
        }
    }

    /// Generate the full knowledge base, returning the channel directory
    pub async fn generate(
        &self,
        channel_name: &str,
        summary: &ChannelSummary,
        records: &[AnalysisRecord],
        videos: &[VideoRecord],
    ) -> Result<PathBuf> {
        info!("📝 Generating knowledge base for: {}", channel_name);

        let channel_dir = self.output_dir.join(sanitize_channel_name(channel_name));
        tokio::fs::create_dir_all(&channel_dir).await?;

        let summary_doc = render_summary_doc(channel_name, summary);
        tokio::fs::write(channel_dir.join("summary.md"), summary_doc).await?;

        let stats_doc = render_statistics_doc(channel_name, summary, records);
        tokio::fs::write(channel_dir.join("statistics.md"), stats_doc).await?;

        let guide_doc = render_learning_guide(channel_name, summary);
        tokio::fs::write(channel_dir.join("learning_guide.md"), guide_doc).await?;

        if self.include_video_details {
            let videos_dir = channel_dir.join("videos");
            tokio::fs::create_dir_all(&videos_dir).await?;

            let video_map: HashMap<&str, &VideoRecord> =
                videos.iter().map(|v| (v.video_id.as_str(), v)).collect();

            for record in records {
                let AnalysisOutcome::Success { analysis, .. } = &record.outcome else {
                    continue;
                };

                let video = video_map.get(record.video_id.as_str()).copied();
                let doc = render_video_detail(record, analysis, video);

                let safe_title: String =
                    sanitize_channel_name(&record.title).chars().take(50).collect();
                let file_name = format!("{}_{}.md", record.video_id, safe_title);
                tokio::fs::write(videos_dir.join(file_name), doc).await?;
            }
        }

        info!("✅ Knowledge base generated: {}", channel_dir.display());
        Ok(channel_dir)
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

fn render_summary_doc(channel_name: &str, summary: &ChannelSummary) -> String {
    let mut doc = String::new();

    let _ = writeln!(doc, "# {} - 频道风格分析总结\n", channel_name);
    let _ = writeln!(doc, "**生成时间**: {}\n", timestamp());
    doc.push_str("---\n\n");

    doc.push_str("## 📊 基本信息\n\n");
    let _ = writeln!(doc, "- **分析视频总数**: {}", summary.total_videos);
    let _ = writeln!(doc, "- **成功分析数量**: {}", summary.analyzed_videos);
    let _ = writeln!(doc, "- **主要内容类型**: {}", summary.primary_type);
    let _ = writeln!(doc, "- **主要目标受众**: {}\n", summary.primary_audience);

    if summary.status == SummaryStatus::Failed {
        if let Some(message) = &summary.message {
            let _ = writeln!(doc, "⚠ {}\n", message);
        }
        return doc;
    }

    doc.push_str("## 🎬 视频类型分布\n\n");
    for (video_type, count) in &summary.video_types {
        let _ = writeln!(
            doc,
            "- **{}**: {} 个 ({:.1}%)",
            video_type,
            count,
            percentage(*count, summary.analyzed_videos)
        );
    }
    doc.push('\n');

    doc.push_str("## 🎨 风格特点\n\n");
    for (style, count) in summary.style_features.iter().take(5) {
        let _ = writeln!(doc, "- **{}**: 出现 {} 次", style, count);
    }
    doc.push('\n');

    doc.push_str("## 📌 高频主题\n\n");
    for (i, (topic, count)) in summary.topics.iter().take(10).enumerate() {
        let _ = writeln!(doc, "{}. **{}** ({} 次)", i + 1, topic, count);
    }
    doc.push('\n');

    doc.push_str("## 🔑 高频关键词\n\n");
    for chunk in summary.top_keywords.chunks(5) {
        let _ = writeln!(doc, "- {}", chunk.join(" · "));
    }
    doc.push('\n');

    doc.push_str("## 📝 标题特征\n\n");
    let patterns = &summary.title_patterns;
    let _ = writeln!(doc, "- **平均标题长度**: {} 字符\n", patterns.average_length);

    if !patterns.common_starts.is_empty() {
        doc.push_str("**常见标题开头**:\n\n");
        for (word, count) in patterns.common_starts.iter().take(5) {
            let _ = writeln!(doc, "- `{}` (使用 {} 次)", word, count);
        }
        doc.push('\n');
    }

    doc.push_str("**标点符号使用**:\n\n");
    for (label, count) in &patterns.punctuation_usage {
        if *count > 0 {
            let _ = writeln!(doc, "- {}: {} 次", label, count);
        }
    }
    doc.push('\n');

    doc.push_str("## 💡 吸引观众技巧\n\n");
    for (i, (technique, count)) in summary.engagement_techniques.iter().take(10).enumerate() {
        let _ = writeln!(doc, "{}. **{}** (使用 {} 次)", i + 1, technique, count);
    }
    doc.push('\n');

    doc.push_str("## 📋 内容结构模式\n\n");
    for (pattern, count) in &summary.content_patterns {
        let _ = writeln!(doc, "- **{}**: {} 个视频", pattern, count);
    }
    doc.push('\n');

    doc
}

fn render_statistics_doc(
    channel_name: &str,
    summary: &ChannelSummary,
    records: &[AnalysisRecord],
) -> String {
    let mut doc = String::new();

    let _ = writeln!(doc, "# {} - 详细统计数据\n", channel_name);
    let _ = writeln!(doc, "**生成时间**: {}\n", timestamp());
    doc.push_str("---\n\n");

    let successful = records.iter().filter(|r| r.is_success()).count();
    let failed = records
        .iter()
        .filter(|r| matches!(r.outcome, AnalysisOutcome::Failed { .. }))
        .count();
    let skipped = records
        .iter()
        .filter(|r| matches!(r.outcome, AnalysisOutcome::Skipped { .. }))
        .count();

    doc.push_str("## 📈 分析状态统计\n\n");
    let _ = writeln!(doc, "- ✅ 成功分析: {}", successful);
    let _ = writeln!(doc, "- ❌ 分析失败: {}", failed);
    let _ = writeln!(doc, "- ⏭️ 跳过分析: {}\n", skipped);

    doc.push_str("## 🎬 视频类型详细统计\n\n");
    let total: usize = summary.video_types.iter().map(|(_, c)| c).sum();
    doc.push_str("| 视频类型 | 数量 | 占比 |\n");
    doc.push_str("|---------|------|------|\n");
    for (video_type, count) in &summary.video_types {
        let _ = writeln!(
            doc,
            "| {} | {} | {:.1}% |",
            video_type,
            count,
            percentage(*count, total)
        );
    }
    doc.push('\n');

    doc.push_str("## 📌 主题统计\n\n");
    doc.push_str("| 排名 | 主题 | 出现次数 |\n");
    doc.push_str("|------|------|----------|\n");
    for (i, (topic, count)) in summary.topics.iter().enumerate() {
        let _ = writeln!(doc, "| {} | {} | {} |", i + 1, topic, count);
    }
    doc.push('\n');

    doc.push_str("## 🎨 风格特点统计\n\n");
    doc.push_str("| 风格特点 | 出现次数 |\n");
    doc.push_str("|----------|----------|\n");
    for (style, count) in &summary.style_features {
        let _ = writeln!(doc, "| {} | {} |", style, count);
    }
    doc.push('\n');

    doc.push_str("## 🔑 关键词统计\n\n");
    doc.push_str("| 排名 | 关键词 |\n");
    doc.push_str("|------|--------|\n");
    for (i, keyword) in summary.top_keywords.iter().enumerate() {
        let _ = writeln!(doc, "| {} | {} |", i + 1, keyword);
    }
    doc.push('\n');

    doc
}

fn render_learning_guide(channel_name: &str, summary: &ChannelSummary) -> String {
    let mut doc = String::new();

    let _ = writeln!(doc, "# {} - 学习与模仿指南\n", channel_name);
    let _ = writeln!(doc, "**生成时间**: {}\n", timestamp());
    doc.push_str("---\n\n");

    doc.push_str("## 🎯 核心特征总结\n\n");

    doc.push_str("### 1. 内容定位\n\n");
    let _ = writeln!(
        doc,
        "该频道主要制作【{}】类型的视频,目标受众为【{}】。\n",
        summary.primary_type, summary.primary_audience
    );

    doc.push_str("### 2. 风格特点\n\n");
    if !summary.style_features.is_empty() {
        doc.push_str("该频道的语言风格特点:\n\n");
        for (style, _) in summary.style_features.iter().take(3) {
            let _ = writeln!(doc, "- {}", style);
        }
    }
    doc.push('\n');

    doc.push_str("### 3. 内容主题\n\n");
    if !summary.topics.is_empty() {
        doc.push_str("频道经常涉及的主题:\n\n");
        for (topic, _) in summary.topics.iter().take(10) {
            let _ = writeln!(doc, "- {}", topic);
        }
    }
    doc.push('\n');

    doc.push_str("### 4. 标题技巧\n\n");
    let patterns = &summary.title_patterns;
    let _ = writeln!(doc, "- 标题平均长度: {} 字符", patterns.average_length);
    if !patterns.common_starts.is_empty() {
        let starts: Vec<&str> = patterns
            .common_starts
            .iter()
            .take(5)
            .map(|(word, _)| word.as_str())
            .collect();
        let _ = writeln!(doc, "- 常用开头词: {}", starts.join(", "));
    }
    let frequent_punctuation: Vec<&str> = patterns
        .punctuation_usage
        .iter()
        .filter(|(_, count)| *count > 3)
        .map(|(label, _)| label.as_str())
        .collect();
    if !frequent_punctuation.is_empty() {
        let _ = writeln!(doc, "- 常用标点: {}", frequent_punctuation.join(", "));
    }
    doc.push('\n');

    doc.push_str("### 5. 吸引观众技巧\n\n");
    if !summary.engagement_techniques.is_empty() {
        doc.push_str("该频道常用的吸引观众技巧:\n\n");
        for (i, (technique, _)) in summary.engagement_techniques.iter().take(8).enumerate() {
            let _ = writeln!(doc, "{}. {}", i + 1, technique);
        }
    }
    doc.push('\n');

    doc.push_str("## 💡 模仿建议\n\n");

    doc.push_str("### 内容创作方向\n\n");
    let _ = writeln!(doc, "1. **定位明确**: 聚焦于【{}】类型内容", summary.primary_type);
    let _ = writeln!(doc, "2. **受众定位**: 针对【{}】创作内容", summary.primary_audience);
    if !summary.topics.is_empty() {
        let topics: Vec<&str> = summary
            .topics
            .iter()
            .take(5)
            .map(|(topic, _)| topic.as_str())
            .collect();
        let _ = writeln!(doc, "3. **主题选择**: 围绕 {} 等主题展开", topics.join(", "));
    }
    doc.push('\n');

    doc.push_str("### 风格塑造\n\n");
    for (i, (style, _)) in summary.style_features.iter().take(3).enumerate() {
        let _ = writeln!(doc, "{}. 保持【{}】的表达方式", i + 1, style);
    }
    doc.push('\n');

    doc.push_str("### 标题撰写\n\n");
    let low = (patterns.average_length * 0.8) as usize;
    let high = (patterns.average_length * 1.2) as usize;
    let _ = writeln!(doc, "1. 标题长度控制在 {}-{} 字符左右", low, high);
    if let Some((start, _)) = patterns.common_starts.first() {
        let _ = writeln!(doc, "2. 可以尝试使用「{}」等开头", start);
    }
    doc.push_str("3. 善用标点符号增强吸引力\n\n");

    doc.push_str("### 内容技巧\n\n");
    for (i, (technique, _)) in summary.engagement_techniques.iter().take(5).enumerate() {
        let _ = writeln!(doc, "{}. {}", i + 1, technique);
    }
    doc.push('\n');

    doc.push_str("## 🔑 关键成功因素\n\n");
    doc.push_str("基于分析,该频道的成功关键因素可能包括:\n\n");
    doc.push_str("1. **一致的风格定位**: 保持统一的内容类型和风格\n");
    doc.push_str("2. **明确的受众群体**: 了解并服务好目标受众\n");
    doc.push_str("3. **持续的主题深耕**: 在特定领域建立专业度\n");
    if !summary.engagement_techniques.is_empty() {
        doc.push_str("4. **多样的互动技巧**: 运用多种方式吸引和留住观众\n");
    }
    doc.push('\n');

    doc.push_str("---\n\n");
    doc.push_str("**注**: 以上分析基于视频内容的客观数据,模仿时请结合自身特点,形成独特风格。\n");

    doc
}

fn render_video_detail(
    record: &AnalysisRecord,
    analysis: &VideoAnalysis,
    video: Option<&VideoRecord>,
) -> String {
    let mut doc = String::new();

    let _ = writeln!(doc, "# {}\n", record.title);

    doc.push_str("## 📺 基本信息\n\n");
    let _ = writeln!(doc, "- **视频 ID**: {}", record.video_id);
    if let Some(video) = video {
        let _ = writeln!(doc, "- **视频链接**: {}", video.url);
        let _ = writeln!(doc, "- **上传时间**: {}", video.upload_date);
        let _ = writeln!(doc, "- **时长**: {} 秒", video.duration);
        let _ = writeln!(doc, "- **观看数**: {}", video.view_count);
        let _ = writeln!(doc, "- **点赞数**: {}", video.like_count);
    }
    doc.push('\n');

    doc.push_str("## 🔍 内容分析\n\n");
    let _ = writeln!(doc, "- **视频类型**: {}", analysis.video_type);
    let _ = writeln!(doc, "- **语言风格**: {}", analysis.style.display());
    let _ = writeln!(doc, "- **语气**: {}", analysis.tone);
    let _ = writeln!(doc, "- **目标受众**: {}\n", analysis.target_audience);

    doc.push_str("### 主要主题\n\n");
    for topic in analysis.topics.items() {
        let _ = writeln!(doc, "- {}", topic);
    }
    doc.push('\n');

    doc.push_str("### 关键词\n\n");
    if !analysis.keywords.is_empty() {
        let keywords: Vec<&str> = analysis.keywords.iter().take(10).map(|k| k.as_str()).collect();
        let _ = writeln!(doc, "{}\n", keywords.join(" · "));
    }

    doc.push_str("### 内容结构\n\n");
    let _ = writeln!(doc, "{}\n", analysis.content_structure);

    doc.push_str("### 核心要点\n\n");
    for (i, point) in analysis.key_points.iter().enumerate() {
        let _ = writeln!(doc, "{}. {}", i + 1, point);
    }
    doc.push('\n');

    doc.push_str("### 吸引观众技巧\n\n");
    for technique in analysis.engagement_techniques.items() {
        let _ = writeln!(doc, "- {}", technique);
    }
    doc.push('\n');

    if let Some(video) = video {
        if !video.subtitle_text.is_empty() {
            doc.push_str("## 📝 字幕内容节选\n\n");
            doc.push_str("```\n");
            doc.push_str(&preview(&video.subtitle_text, 500));
            doc.push_str("\n```\n\n");
        }
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisMethod, Labels};
    use crate::summary::{StyleSummarizer, TitlePatterns};
    use tempfile::TempDir;

    fn sample_video(id: &str, title: &str) -> VideoRecord {
        VideoRecord {
            video_id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            url: format!("https://www.youtube.com/watch?v={}", id),
            channel: "测试频道".to_string(),
            duration: 120.0,
            view_count: 5000,
            like_count: 200,
            upload_date: "20240101".to_string(),
            subtitle_text: "今天教大家做蛋糕,做蛋糕其实很简单,跟着步骤一步一步来".to_string(),
            needs_transcription: false,
            audio_file: None,
        }
    }

    fn sample_analysis() -> VideoAnalysis {
        VideoAnalysis {
            video_type: "教程".to_string(),
            topics: Labels::Many(vec!["蛋糕".to_string(), "烘焙".to_string()]),
            style: Labels::One("口语化, 自然流畅".to_string()),
            tone: "友好亲切".to_string(),
            target_audience: "大众".to_string(),
            content_structure: "标准结构".to_string(),
            key_points: vec!["准备材料".to_string(), "烘烤时间".to_string()],
            keywords: vec!["蛋糕".to_string(), "烘焙".to_string()],
            engagement_techniques: Labels::Many(vec!["内容吸引人".to_string()]),
        }
    }

    fn sample_summary(records: &[AnalysisRecord]) -> ChannelSummary {
        StyleSummarizer::new(&Config::default()).summarize(records)
    }

    #[test]
    fn test_summary_doc_renders_distributions() {
        let video = sample_video("v1", "如何做蛋糕");
        let records = vec![AnalysisRecord::success(
            &video,
            sample_analysis(),
            AnalysisMethod::Keyword,
        )];
        let summary = sample_summary(&records);

        let doc = render_summary_doc("测试频道", &summary);
        assert!(doc.contains("# 测试频道 - 频道风格分析总结"));
        assert!(doc.contains("**教程**: 1 个 (100.0%)"));
        assert!(doc.contains("蛋糕"));
    }

    #[test]
    fn test_summary_doc_for_failed_summary() {
        let summary = sample_summary(&[]);
        let doc = render_summary_doc("测试频道", &summary);
        assert!(doc.contains("没有成功分析的视频"));
        assert!(!doc.contains("视频类型分布"));
    }

    #[test]
    fn test_statistics_doc_counts_outcomes() {
        let v1 = sample_video("v1", "如何做蛋糕");
        let v2 = sample_video("v2", "短视频");
        let records = vec![
            AnalysisRecord::success(&v1, sample_analysis(), AnalysisMethod::Keyword),
            AnalysisRecord::skipped(&v2, "字幕内容太短"),
        ];
        let summary = sample_summary(&records);

        let doc = render_statistics_doc("测试频道", &summary, &records);
        assert!(doc.contains("- ✅ 成功分析: 1"));
        assert!(doc.contains("- ⏭️ 跳过分析: 1"));
        assert!(doc.contains("| 教程 | 1 | 100.0% |"));
    }

    #[test]
    fn test_learning_guide_uses_primary_fields() {
        let video = sample_video("v1", "如何做蛋糕");
        let records = vec![AnalysisRecord::success(
            &video,
            sample_analysis(),
            AnalysisMethod::Keyword,
        )];
        let summary = sample_summary(&records);

        let doc = render_learning_guide("测试频道", &summary);
        assert!(doc.contains("【教程】"));
        assert!(doc.contains("【大众】"));
    }

    #[test]
    fn test_video_detail_includes_subtitle_preview() {
        let video = sample_video("v1", "如何做蛋糕");
        let record =
            AnalysisRecord::success(&video, sample_analysis(), AnalysisMethod::Keyword);
        let analysis = record.analysis().unwrap();

        let doc = render_video_detail(&record, analysis, Some(&video));
        assert!(doc.contains("# 如何做蛋糕"));
        assert!(doc.contains("字幕内容节选"));
        assert!(doc.contains("今天教大家做蛋糕"));
    }

    #[test]
    fn test_guide_with_empty_title_patterns_has_no_panic() {
        let mut summary = sample_summary(&[]);
        summary.title_patterns = TitlePatterns::default();
        let doc = render_learning_guide("频道", &summary);
        assert!(doc.contains("标题长度控制在 0-0 字符左右"));
    }

    #[tokio::test]
    async fn test_generate_writes_expected_files() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.system.output_dir = temp.path().to_path_buf();

        let video = sample_video("v1", "如何做蛋糕");
        let records = vec![AnalysisRecord::success(
            &video,
            sample_analysis(),
            AnalysisMethod::Keyword,
        )];
        let summary = sample_summary(&records);

        let generator = KnowledgeBaseGenerator::new(&config);
        let channel_dir = generator
            .generate("测试频道", &summary, &records, &[video])
            .await
            .unwrap();

        assert!(channel_dir.join("summary.md").exists());
        assert!(channel_dir.join("statistics.md").exists());
        assert!(channel_dir.join("learning_guide.md").exists());
        assert!(channel_dir.join("videos").join("v1_如何做蛋糕.md").exists());
    }
}
