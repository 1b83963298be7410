//! Rule-based analysis fallback. Fully deterministic: fixed keyword
//! tables evaluated in declaration order, CJK-run tokenization, and
//! neutral defaults for everything no rule can infer.

use regex::Regex;

use super::{Labels, VideoAnalysis};
use crate::fetcher::VideoRecord;

/// Category table for video type classification. Declaration order is
/// the tie-break: the first category to reach the maximum score wins.
const TYPE_KEYWORDS: &[(&str, &[&str])] = &[
    ("教程", &["教程", "教学", "如何", "怎么", "方法", "技巧", "步骤"]),
    ("评测", &["评测", "测评", "开箱", "体验", "使用", "对比"]),
    ("Vlog", &["vlog", "日常", "生活", "分享", "记录"]),
    ("知识分享", &["知识", "科普", "讲解", "介绍", "原理", "概念"]),
    ("娱乐", &["搞笑", "有趣", "娱乐", "好玩", "趣味"]),
    ("美食", &["美食", "做菜", "料理", "食谱", "烹饪"]),
    ("旅游", &["旅游", "旅行", "游记", "景点", "风景"]),
];

/// Style trigger table. Matching is a set union: every style whose any
/// trigger occurs is included.
const STYLE_KEYWORDS: &[(&str, &[&str])] = &[
    ("幽默风趣", &["哈哈", "笑", "搞笑", "有趣"]),
    ("专业严肃", &["专业", "技术", "研究", "分析"]),
    ("口语化", &["我觉得", "其实", "就是", "然后"]),
    ("激情澎湃", &["非常", "超级", "特别", "真的"]),
];

const DEFAULT_TYPE: &str = "其他";
const DEFAULT_STYLE: &str = "自然流畅";

/// Analyze a video with keyword rules alone
pub fn analyze(video: &VideoRecord) -> VideoAnalysis {
    let full_text = format!("{} {}", video.title, video.subtitle_text).to_lowercase();

    let tokens = extract_cjk_tokens(&full_text);
    let ranked = rank_by_frequency(&tokens);

    let keywords: Vec<String> = ranked.iter().take(10).map(|(w, _)| w.clone()).collect();
    let topics: Vec<String> = ranked.iter().take(5).map(|(w, _)| w.clone()).collect();
    let key_points: Vec<String> = topics.iter().take(3).cloned().collect();

    VideoAnalysis {
        video_type: classify_video_type(&full_text).to_string(),
        topics: Labels::Many(topics),
        style: Labels::One(detect_styles(&full_text).join(", ")),
        tone: "友好亲切".to_string(),
        target_audience: "大众".to_string(),
        content_structure: "标准结构".to_string(),
        key_points,
        keywords,
        engagement_techniques: Labels::Many(vec!["内容吸引人".to_string()]),
    }
}

/// Score each category by how many of its keywords occur in the text;
/// the first strict maximum in table order wins, zero matches
/// everywhere falls back to the neutral category.
pub fn classify_video_type(full_text: &str) -> &'static str {
    let mut video_type = DEFAULT_TYPE;
    let mut max_matches = 0;

    for (category, keywords) in TYPE_KEYWORDS {
        let matches = keywords.iter().filter(|kw| full_text.contains(*kw)).count();
        if matches > max_matches {
            max_matches = matches;
            video_type = category;
        }
    }

    video_type
}

/// Union of style labels whose any trigger keyword occurs in the text
pub fn detect_styles(full_text: &str) -> Vec<String> {
    let mut styles: Vec<String> = STYLE_KEYWORDS
        .iter()
        .filter(|(_, triggers)| triggers.iter().any(|kw| full_text.contains(kw)))
        .map(|(style, _)| style.to_string())
        .collect();

    if styles.is_empty() {
        styles.push(DEFAULT_STYLE.to_string());
    }

    styles
}

/// Tokenize by extracting maximal runs of CJK ideographs
pub fn extract_cjk_tokens(text: &str) -> Vec<String> {
    let pattern = Regex::new(r"[一-鿿]+").unwrap();
    pattern
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Frequency ranking with first-encounter insertion order as the
/// tie-break (stable sort over insertion-ordered accumulation)
fn rank_by_frequency(tokens: &[String]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();

    for token in tokens {
        match counts.iter_mut().find(|(key, _)| key == token) {
            Some((_, count)) => *count += 1,
            None => counts.push((token.clone(), 1)),
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
