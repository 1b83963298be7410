use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing::{error, info, warn};

use channel_analyzer_rust::analysis::ContentAnalyzer;
use channel_analyzer_rust::cache::CacheStore;
use channel_analyzer_rust::config::Config;
use channel_analyzer_rust::fetcher::ChannelFetcher;
use channel_analyzer_rust::knowledge::KnowledgeBaseGenerator;
use channel_analyzer_rust::summary::{StyleSummarizer, SummaryStatus};
use channel_analyzer_rust::transcription::{AudioTranscriber, WhisperModel};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "channel_analyzer_rust=info,warn".into()),
        )
        .init();

    let matches = Command::new("YouTube Channel Analyzer (Rust)")
        .version("0.1.0")
        .about("Analyzes a YouTube channel's videos and generates a style knowledge base")
        .arg(
            Arg::new("channel")
                .short('c')
                .long("channel")
                .value_name("URL")
                .help("YouTube channel URL (e.g. https://www.youtube.com/@channel_name)")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Output directory for the knowledge base"),
        )
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .help("Ignore cached channel data and refetch everything")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let channel_url = matches.get_one::<String>("channel").unwrap().clone();

    // Load configuration
    let mut config = match Config::load(matches.get_one::<String>("config").map(|s| s.as_str())) {
        Ok(config) => config,
        Err(e) => {
            error!("✗ {}", e);
            std::process::exit(1);
        }
    };

    if matches.get_flag("no-cache") {
        config.system.cache_enabled = false;
    }

    if let Some(output_dir) = matches.get_one::<String>("output-dir") {
        config.system.output_dir = PathBuf::from(output_dir);
    }

    if matches.get_flag("verbose") {
        info!("Verbose logging enabled");
    }

    if let Err(e) = config.validate() {
        error!("✗ Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("🚀 YouTube Channel Analyzer starting...");
    info!("📺 Channel: {}", channel_url);

    if let Err(e) = analyze_channel(&channel_url, &config).await {
        error!("✗ {}", e);
        eprintln!("详细错误信息请查看日志输出");
        std::process::exit(1);
    }

    Ok(())
}

/// Run the full pipeline for one channel: fetch, transcribe, analyze,
/// summarize, generate
async fn analyze_channel(channel_url: &str, config: &Config) -> Result<()> {
    // Step 1: fetch channel video data (cache short-circuits the fetch)
    info!("[步骤 1/5] 获取频道视频数据...");

    ChannelFetcher::probe().await?;
    let fetcher = ChannelFetcher::new(config);
    let cache = CacheStore::new(config.system.data_dir.join("cache"));
    let cache_ref = config.system.cache_enabled.then_some(&cache);

    let mut videos = fetcher.fetch_all(channel_url, cache_ref).await?;
    info!("✓ 成功获取 {} 个视频数据", videos.len());

    let channel_name = videos
        .first()
        .map(|v| v.channel.clone())
        .unwrap_or_else(|| "Unknown_Channel".to_string());

    // Step 2: transcribe videos without subtitles
    info!("[步骤 2/5] 处理音频转录...");

    let pending = videos.iter().filter(|v| v.needs_transcription).count();
    if pending > 0 {
        match WhisperModel::load(&config.whisper).await {
            Ok(model) => {
                let transcriber = AudioTranscriber::new(model);
                channel_analyzer_rust::transcription::transcribe_pending(
                    &transcriber,
                    &mut videos,
                )
                .await;
            }
            Err(e) => {
                warn!("Whisper unavailable ({}), videos without subtitles will be skipped", e);
            }
        }
    } else {
        info!("✓ 所有视频都有字幕,无需转录");
    }

    // Step 3: per-video content analysis
    info!("[步骤 3/5] 分析视频内容...");

    let analyzer = ContentAnalyzer::new(config);
    let records = analyzer.analyze_all(&videos).await;

    let successful = records.iter().filter(|r| r.is_success()).count();
    info!("✓ 成功分析 {}/{} 个视频", successful, records.len());

    // Step 4: channel style summary
    info!("[步骤 4/5] 总结频道风格...");

    let summarizer = StyleSummarizer::new(config);
    let summary = summarizer.summarize(&records);

    match summary.status {
        SummaryStatus::Success => {
            info!("✓ 风格总结完成");
            info!("  主要类型: {}", summary.primary_type);
            info!("  主要受众: {}", summary.primary_audience);
            let top_topics: Vec<&str> = summary
                .topics
                .iter()
                .take(3)
                .map(|(topic, _)| topic.as_str())
                .collect();
            if !top_topics.is_empty() {
                info!("  高频主题: {}", top_topics.join(", "));
            }
        }
        SummaryStatus::Failed => {
            warn!("⚠ 风格总结失败: 没有成功分析的视频");
        }
    }

    // Step 5: knowledge base generation
    info!("[步骤 5/5] 生成知识库...");

    let generator = KnowledgeBaseGenerator::new(config);
    let output_dir = generator
        .generate(&channel_name, &summary, &records, &videos)
        .await?;

    info!("🎉 分析完成! 知识库已生成");
    info!("📂 输出目录: {}", output_dir.display());
    info!("生成的文件:");
    info!("  - summary.md           (频道风格总结)");
    info!("  - statistics.md        (详细统计数据)");
    info!("  - learning_guide.md    (学习与模仿指南)");
    info!("  - videos/              (各视频详细分析)");

    Ok(())
}
