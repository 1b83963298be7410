use regex::Regex;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::fetcher::VideoRecord;

/// Replace filesystem-unsafe characters in a channel display name. No
/// further normalization: two channels with the same display name share
/// a cache file (known limitation, kept from the original key scheme).
pub fn sanitize_channel_name(name: &str) -> String {
    let pattern = Regex::new(r#"[<>:"/\\|?*]"#).unwrap();
    pattern.replace_all(name, "_").into_owned()
}

/// Whole-channel cache of enriched video records, one JSON file per
/// channel. A hit replaces the entire live fetch; there is no per-video
/// granularity.
pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn cache_path(&self, channel_name: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}_videos.json", sanitize_channel_name(channel_name)))
    }

    /// Load the cached record list for a channel. Any read or parse
    /// problem is treated as a miss.
    pub async fn get(&self, channel_name: &str) -> Option<Vec<VideoRecord>> {
        let path = self.cache_path(channel_name);

        if !path.exists() {
            debug!("Cache miss: no file for channel {}", channel_name);
            return None;
        }

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<VideoRecord>>(&content) {
                Ok(records) => {
                    info!("📚 Loaded {} videos from cache: {}", records.len(), path.display());
                    Some(records)
                }
                Err(e) => {
                    warn!("Failed to parse cache file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist the record list for a channel. Writes are best-effort: a
    /// failure is logged and does not fail the run.
    pub async fn put(&self, channel_name: &str, records: &[VideoRecord]) {
        let path = self.cache_path(channel_name);

        if let Err(e) = tokio::fs::create_dir_all(&self.cache_dir).await {
            warn!("Failed to create cache directory {}: {}", self.cache_dir.display(), e);
            return;
        }

        let json = match serde_json::to_string_pretty(records) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize cache for {}: {}", channel_name, e);
                return;
            }
        };

        match tokio::fs::write(&path, json).await {
            Ok(()) => info!("💾 Cached {} videos: {}", records.len(), path.display()),
            Err(e) => warn!("Failed to write cache file {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record(id: &str, title: &str) -> VideoRecord {
        VideoRecord {
            video_id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            url: format!("https://www.youtube.com/watch?v={}", id),
            channel: "测试频道".to_string(),
            duration: 60.0,
            view_count: 10,
            like_count: 1,
            upload_date: "20240101".to_string(),
            subtitle_text: "字幕内容".to_string(),
            needs_transcription: false,
            audio_file: None,
        }
    }

    #[test]
    fn test_sanitize_channel_name() {
        assert_eq!(sanitize_channel_name("A/B:C?D"), "A_B_C_D");
        assert_eq!(sanitize_channel_name("正常频道"), "正常频道");
        assert_eq!(sanitize_channel_name(r#"a<b>c"d|e*f"#), "a_b_c_d_e_f");
    }

    #[tokio::test]
    async fn test_cache_roundtrip_preserves_content_and_order() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path().to_path_buf());

        let records = vec![
            sample_record("v1", "如何做蛋糕"),
            sample_record("v2", "如何健身"),
            sample_record("v3", "游记分享"),
        ];

        store.put("测试频道", &records).await;
        let loaded = store.get("测试频道").await.unwrap();

        assert_eq!(loaded.len(), 3);
        for (a, b) in records.iter().zip(loaded.iter()) {
            assert_eq!(a.video_id, b.video_id);
            assert_eq!(a.title, b.title);
            assert_eq!(a.subtitle_text, b.subtitle_text);
        }
    }

    #[tokio::test]
    async fn test_cache_miss_on_absent_channel() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path().to_path_buf());
        assert!(store.get("不存在").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_miss_on_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path().to_path_buf());

        tokio::fs::write(temp.path().join("bad_videos.json"), "{not json")
            .await
            .unwrap();
        assert!(store.get("bad").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_file_preserves_non_ascii() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path().to_path_buf());

        store.put("频道", &[sample_record("v1", "如何做蛋糕")]).await;

        let raw = tokio::fs::read_to_string(temp.path().join("频道_videos.json"))
            .await
            .unwrap();
        assert!(raw.contains("如何做蛋糕"));
        assert!(!raw.contains("\\u"));
    }
}
