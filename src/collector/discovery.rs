use std::collections::HashSet;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::CollectorConfig;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{channel_url, KeywordScore, NewChannel};
use crate::services::{retry, ChannelSummary, DiscoveryProvider, QuotaTracker, RetryPolicy, VideoHit};

/// Uploads shorter than this are not counted as long-form.
const MIN_LONG_VIDEO_SECS: u64 = 60;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectSummary {
    pub keywords: usize,
    pub matched: usize,
    pub added: usize,
    pub refreshed: usize,
    pub halted: bool,
}

/// Keyword-search discovery of channels worth tracking.
pub struct Collector<'a, P> {
    repo: &'a Repository,
    provider: &'a P,
    config: &'a CollectorConfig,
    retry: &'a RetryPolicy,
}

impl<'a, P: DiscoveryProvider> Collector<'a, P> {
    pub fn new(
        repo: &'a Repository,
        provider: &'a P,
        config: &'a CollectorConfig,
        retry: &'a RetryPolicy,
    ) -> Self {
        Self {
            repo,
            provider,
            config,
            retry,
        }
    }

    pub async fn run(&self, quota: &QuotaTracker) -> Result<CollectSummary> {
        let mut summary = CollectSummary::default();
        if self.config.keywords.is_empty() {
            info!("No search keywords configured, skipping collection");
            return Ok(summary);
        }

        let mut matched: Vec<(String, String)> = Vec::new();
        let mut seen = HashSet::new();

        for keyword in &self.config.keywords {
            if !quota.can_continue() {
                warn!("Quota limit reached, skipping remaining keywords");
                summary.halted = true;
                break;
            }

            info!("Collecting channels for keyword: {}", keyword);
            match self.collect_keyword(keyword, quota).await {
                Ok(channels) => {
                    summary.keywords += 1;
                    for (id, title) in channels {
                        if seen.insert(id.clone()) {
                            matched.push((id, title));
                        }
                    }
                }
                Err(e) if e.is_fatal_for_run() => {
                    error!("Stopping collection: {}", e);
                    summary.halted = true;
                    break;
                }
                Err(e) => warn!("Collection for {:?} failed: {}", keyword, e),
            }
        }

        summary.matched = matched.len();
        if matched.is_empty() {
            warn!("No channels matched the collection filters");
            return Ok(summary);
        }

        for (channel_id, title) in matched {
            if self.repo.get_channel(&channel_id).await?.is_some() {
                self.repo
                    .rename_channel(&channel_id, &title, &channel_url(&channel_id))
                    .await?;
                info!("Refreshed existing channel: {}", title);
                summary.refreshed += 1;
            } else if self
                .repo
                .insert_channel(NewChannel::discovered(&channel_id, &title))
                .await?
            {
                info!("Added channel: {}", title);
                summary.added += 1;
            }
        }

        info!(
            "Collection finished: {} added, {} refreshed (quota used {})",
            summary.added,
            summary.refreshed,
            quota.used()
        );
        Ok(summary)
    }

    /// Search, keep long-form uploads, then keep channels inside the subscriber range.
    async fn collect_keyword(&self, keyword: &str, quota: &QuotaTracker) -> Result<Vec<(String, String)>> {
        let provider = self.provider;
        let published_after = Utc::now() - chrono::Duration::days(self.config.collect_days);
        let limit = self.config.result_limit;

        let hits: Vec<VideoHit> = retry(self.retry, &format!("Searching {:?}", keyword), move || {
            provider.search_videos(keyword, published_after, limit, quota)
        })
        .await?;
        let total_videos = hits.len();

        let video_ids: Vec<String> = hits.iter().map(|h| h.video_id.clone()).collect();
        let ids = video_ids.as_slice();
        let durations = retry(self.retry, "Fetching video durations", move || {
            provider.video_durations(ids, quota)
        })
        .await?;

        let long_ids: HashSet<&str> = durations
            .iter()
            .filter(|(_, secs)| *secs >= MIN_LONG_VIDEO_SECS)
            .map(|(id, _)| id.as_str())
            .collect();
        let long_videos: Vec<&VideoHit> = hits
            .iter()
            .filter(|h| long_ids.contains(h.video_id.as_str()))
            .collect();
        info!("[{}] {} videos found, {} long-form", keyword, total_videos, long_videos.len());

        let mut channel_ids: Vec<String> = Vec::new();
        for hit in &long_videos {
            if !channel_ids.contains(&hit.channel_id) {
                channel_ids.push(hit.channel_id.clone());
            }
        }

        let ids = channel_ids.as_slice();
        let summaries: Vec<ChannelSummary> = retry(self.retry, "Fetching channel statistics", move || {
            provider.channel_summaries(ids, quota)
        })
        .await?;

        let range = self.config.min_subs..=self.config.max_subs;
        let matched: Vec<(String, String)> = summaries
            .into_iter()
            .filter(|s| range.contains(&s.subscribers))
            .map(|s| (s.channel_id, s.title))
            .collect();

        let score = KeywordScore {
            date: Utc::now().date_naive(),
            keyword: keyword.to_string(),
            total_videos,
            long_videos: long_videos.len(),
            total_channels: channel_ids.len(),
            potential_channels: matched.len(),
        };
        info!(
            "[{}] {} channels, {} in range, hot rate {:.2}%",
            keyword,
            score.total_channels,
            score.potential_channels,
            score.hot_rate() * 100.0
        );
        self.repo.record_keyword_score(score).await?;

        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono::DateTime;
    use std::cell::Cell;

    struct FakeDiscovery {
        hits: Vec<VideoHit>,
        durations: Vec<(String, u64)>,
        channels: Vec<ChannelSummary>,
        searches: Cell<usize>,
        exhaust_after: Option<usize>,
    }

    impl FakeDiscovery {
        fn new() -> Self {
            let hit = |video: &str, channel: &str| VideoHit {
                video_id: video.into(),
                channel_id: channel.into(),
                channel_title: channel.into(),
            };
            let summary = |id: &str, subscribers: i64| ChannelSummary {
                channel_id: id.into(),
                title: format!("{} title", id),
                subscribers,
            };
            Self {
                hits: vec![
                    hit("v1", "UCa"),
                    hit("v2", "UCa"),
                    hit("v3", "UCb"),
                    hit("v4", "UCc"),
                    hit("v5", "UCd"),
                ],
                durations: vec![
                    ("v1".into(), 600),
                    ("v2".into(), 30),
                    ("v3".into(), 60),
                    ("v4".into(), 45),
                    ("v5".into(), 1200),
                ],
                channels: vec![summary("UCa", 50_000), summary("UCb", 5_000), summary("UCd", 120_000)],
                searches: Cell::new(0),
                exhaust_after: None,
            }
        }
    }

    impl DiscoveryProvider for FakeDiscovery {
        async fn search_videos(
            &self,
            _keyword: &str,
            _published_after: DateTime<Utc>,
            limit: usize,
            quota: &QuotaTracker,
        ) -> Result<Vec<VideoHit>> {
            if self.exhaust_after == Some(self.searches.get()) {
                quota.mark_exhausted();
                return Err(AppError::QuotaExhausted);
            }
            quota.charge(100)?;
            self.searches.set(self.searches.get() + 1);
            Ok(self.hits.iter().take(limit).cloned().collect())
        }

        async fn video_durations(&self, video_ids: &[String], quota: &QuotaTracker) -> Result<Vec<(String, u64)>> {
            quota.charge(video_ids.len() as u32)?;
            Ok(self
                .durations
                .iter()
                .filter(|(id, _)| video_ids.contains(id))
                .cloned()
                .collect())
        }

        async fn channel_summaries(&self, channel_ids: &[String], quota: &QuotaTracker) -> Result<Vec<ChannelSummary>> {
            quota.charge(channel_ids.len() as u32)?;
            Ok(self
                .channels
                .iter()
                .filter(|c| channel_ids.contains(&c.channel_id))
                .cloned()
                .collect())
        }
    }

    fn config(keywords: &[&str]) -> CollectorConfig {
        CollectorConfig {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..CollectorConfig::default()
        }
    }

    #[tokio::test]
    async fn keeps_long_form_channels_within_range() {
        let repo = Repository::in_memory().await.unwrap();
        let provider = FakeDiscovery::new();
        let config = config(&["woodworking"]);
        let policy = RetryPolicy::default();
        let collector = Collector::new(&repo, &provider, &config, &policy);

        let summary = collector.run(&QuotaTracker::new(10_000, 9_000)).await.unwrap();

        // UCb is below 10k subscribers, UCc only posted a short.
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.added, 2);
        assert_eq!(repo.get_channel("UCa").await.unwrap().unwrap().name, "UCa title");
        assert!(repo.get_channel("UCb").await.unwrap().is_none());
        assert!(repo.get_channel("UCc").await.unwrap().is_none());
        assert_eq!(repo.keyword_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn known_channels_are_refreshed_not_duplicated() {
        let repo = Repository::in_memory().await.unwrap();
        repo.insert_channel(NewChannel::discovered("UCa", "old name"))
            .await
            .unwrap();

        let provider = FakeDiscovery::new();
        let config = config(&["woodworking", "joinery"]);
        let policy = RetryPolicy::default();
        let collector = Collector::new(&repo, &provider, &config, &policy);

        let summary = collector.run(&QuotaTracker::new(10_000, 9_000)).await.unwrap();
        assert_eq!(summary.keywords, 2);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.refreshed, 1);
        assert_eq!(repo.list_channels().await.unwrap().len(), 2);
        assert_eq!(repo.get_channel("UCa").await.unwrap().unwrap().name, "UCa title");
    }

    #[tokio::test]
    async fn quota_exhaustion_stops_keyword_loop() {
        let repo = Repository::in_memory().await.unwrap();
        let mut provider = FakeDiscovery::new();
        provider.exhaust_after = Some(1);
        let config = config(&["one", "two", "three"]);
        let policy = RetryPolicy::default();
        let collector = Collector::new(&repo, &provider, &config, &policy);

        let summary = collector.run(&QuotaTracker::new(10_000, 9_000)).await.unwrap();
        assert!(summary.halted);
        assert_eq!(summary.keywords, 1);
        assert_eq!(provider.searches.get(), 1);
        assert_eq!(summary.added, 2);
    }

    #[tokio::test]
    async fn no_keywords_is_a_no_op() {
        let repo = Repository::in_memory().await.unwrap();
        let provider = FakeDiscovery::new();
        let config = config(&[]);
        let policy = RetryPolicy::default();
        let collector = Collector::new(&repo, &provider, &config, &policy);

        let summary = collector.run(&QuotaTracker::new(10_000, 9_000)).await.unwrap();
        assert_eq!(summary, CollectSummary::default());
        assert_eq!(provider.searches.get(), 0);
    }
}
