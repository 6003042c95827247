use std::collections::HashSet;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{CollectorConfig, LeaderboardConfig};
use crate::db::Repository;
use crate::error::Result;
use crate::models::NewChannel;
use crate::services::{retry, LeaderboardEntry, LeaderboardPage, LeaderboardSource, RetryPolicy};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LeaderboardSummary {
    pub countries: usize,
    pub pages: usize,
    pub matched: usize,
    pub added: usize,
    pub known: usize,
}

/// Discovery from per-country growth charts.
pub struct LeaderboardCollector<'a, S> {
    repo: &'a Repository,
    source: &'a S,
    config: &'a LeaderboardConfig,
    min_subs: i64,
    max_subs: i64,
    retry: &'a RetryPolicy,
}

impl<'a, S: LeaderboardSource> LeaderboardCollector<'a, S> {
    pub fn new(
        repo: &'a Repository,
        source: &'a S,
        config: &'a CollectorConfig,
        retry: &'a RetryPolicy,
    ) -> Self {
        Self {
            repo,
            source,
            config: &config.leaderboard,
            min_subs: config.min_subs,
            max_subs: config.max_subs,
            retry,
        }
    }

    /// Scan `countries` (or the configured list when empty) for the chart at `period`.
    pub async fn run(&self, countries: &[String], period: i64) -> Result<LeaderboardSummary> {
        let countries = if countries.is_empty() {
            self.config.countries.as_slice()
        } else {
            countries
        };
        let mut summary = LeaderboardSummary::default();
        let mut seen = HashSet::new();
        let pause = Duration::from_millis(self.config.country_interval_ms);

        for (i, country) in countries.iter().enumerate() {
            if i > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let (entries, pages) = self.collect_country(country, period).await;
            summary.countries += 1;
            summary.pages += pages;

            for entry in entries {
                if !seen.insert(entry.channel_id.clone()) {
                    continue;
                }
                summary.matched += 1;
                let added = self
                    .repo
                    .insert_channel(NewChannel {
                        current_subs: entry.subscribers,
                        ..NewChannel::discovered(&entry.channel_id, &entry.title)
                    })
                    .await?;
                if added {
                    info!("Added channel: {} ({})", entry.title, entry.channel_id);
                    summary.added += 1;
                } else {
                    info!("Already tracked, skipping: {} ({})", entry.title, entry.channel_id);
                    summary.known += 1;
                }
            }
        }

        info!(
            "Leaderboard collection finished: {} countries, {} in range, {} added",
            summary.countries, summary.matched, summary.added
        );
        Ok(summary)
    }

    /// Page through one country's chart. A failed page ends that country only.
    async fn collect_country(&self, country: &str, period: i64) -> (Vec<LeaderboardEntry>, usize) {
        let source = self.source;
        let pause = Duration::from_millis(self.config.page_interval_ms);
        let range = self.min_subs..=self.max_subs;
        let mut cursor: Option<String> = None;
        let mut entries = Vec::new();
        let mut pages = 0;

        while pages < self.config.max_pages {
            if pages > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let current = cursor.as_deref();
            let what = format!("Fetching {} chart page {}", country, pages + 1);
            let page: LeaderboardPage =
                match retry(self.retry, &what, move || source.fetch_page(country, period, current)).await {
                    Ok(page) => page,
                    Err(e) => {
                        warn!("{} failed: {}", what, e);
                        break;
                    }
                };
            pages += 1;

            if page.entries.is_empty() {
                info!("[{}] no more chart entries", country);
                break;
            }
            let total = page.entries.len();
            entries.extend(page.entries.into_iter().filter(|e| range.contains(&e.subscribers)));
            info!("[{}] page {}: {} channels", country, pages, total);

            match page.cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => {
                    info!("[{}] reached the last chart page", country);
                    break;
                }
            }
        }

        (entries, pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Pages keyed by (country, cursor); unknown keys return an empty page.
    #[derive(Default)]
    struct FakeChart {
        pages: HashMap<(String, Option<String>), LeaderboardPage>,
        failing: HashMap<String, RefCell<u32>>,
        requests: RefCell<Vec<(String, Option<String>)>>,
    }

    impl FakeChart {
        fn page(&mut self, country: &str, cursor: Option<&str>, entries: &[(&str, i64)], next: Option<&str>) {
            self.pages.insert(
                (country.to_string(), cursor.map(String::from)),
                LeaderboardPage {
                    entries: entries
                        .iter()
                        .map(|(id, subs)| LeaderboardEntry {
                            channel_id: id.to_string(),
                            title: format!("{} title", id),
                            subscribers: *subs,
                        })
                        .collect(),
                    cursor: next.map(String::from),
                },
            );
        }
    }

    impl LeaderboardSource for FakeChart {
        async fn fetch_page(&self, country: &str, _period: i64, cursor: Option<&str>) -> Result<LeaderboardPage> {
            self.requests
                .borrow_mut()
                .push((country.to_string(), cursor.map(String::from)));
            if let Some(left) = self.failing.get(country) {
                let mut left = left.borrow_mut();
                if *left > 0 {
                    *left -= 1;
                    return Err(AppError::Transient("HTTP 503".into()));
                }
            }
            Ok(self
                .pages
                .get(&(country.to_string(), cursor.map(String::from)))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn config(max_pages: usize) -> CollectorConfig {
        let mut config = CollectorConfig::default();
        config.leaderboard.max_pages = max_pages;
        config.leaderboard.page_interval_ms = 0;
        config.leaderboard.country_interval_ms = 0;
        config.leaderboard.countries = vec!["US".into(), "GB".into()];
        config
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 0,
            multiplier: 2.0,
            max_jitter_ms: 0,
        }
    }

    #[tokio::test]
    async fn pages_through_cursor_and_filters_by_range() {
        let mut chart = FakeChart::default();
        chart.page("US", None, &[("UCa", 50_000), ("UCbig", 2_000_000)], Some("c1"));
        chart.page("US", Some("c1"), &[("UCb", 12_000), ("UCtiny", 900)], Some("c2"));
        chart.page("US", Some("c2"), &[("UCc", 20_000)], None);

        let repo = Repository::in_memory().await.unwrap();
        let config = config(2);
        let policy = policy();
        let collector = LeaderboardCollector::new(&repo, &chart, &config, &policy);

        let summary = collector.run(&["US".to_string()], 1_700_000_000).await.unwrap();
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.added, 2);

        let added = repo.get_channel("UCa").await.unwrap().unwrap();
        assert_eq!(added.current_subs, 50_000);
        assert_eq!(added.name, "UCa title");
        assert!(repo.get_channel("UCbig").await.unwrap().is_none());
        assert!(repo.get_channel("UCtiny").await.unwrap().is_none());
        // max_pages stops before the third page
        assert!(repo.get_channel("UCc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn repeated_cursor_ends_the_country() {
        let mut chart = FakeChart::default();
        chart.page("US", None, &[("UCa", 50_000)], Some("same"));
        chart.page("US", Some("same"), &[("UCb", 60_000)], Some("same"));

        let repo = Repository::in_memory().await.unwrap();
        let config = config(10);
        let policy = policy();
        let collector = LeaderboardCollector::new(&repo, &chart, &config, &policy);

        let summary = collector.run(&["US".to_string()], 0).await.unwrap();
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.added, 2);
        assert_eq!(chart.requests.borrow().len(), 2);
    }

    #[tokio::test]
    async fn known_channels_are_not_duplicated() {
        let mut chart = FakeChart::default();
        chart.page("US", None, &[("UCa", 50_000)], None);
        chart.page("GB", None, &[("UCa", 50_000), ("UCb", 30_000)], None);

        let repo = Repository::in_memory().await.unwrap();
        repo.insert_channel(NewChannel::discovered("UCb", "existing"))
            .await
            .unwrap();
        let config = config(2);
        let policy = policy();
        let collector = LeaderboardCollector::new(&repo, &chart, &config, &policy);

        // No countries given: the configured list is used.
        let summary = collector.run(&[], 0).await.unwrap();
        assert_eq!(summary.countries, 2);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.known, 1);
        assert_eq!(repo.get_channel("UCb").await.unwrap().unwrap().name, "existing");
        assert_eq!(repo.list_channels().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_country_does_not_stop_the_others() {
        let mut chart = FakeChart::default();
        chart.page("US", None, &[("UCa", 50_000)], None);
        chart.page("GB", None, &[("UCb", 30_000)], None);
        chart.failing.insert("US".into(), RefCell::new(10));
        chart.failing.insert("GB".into(), RefCell::new(1));

        let repo = Repository::in_memory().await.unwrap();
        let config = config(2);
        let policy = policy();
        let collector = LeaderboardCollector::new(&repo, &chart, &config, &policy);

        let summary = collector.run(&[], 0).await.unwrap();
        assert_eq!(summary.added, 1);
        assert!(repo.get_channel("UCa").await.unwrap().is_none());
        assert!(repo.get_channel("UCb").await.unwrap().is_some());
    }
}
