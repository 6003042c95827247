use chrono::Utc;
use tracing::{info, warn};

use crate::config::InactivityConfig;
use crate::db::{HistoryStore, Repository};
use crate::error::Result;
use crate::models::Channel;

/// Prunes channels whose subscriber count stalled over the recent window.
pub struct InactivityDetector<'a> {
    repo: &'a Repository,
    history: HistoryStore,
    window_days: usize,
    threshold: f64,
}

impl<'a> InactivityDetector<'a> {
    pub fn new(repo: &'a Repository, history: HistoryStore, config: &InactivityConfig) -> Self {
        Self {
            repo,
            history,
            window_days: config.window_days,
            threshold: config.growth_threshold,
        }
    }

    /// Relative growth across the recent slice, or `None` when there is too little data.
    pub async fn recent_growth(&self, channel_id: &str) -> Result<Option<f64>> {
        let records = self.history.read(channel_id, Some(self.window_days + 1)).await?;
        if records.len() < self.window_days {
            return Ok(None);
        }
        let (Some(oldest), Some(newest)) = (records.first(), records.last()) else {
            return Ok(None);
        };
        if oldest.subscribers <= 0 {
            return Ok(None);
        }
        Ok(Some(
            (newest.subscribers - oldest.subscribers) as f64 / oldest.subscribers as f64,
        ))
    }

    /// Archive and remove inactive channels along with their history.
    pub async fn prune(&self) -> Result<Vec<Channel>> {
        let mut inactive = Vec::new();

        for channel in self.repo.list_channels().await? {
            if channel.short_video {
                continue;
            }
            let Some(channel_id) = channel.channel_id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };

            match self.recent_growth(channel_id).await {
                Ok(Some(ratio)) if ratio < self.threshold => {
                    info!(
                        "Marking inactive: {} ({}), growth {:.2}%",
                        channel.display_name(),
                        channel_id,
                        ratio * 100.0
                    );
                    inactive.push(channel);
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to check activity of {}: {}", channel_id, e),
            }
        }

        if inactive.is_empty() {
            info!("No inactive channels found");
            return Ok(inactive);
        }

        self.repo.retire_channels(inactive.clone(), Utc::now()).await?;
        info!("Removed {} inactive channels", inactive.len());
        Ok(inactive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewChannel;
    use chrono::{NaiveDate, NaiveDateTime};

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    async fn seed(repo: &Repository, id: &str, counts: &[i64], short_video: bool) {
        repo.insert_channel(NewChannel {
            short_video,
            ..NewChannel::discovered(id, id)
        })
        .await
        .unwrap();
        let history = repo.history(90);
        for (i, subs) in counts.iter().enumerate() {
            history.append(id, day(i as u32 + 1), *subs).await.unwrap();
        }
    }

    fn config() -> InactivityConfig {
        InactivityConfig {
            window_days: 7,
            growth_threshold: 0.01,
        }
    }

    #[tokio::test]
    async fn exactly_one_percent_is_not_inactive() {
        let repo = Repository::in_memory().await.unwrap();
        seed(&repo, "UCedge", &[10_000, 10_020, 10_040, 10_060, 10_080, 10_090, 10_100], false).await;

        let detector = InactivityDetector::new(&repo, repo.history(90), &config());
        let ratio = detector.recent_growth("UCedge").await.unwrap().unwrap();
        assert!((ratio - 0.01).abs() < 1e-12);
        assert!(detector.prune().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn compares_oldest_and_newest_of_recent_slice() {
        let repo = Repository::in_memory().await.unwrap();
        // Nine records; only the last eight count, so the 1 at day 1 is ignored.
        seed(&repo, "UC1", &[1, 1_000, 1_001, 1_002, 1_003, 1_004, 1_005, 1_006, 1_009], false).await;

        let detector = InactivityDetector::new(&repo, repo.history(90), &config());
        let ratio = detector.recent_growth("UC1").await.unwrap().unwrap();
        assert!((ratio - 0.009).abs() < 1e-12);
    }

    #[tokio::test]
    async fn stalled_channels_are_archived_and_history_deleted() {
        let repo = Repository::in_memory().await.unwrap();
        seed(&repo, "UCstall", &[5_000; 8], false).await;
        seed(&repo, "UCgrow", &[5_000, 5_100, 5_200, 5_300, 5_400, 5_500, 5_600, 5_700], false).await;
        seed(&repo, "UCyoung", &[5_000, 5_000, 5_000], false).await;
        seed(&repo, "UCshort", &[5_000; 8], true).await;

        let detector = InactivityDetector::new(&repo, repo.history(90), &config());
        let pruned = detector.prune().await.unwrap();

        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].channel_id.as_deref(), Some("UCstall"));
        assert!(repo.get_channel("UCstall").await.unwrap().is_none());
        assert!(repo.history(90).read("UCstall", None).await.unwrap().is_empty());

        let archived = repo.list_archived().await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].channel.name, "UCstall");

        for kept in ["UCgrow", "UCyoung", "UCshort"] {
            assert!(repo.get_channel(kept).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn declining_channels_are_inactive() {
        let repo = Repository::in_memory().await.unwrap();
        seed(&repo, "UCdown", &[9_000, 8_900, 8_800, 8_700, 8_600, 8_500, 8_400], false).await;

        let detector = InactivityDetector::new(&repo, repo.history(90), &config());
        assert_eq!(detector.prune().await.unwrap().len(), 1);
    }
}
