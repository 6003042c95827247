use tracing::{error, info, warn};

use crate::db::Repository;
use crate::error::Result;
use crate::services::{retry, QuotaTracker, RetryPolicy, StatsProvider};

const SAMPLE_SIZE: usize = 5;
const SHORT_MAX_SECS: u64 = 60;
const SHORT_MIN_COUNT: usize = 3;

/// At least three of the five most recent uploads last a minute or less.
pub fn is_short_form(recent_durations: &[u64]) -> bool {
    recent_durations
        .iter()
        .take(SAMPLE_SIZE)
        .filter(|&&secs| secs <= SHORT_MAX_SECS)
        .count()
        >= SHORT_MIN_COUNT
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassifySummary {
    pub checked: usize,
    pub short_form: usize,
    pub failed: usize,
}

/// Refresh the short-form flag of every identified channel.
pub async fn classify_channels<P: StatsProvider>(
    repo: &Repository,
    provider: &P,
    quota: &QuotaTracker,
    policy: &RetryPolicy,
) -> Result<ClassifySummary> {
    let mut summary = ClassifySummary::default();

    for channel in repo.list_channels().await? {
        let Some(channel_id) = channel.channel_id.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };
        if !quota.can_continue() {
            warn!("Quota limit reached, stopping classification");
            break;
        }

        let durations = retry(policy, &format!("Classifying {}", channel_id), move || {
            provider.recent_video_durations(channel_id, quota)
        })
        .await;

        match durations {
            Ok(durations) => {
                let short_video = is_short_form(&durations);
                summary.checked += 1;
                if short_video {
                    summary.short_form += 1;
                }
                if short_video != channel.short_video {
                    info!(
                        "{} is now {}",
                        channel.display_name(),
                        if short_video { "short-form" } else { "long-form" }
                    );
                    repo.set_short_video(channel.id, short_video).await?;
                }
            }
            Err(e) if e.is_fatal_for_run() => {
                error!("Stopping classification: {}", e);
                summary.failed += 1;
                break;
            }
            Err(e) => {
                warn!("Failed to classify {}: {}", channel_id, e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewChannel;
    use crate::monitor::testing::FakeProvider;

    #[test]
    fn three_of_five_short_uploads_is_short_form() {
        assert!(is_short_form(&[30, 45, 60, 600, 900]));
        assert!(!is_short_form(&[30, 45, 61, 600, 900]));
        assert!(!is_short_form(&[]));
        // Only the five most recent uploads are sampled.
        assert!(!is_short_form(&[30, 45, 600, 600, 900, 10, 10]));
    }

    #[tokio::test]
    async fn classify_updates_flags() {
        let repo = Repository::in_memory().await.unwrap();
        for id in ["UCshorts", "UClong", "UCunknown"] {
            repo.insert_channel(NewChannel::discovered(id, id)).await.unwrap();
        }

        let mut provider = FakeProvider::default();
        provider.durations.insert("UCshorts".into(), vec![20, 30, 40, 900, 15]);
        provider.durations.insert("UClong".into(), vec![900, 1200, 30, 700, 800]);

        let policy = RetryPolicy {
            max_jitter_ms: 0,
            base_delay_ms: 0,
            ..RetryPolicy::default()
        };
        let summary = classify_channels(&repo, &provider, &QuotaTracker::new(100, 90), &policy)
            .await
            .unwrap();

        assert_eq!(summary.checked, 2);
        assert_eq!(summary.short_form, 1);
        assert_eq!(summary.failed, 1);
        assert!(repo.get_channel("UCshorts").await.unwrap().unwrap().short_video);
        assert!(!repo.get_channel("UClong").await.unwrap().unwrap().short_video);
    }
}
