use std::collections::HashSet;
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, Utc};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::{HistoryStore, Repository};
use crate::error::{AppError, Result};
use crate::models::{channel_url, Channel};
use crate::services::{retry, ChannelRef, Mailer, Notifier, QuotaTracker, RetryPolicy, StatsProvider};

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub request_interval: Duration,
    /// Per-poll growth rate (percent) at which an alert mail is sent.
    pub alert_threshold: f64,
    pub retry: RetryPolicy,
}

impl UpdateOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            request_interval: Duration::from_millis(config.request_interval_ms),
            alert_threshold: config.growth_alert_threshold,
            retry: config.retry.clone(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub alerts: usize,
    /// The run stopped early on quota exhaustion or a rejected key.
    pub halted: bool,
}

/// One polling pass over the snapshot table.
pub struct Monitor<'a, P, M> {
    repo: &'a Repository,
    history: HistoryStore,
    provider: &'a P,
    notifier: &'a Notifier<M>,
    options: UpdateOptions,
}

impl<'a, P: StatsProvider, M: Mailer> Monitor<'a, P, M> {
    pub fn new(
        repo: &'a Repository,
        history: HistoryStore,
        provider: &'a P,
        notifier: &'a Notifier<M>,
        options: UpdateOptions,
    ) -> Self {
        Self {
            repo,
            history,
            provider,
            notifier,
            options,
        }
    }

    pub async fn update_all(&self, quota: &QuotaTracker) -> Result<UpdateSummary> {
        let channels = self.repo.list_channels().await?;
        let mut known: HashSet<String> = channels
            .iter()
            .filter_map(|c| c.channel_id.clone())
            .filter(|id| !id.is_empty())
            .collect();

        let today = Utc::now().date_naive().and_time(NaiveTime::MIN);
        let mut summary = UpdateSummary::default();
        let mut updated = Vec::new();
        let mut polled_any = false;

        for mut channel in channels {
            if channel.short_video {
                info!("Skipping short-form channel: {}", channel.display_name());
                summary.skipped += 1;
                continue;
            }
            if !quota.can_continue() {
                warn!("Quota limit reached, leaving remaining channels for the next run");
                summary.halted = true;
                break;
            }

            if polled_any && !self.options.request_interval.is_zero() {
                tokio::time::sleep(self.options.request_interval).await;
            }
            polled_any = true;

            match self.poll(&mut channel, &mut known, today, quota).await {
                Ok(()) => {
                    if self.should_alert(&channel) && self.send_alert(&channel).await {
                        summary.alerts += 1;
                    }
                    summary.updated += 1;
                    updated.push(channel);
                }
                Err(e) if e.is_fatal_for_run() => {
                    error!("Stopping update run at {}: {}", channel.display_name(), e);
                    summary.failed += 1;
                    summary.halted = true;
                    break;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", channel.display_name(), e);
                    summary.failed += 1;
                }
            }
        }

        if !updated.is_empty() {
            self.repo.update_channels(updated).await?;
        }
        info!(
            "Update finished: {} updated, {} skipped, {} failed (quota used {}, {} remaining)",
            summary.updated,
            summary.skipped,
            summary.failed,
            quota.used(),
            quota.remaining()
        );
        Ok(summary)
    }

    async fn poll(
        &self,
        channel: &mut Channel,
        known: &mut HashSet<String>,
        today: NaiveDateTime,
        quota: &QuotaTracker,
    ) -> Result<()> {
        let channel_id = match channel.channel_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let id = self.resolve(&channel.url, quota).await?;
                if !known.insert(id.clone()) {
                    return Err(anyhow::anyhow!("{} resolves to already tracked channel {}", channel.url, id).into());
                }
                info!("Resolved {} to {}", channel.url, id);
                // Keep the resolved id even if the count fetch below fails.
                if let Err(e) = self.repo.set_channel_id(channel.id, &id).await {
                    warn!("Failed to store channel id for {}: {}", channel.url, e);
                }
                channel.channel_id = Some(id.clone());
                id
            }
        };

        let provider = self.provider;
        let id = channel_id.as_str();
        let subscribers = retry(&self.options.retry, &format!("Fetching {}", id), move || {
            provider.subscriber_count(id, quota)
        })
        .await?;

        let previous = channel.current_subs;
        channel.apply_poll(subscribers, Utc::now());
        info!(
            "{} ({}): {} -> {} ({:+}, {:.2}%)",
            channel.display_name(),
            id,
            previous,
            subscribers,
            channel.growth,
            channel.growth_rate
        );

        if let Err(e) = self.history.append(id, today, subscribers).await {
            warn!("Failed to record history for {}: {}", id, e);
        }
        Ok(())
    }

    async fn resolve(&self, url: &str, quota: &QuotaTracker) -> Result<String> {
        match ChannelRef::parse(url) {
            Some(ChannelRef::Id(id)) => Ok(id),
            Some(_) => {
                let provider = self.provider;
                retry(&self.options.retry, &format!("Resolving {}", url), move || {
                    provider.resolve_channel_id(url, quota)
                })
                .await
            }
            None => Err(AppError::NotFound(format!("channel id in {}", url))),
        }
    }

    fn should_alert(&self, channel: &Channel) -> bool {
        channel.last_subs > 0 && channel.growth_rate >= self.options.alert_threshold
    }

    async fn send_alert(&self, channel: &Channel) -> bool {
        let channel_id = channel.channel_id.as_deref().unwrap_or_default();
        let subject = format!("YouTube channel growth alert: {}", channel.display_name());
        let body = format!(
            "Channel: {}\nLink: {}\nGrowth rate: {:.2}% (threshold: {}%)\nSubscribers: {} (growth: {})\nChecked at: {}\n",
            channel.display_name(),
            channel_url(channel_id),
            channel.growth_rate,
            self.options.alert_threshold,
            channel.current_subs,
            channel.growth,
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        self.notifier.notify(&subject, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewChannel;
    use crate::monitor::testing::FakeProvider;
    use crate::services::testing::RecordingMailer;

    fn options() -> UpdateOptions {
        UpdateOptions {
            request_interval: Duration::ZERO,
            alert_threshold: 10.0,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 0,
                multiplier: 2.0,
                max_jitter_ms: 0,
            },
        }
    }

    async fn seed(repo: &Repository, id: &str, subs: i64, short_video: bool) {
        repo.insert_channel(NewChannel {
            current_subs: subs,
            short_video,
            ..NewChannel::discovered(id, id)
        })
        .await
        .unwrap();
    }

    async fn channel(repo: &Repository, id: &str) -> Channel {
        repo.get_channel(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn poll_shifts_counts_and_records_history() {
        let repo = Repository::in_memory().await.unwrap();
        seed(&repo, "UC1", 10_000, false).await;

        let provider = FakeProvider::with_counts(&[("UC1", 10_500)]);
        let notifier: Notifier<&RecordingMailer> = Notifier::disabled();
        let monitor = Monitor::new(&repo, repo.history(90), &provider, &notifier, options());

        let summary = monitor.update_all(&QuotaTracker::new(100, 90)).await.unwrap();
        assert_eq!(summary.updated, 1);

        let updated = channel(&repo, "UC1").await;
        assert_eq!(updated.last_subs, 10_000);
        assert_eq!(updated.current_subs, 10_500);
        assert_eq!(updated.growth, 500);
        assert_eq!(updated.growth_rate, 5.0);
        assert!(updated.updated_at.is_some());

        let history = repo.history(90).read("UC1", None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].subscribers, 10_500);
        assert_eq!(history[0].recorded_at.time(), NaiveTime::MIN);
    }

    #[tokio::test]
    async fn short_form_channels_are_not_polled() {
        let repo = Repository::in_memory().await.unwrap();
        seed(&repo, "UCshort", 10_000, true).await;
        seed(&repo, "UClong", 20_000, false).await;

        let provider = FakeProvider::with_counts(&[("UCshort", 1), ("UClong", 20_100)]);
        let notifier: Notifier<&RecordingMailer> = Notifier::disabled();
        let monitor = Monitor::new(&repo, repo.history(90), &provider, &notifier, options());

        let summary = monitor.update_all(&QuotaTracker::new(100, 90)).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(*provider.calls.borrow(), vec!["UClong".to_string()]);
        assert_eq!(channel(&repo, "UCshort").await.current_subs, 10_000);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_and_missing_channels_skipped() {
        let repo = Repository::in_memory().await.unwrap();
        seed(&repo, "UC1", 1_000, false).await;
        seed(&repo, "UCgone", 1_000, false).await;

        let provider = FakeProvider::with_counts(&[("UC1", 1_010)]);
        provider.fail_times("UC1", 2);
        let notifier: Notifier<&RecordingMailer> = Notifier::disabled();
        let monitor = Monitor::new(&repo, repo.history(90), &provider, &notifier, options());

        let summary = monitor.update_all(&QuotaTracker::new(100, 90)).await.unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(channel(&repo, "UC1").await.current_subs, 1_010);
        assert_eq!(channel(&repo, "UCgone").await.current_subs, 1_000);
    }

    #[tokio::test]
    async fn quota_exhaustion_stops_the_run_but_keeps_updates() {
        let repo = Repository::in_memory().await.unwrap();
        for (id, subs) in [("UCa", 100), ("UCb", 200), ("UCc", 300)] {
            seed(&repo, id, subs, false).await;
        }

        let mut provider = FakeProvider::with_counts(&[("UCa", 110), ("UCb", 220), ("UCc", 330)]);
        provider.quota_exhausted_on = Some("UCb".to_string());
        let notifier: Notifier<&RecordingMailer> = Notifier::disabled();
        let monitor = Monitor::new(&repo, repo.history(90), &provider, &notifier, options());

        let summary = monitor.update_all(&QuotaTracker::new(100, 90)).await.unwrap();
        assert!(summary.halted);
        assert_eq!(summary.updated, 1);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(channel(&repo, "UCa").await.current_subs, 110);
        assert_eq!(channel(&repo, "UCc").await.current_subs, 300);
    }

    #[tokio::test]
    async fn resolves_missing_ids_from_urls() {
        let repo = Repository::in_memory().await.unwrap();
        repo.insert_channel(NewChannel {
            name: "Direct".into(),
            url: "https://www.youtube.com/channel/UCdirect".into(),
            current_subs: 500,
            ..NewChannel::default()
        })
        .await
        .unwrap();
        repo.insert_channel(NewChannel {
            name: "Handle".into(),
            url: "https://www.youtube.com/@maker".into(),
            current_subs: 700,
            ..NewChannel::default()
        })
        .await
        .unwrap();

        let mut provider = FakeProvider::with_counts(&[("UCdirect", 550), ("UCmaker", 770)]);
        provider
            .handles
            .insert("https://www.youtube.com/@maker".into(), "UCmaker".into());
        let notifier: Notifier<&RecordingMailer> = Notifier::disabled();
        let monitor = Monitor::new(&repo, repo.history(90), &provider, &notifier, options());

        let summary = monitor.update_all(&QuotaTracker::new(100, 90)).await.unwrap();
        assert_eq!(summary.updated, 2);
        assert_eq!(channel(&repo, "UCdirect").await.current_subs, 550);
        assert_eq!(channel(&repo, "UCmaker").await.name, "Handle");
    }

    #[tokio::test]
    async fn resolved_id_is_kept_when_fetch_fails() {
        let repo = Repository::in_memory().await.unwrap();
        repo.insert_channel(NewChannel {
            name: "Handle".into(),
            url: "https://www.youtube.com/@maker".into(),
            current_subs: 700,
            ..NewChannel::default()
        })
        .await
        .unwrap();

        let mut provider = FakeProvider::with_counts(&[("UCmaker", 770)]);
        provider
            .handles
            .insert("https://www.youtube.com/@maker".into(), "UCmaker".into());
        provider.fail_times("UCmaker", 10);
        let notifier: Notifier<&RecordingMailer> = Notifier::disabled();
        let monitor = Monitor::new(&repo, repo.history(90), &provider, &notifier, options());

        let summary = monitor.update_all(&QuotaTracker::new(100, 90)).await.unwrap();
        assert_eq!(summary.failed, 1);

        let stored = channel(&repo, "UCmaker").await;
        assert_eq!(stored.current_subs, 700);
        assert!(stored.updated_at.is_none());
    }

    #[tokio::test]
    async fn fast_growth_sends_an_alert() {
        let repo = Repository::in_memory().await.unwrap();
        seed(&repo, "UCfast", 1_000, false).await;
        seed(&repo, "UCslow", 1_000, false).await;
        seed(&repo, "UCnew", 0, false).await;

        let provider =
            FakeProvider::with_counts(&[("UCfast", 1_200), ("UCslow", 1_010), ("UCnew", 5_000)]);
        let mailer = RecordingMailer::default();
        let notifier = Notifier::new(Some(&mailer));
        let monitor = Monitor::new(&repo, repo.history(90), &provider, &notifier, options());

        let summary = monitor.update_all(&QuotaTracker::new(100, 90)).await.unwrap();
        assert_eq!(summary.alerts, 1);
        assert_eq!(
            mailer.subjects(),
            vec!["YouTube channel growth alert: UCfast".to_string()]
        );
    }
}
