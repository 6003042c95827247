use std::path::Path;
use std::time::Duration;

use crate::cli::Command;
use crate::collector::{Collector, LeaderboardCollector};
use crate::config::Config;
use crate::db::{HistoryStore, Repository};
use crate::error::{AppError, Result};
use crate::growth::GrowthCalculator;
use crate::import::{import_channels, import_history};
use crate::models::ReportPeriod;
use crate::monitor::{classify_channels, InactivityDetector, Monitor, UpdateOptions};
use crate::report::{ReportGenerator, ReportOutcome};
use crate::services::{latest_period, LeaderboardClient, Notifier, QuotaTracker, SendmailMailer, YouTubeClient};

pub struct App {
    config: Config,
    repository: Repository,
    history: HistoryStore,
    notifier: Notifier<SendmailMailer>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let history = repository.history(config.max_history_records);
        let notifier = Notifier::from_config(&config);

        Ok(Self {
            config,
            repository,
            history,
            notifier,
        })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Update => self.update().await,
            Command::Clean => self.clean().await,
            Command::Report { period, days } => self.report(period, days).await,
            Command::Collect { leaderboard: Some(countries) } => self.collect_leaderboard(&countries).await,
            Command::Collect { leaderboard: None } => self.collect().await,
            Command::Classify => self.classify().await,
            Command::Import { channels, history } => {
                self.import(channels.as_deref(), history.as_deref()).await
            }
            Command::List { archived } => self.list(archived).await,
            Command::Remove { channel_id } => self.remove(&channel_id).await,
        }
    }

    fn youtube(&self) -> Result<YouTubeClient> {
        let api_key = self.config.require_api_key()?;
        YouTubeClient::new(
            api_key.to_string(),
            Duration::from_secs(self.config.request_timeout_secs),
        )
    }

    fn quota(&self) -> QuotaTracker {
        QuotaTracker::new(self.config.quota.daily_limit, self.config.quota.safe_limit)
    }

    async fn update(&self) -> Result<()> {
        let client = self.youtube()?;
        let quota = self.quota();
        let monitor = Monitor::new(
            &self.repository,
            self.history.clone(),
            &client,
            &self.notifier,
            UpdateOptions::from_config(&self.config),
        );

        let summary = monitor.update_all(&quota).await?;
        println!(
            "Updated {} channels ({} skipped, {} failed, {} alerts)",
            summary.updated, summary.skipped, summary.failed, summary.alerts
        );
        if summary.halted {
            println!("Stopped early: API quota exhausted or key rejected");
        }
        Ok(())
    }

    async fn clean(&self) -> Result<()> {
        let detector =
            InactivityDetector::new(&self.repository, self.history.clone(), &self.config.inactivity);
        let removed = detector.prune().await?;
        println!("Removed {} inactive channels", removed.len());
        for channel in &removed {
            println!("  {}", channel.display_name());
        }
        Ok(())
    }

    async fn report(&self, period: ReportPeriod, days: Option<i64>) -> Result<()> {
        let generator = ReportGenerator::new(
            &self.repository,
            GrowthCalculator::new(self.history.clone()),
            &self.config.report,
            &self.config.reports_dir,
            &self.notifier,
        );

        // Failures are mailed by the generator; the command itself succeeds.
        match generator.generate(period, days).await {
            ReportOutcome::Written { path, rows } => {
                println!("Wrote {} channels to {}", rows, path.display())
            }
            ReportOutcome::NoGrowth { processed, .. } => {
                println!("No qualifying channels among {} processed", processed)
            }
            ReportOutcome::NoData => println!("No channel data"),
            ReportOutcome::Failed(e) => eprintln!("Report failed: {}", e),
        }
        Ok(())
    }

    async fn collect(&self) -> Result<()> {
        let client = self.youtube()?;
        let quota = self.quota();
        let collector = Collector::new(
            &self.repository,
            &client,
            &self.config.collector,
            &self.config.retry,
        );

        let summary = collector.run(&quota).await?;
        println!(
            "Collected {} channels from {} keywords ({} new, {} refreshed)",
            summary.matched, summary.keywords, summary.added, summary.refreshed
        );
        if summary.halted {
            println!("Stopped early: API quota exhausted or key rejected");
        }
        Ok(())
    }

    async fn collect_leaderboard(&self, countries: &[String]) -> Result<()> {
        let settings = &self.config.collector.leaderboard;
        let source = LeaderboardClient::new(
            settings.base_url.clone(),
            settings.page_size,
            Duration::from_secs(self.config.request_timeout_secs),
        )?;
        let period = latest_period()
            .ok_or_else(|| AppError::Config("cannot determine the chart snapshot time".to_string()))?;
        let collector = LeaderboardCollector::new(
            &self.repository,
            &source,
            &self.config.collector,
            &self.config.retry,
        );

        let summary = collector.run(countries, period).await?;
        println!(
            "Scanned {} countries ({} pages): {} channels in range ({} new, {} already tracked)",
            summary.countries, summary.pages, summary.matched, summary.added, summary.known
        );
        Ok(())
    }

    async fn classify(&self) -> Result<()> {
        let client = self.youtube()?;
        let quota = self.quota();
        let summary =
            classify_channels(&self.repository, &client, &quota, &self.config.retry).await?;
        println!(
            "Classified {} channels ({} short-form, {} failed)",
            summary.checked, summary.short_form, summary.failed
        );
        Ok(())
    }

    async fn import(&self, channels: Option<&Path>, history: Option<&Path>) -> Result<()> {
        if channels.is_none() && history.is_none() {
            return Err(AppError::Import(
                "nothing to import, pass --channels and/or --history".to_string(),
            ));
        }
        if let Some(path) = channels {
            let summary = import_channels(&self.repository, path).await?;
            println!(
                "Imported {} channels from {:?} ({} skipped)",
                summary.imported, path, summary.skipped
            );
        }
        if let Some(dir) = history {
            let summary = import_history(&self.history, dir).await?;
            println!(
                "Imported {} history records from {:?} ({} skipped)",
                summary.imported, dir, summary.skipped
            );
        }
        Ok(())
    }

    async fn list(&self, archived: bool) -> Result<()> {
        if archived {
            for entry in self.repository.list_archived().await? {
                println!(
                    "{}\t{}\t{}\tarchived {}",
                    entry.channel.channel_id.as_deref().unwrap_or("-"),
                    entry.channel.current_subs,
                    entry.channel.display_name(),
                    entry.archived_at.format("%Y-%m-%d")
                );
            }
            return Ok(());
        }

        for channel in self.repository.list_channels().await? {
            println!(
                "{}\t{}\t{:+.2}%\t{}{}",
                channel.channel_id.as_deref().unwrap_or("-"),
                channel.current_subs,
                channel.growth_rate,
                channel.display_name(),
                if channel.short_video { " [short]" } else { "" }
            );
        }
        Ok(())
    }

    async fn remove(&self, channel_id: &str) -> Result<()> {
        if !self.repository.delete_channel(channel_id).await? {
            return Err(AppError::NotFound(format!("channel {}", channel_id)));
        }
        let records = self.history.delete(channel_id).await?;
        println!("Removed {} and {} history records", channel_id, records);
        Ok(())
    }
}
