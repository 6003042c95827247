use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::config::ReportConfig;
use crate::db::Repository;
use crate::error::Result;
use crate::growth::{rank, GrowthCalculator, QualityScorer};
use crate::models::{ReportPeriod, ReportRow};
use crate::services::{write_atomic, Mailer, Notifier};

use super::summary::{render_error, render_no_data, render_no_growth, render_summary};

/// Ranked rows for one period plus the counts shown in the summary.
#[derive(Debug, Clone)]
pub struct Report {
    pub period: ReportPeriod,
    pub window_days: i64,
    pub rows: Vec<ReportRow>,
    /// Every row of the snapshot table.
    pub processed: usize,
    /// Channels with enough history to be judged.
    pub with_data: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    NoData,
    NoGrowth { processed: usize, with_data: usize },
    Written { path: PathBuf, rows: usize },
    Failed(String),
}

pub struct ReportGenerator<'a, M> {
    repo: &'a Repository,
    calculator: GrowthCalculator,
    config: &'a ReportConfig,
    reports_dir: PathBuf,
    notifier: &'a Notifier<M>,
}

impl<'a, M: Mailer> ReportGenerator<'a, M> {
    pub fn new(
        repo: &'a Repository,
        calculator: GrowthCalculator,
        config: &'a ReportConfig,
        reports_dir: impl Into<PathBuf>,
        notifier: &'a Notifier<M>,
    ) -> Self {
        Self {
            repo,
            calculator,
            config,
            reports_dir: reports_dir.into(),
            notifier,
        }
    }

    /// Build, write and mail the report. Every failure ends up as a notification.
    pub async fn generate(&self, period: ReportPeriod, window_days: Option<i64>) -> ReportOutcome {
        let window_days = window_days.unwrap_or(self.config.thresholds(period).window_days);
        info!("Generating {} report over {} days", period, window_days);

        let outcome = match self.build(period, window_days).await {
            Ok(None) => Ok(ReportOutcome::NoData),
            Ok(Some(report)) if report.rows.is_empty() => Ok(ReportOutcome::NoGrowth {
                processed: report.processed,
                with_data: report.with_data,
            }),
            Ok(Some(report)) => self.publish(&report).await,
            Err(e) => Err(e),
        };

        let today = Local::now().date_naive();
        match outcome {
            Ok(ReportOutcome::NoData) => {
                warn!("No channel data, {} report skipped", period);
                let (subject, body) = render_no_data(period, today);
                self.notifier.notify(&subject, &body).await;
                ReportOutcome::NoData
            }
            Ok(ReportOutcome::NoGrowth { processed, with_data }) => {
                info!("No channels qualified for the {} report", period);
                let scorer = QualityScorer::new(period, self.config);
                let (subject, body) = render_no_growth(&scorer, self.config, processed, with_data, today);
                self.notifier.notify(&subject, &body).await;
                ReportOutcome::NoGrowth { processed, with_data }
            }
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to generate {} report: {}", period, e);
                let (subject, body) = render_error(period, &e.to_string(), today);
                self.notifier.notify(&subject, &body).await;
                ReportOutcome::Failed(e.to_string())
            }
        }
    }

    /// `None` when the snapshot table is empty.
    pub async fn build(&self, period: ReportPeriod, window_days: i64) -> Result<Option<Report>> {
        let channels = self.repo.list_channels().await?;
        if channels.is_empty() {
            return Ok(None);
        }

        let scorer = QualityScorer::new(period, self.config);
        let mut report = Report {
            period,
            window_days,
            rows: Vec::new(),
            processed: channels.len(),
            with_data: 0,
        };

        for channel in &channels {
            if channel.short_video {
                continue;
            }
            let Some(channel_id) = channel.channel_id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };

            let growth = self.calculator.compute(channel_id, window_days).await;
            if !growth.reliable {
                debug!("{}: only {} days of history", channel_id, growth.data_days);
            }
            if growth.data_days >= scorer.thresholds().min_data_days {
                report.with_data += 1;
            }
            if let Some(row) = scorer.evaluate(channel, &growth) {
                report.rows.push(row);
            }
        }

        rank(&mut report.rows);
        info!(
            "{} report: {} channels processed, {} with enough data, {} recommended",
            period.title(),
            report.processed,
            report.with_data,
            report.rows.len()
        );
        Ok(Some(report))
    }

    async fn publish(&self, report: &Report) -> Result<ReportOutcome> {
        let today = Local::now().date_naive();
        let path = report_path(&self.reports_dir, report.period, today);
        write_report_csv(&path, report)?;
        info!("{} report written to {}", report.period.title(), path.display());

        let (subject, body) = render_summary(report, &path, today);
        self.notifier.notify(&subject, &body).await;
        Ok(ReportOutcome::Written {
            path,
            rows: report.rows.len(),
        })
    }
}

pub fn report_path(dir: &Path, period: ReportPeriod, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}_report_{}.csv", period, date.format("%Y%m%d")))
}

fn write_report_csv(path: &Path, report: &Report) -> Result<()> {
    let title = report.period.title();
    let growth_header = format!("{} Growth", title);
    let rate_header = format!("{} Growth Rate %", title);
    let headers = [
        "Tier",
        "Channel",
        "URL",
        "Start Subscribers",
        "End Subscribers",
        growth_header.as_str(),
        rate_header.as_str(),
        "Quality Score",
        "Data Days",
        "Updated At",
    ];

    let rows: Vec<Vec<String>> = report
        .rows
        .iter()
        .map(|row| {
            vec![
                row.tier.to_string(),
                row.name.clone(),
                row.url.clone(),
                row.start_subs.to_string(),
                row.end_subs.to_string(),
                row.growth_amount.to_string(),
                format!("{:.2}", row.growth_rate),
                row.quality_score.to_string(),
                row.data_days.to_string(),
                row.updated_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect();

    write_atomic(path, &headers, &rows)
}
