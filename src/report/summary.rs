use std::path::Path;

use chrono::{Local, NaiveDate};

use crate::config::ReportConfig;
use crate::growth::QualityScorer;
use crate::models::{ReportPeriod, Tier};

use super::generator::Report;

const TOP_COUNT: usize = 5;

fn generated_at() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Subject and body of the summary mail for a written report.
pub fn render_summary(report: &Report, path: &Path, date: NaiveDate) -> (String, String) {
    let title = report.period.title();
    let subject = format!("{} YouTube growth report - {}", title, date.format("%Y-%m-%d"));

    let mut body = format!(
        "{} YouTube channel growth report - {} ({}-day window)\n\n\
         Processing:\n\
         - Channels monitored: {}\n\
         - Channels with enough data: {}\n\
         - Channels recommended: {}\n\n\
         Tiers:\n",
        title,
        date.format("%Y-%m-%d"),
        report.window_days,
        report.processed,
        report.with_data,
        report.rows.len()
    );
    for tier in Tier::ALL {
        let count = report.rows.iter().filter(|r| r.tier == tier).count();
        body.push_str(&format!("- {}: {}\n", tier, count));
    }

    body.push_str(&format!(
        "\nQuality:\n\
         - Average growth rate: {:.1}%\n\
         - Average quality score: {:.1}/10\n\
         - Average data days: {:.1}\n\n\
         Top {}:\n",
        mean(report.rows.iter().map(|r| r.growth_rate)),
        mean(report.rows.iter().map(|r| r.quality_score as f64)),
        mean(report.rows.iter().map(|r| r.data_days as f64)),
        TOP_COUNT
    ));
    for (i, row) in report.rows.iter().take(TOP_COUNT).enumerate() {
        body.push_str(&format!(
            "{}. {} - {:.2}% growth (score {}, +{} subscribers)\n",
            i + 1,
            row.name,
            row.growth_rate,
            row.quality_score,
            row.growth_amount
        ));
    }

    body.push_str(&format!(
        "\nFull report: {}\nGenerated at: {}\n",
        path.display(),
        generated_at()
    ));
    (subject, body)
}

pub fn render_no_data(period: ReportPeriod, date: NaiveDate) -> (String, String) {
    let subject = format!("YouTube channel {} report - no data", period);
    let body = format!(
        "The {} report for {} could not be generated: no tracked channels were found.\n\n\
         Check that channels have been collected or imported and that the database path is correct.\n\n\
         Generated at: {}\n",
        period,
        date.format("%Y-%m-%d"),
        generated_at()
    );
    (subject, body)
}

pub fn render_no_growth(
    scorer: &QualityScorer,
    config: &ReportConfig,
    processed: usize,
    with_data: usize,
    date: NaiveDate,
) -> (String, String) {
    let period = scorer.period();
    let thresholds = scorer.thresholds();
    let subject = format!(
        "{} YouTube growth report - {} (no qualifying channels)",
        period.title(),
        date.format("%Y-%m-%d")
    );
    let body = format!(
        "No channel met the {} growth criteria.\n\n\
         Processing:\n\
         - Channels monitored: {}\n\
         - Channels with at least {} days of history: {}\n\
         - Channels recommended: 0\n\n\
         Active criteria: growth rate >= {}%, growth >= {}, subscribers {}-{}, history >= {} days.\n\n\
         Generated at: {}\n",
        period,
        processed,
        thresholds.min_data_days,
        with_data,
        thresholds.min_growth_rate,
        thresholds.min_growth_amount,
        config.min_subscribers,
        config.max_subscribers,
        thresholds.min_data_days,
        generated_at()
    );
    (subject, body)
}

pub fn render_error(period: ReportPeriod, message: &str, date: NaiveDate) -> (String, String) {
    let subject = format!("YouTube channel {} report - generation failed", period);
    let body = format!(
        "The {} report for {} failed:\n\n{}\n\nSee the log for details.\nGenerated at: {}\n",
        period,
        date.format("%Y-%m-%d"),
        message,
        generated_at()
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportRow;

    fn row(tier: Tier, name: &str, rate: f64, score: u8) -> ReportRow {
        ReportRow {
            tier,
            name: name.to_string(),
            url: String::new(),
            start_subs: 10_000,
            end_subs: 11_000,
            growth_amount: 1_000,
            growth_rate: rate,
            quality_score: score,
            data_days: 7,
            updated_at: None,
        }
    }

    #[test]
    fn summary_counts_tiers_and_lists_top_five() {
        let rows = (0..7)
            .map(|i| row(Tier::GeneralGrowth, &format!("ch{}", i), 4.0, 2))
            .chain([row(Tier::HighPotential, "star", 40.0, 9)])
            .collect();
        let report = Report {
            period: ReportPeriod::Weekly,
            window_days: 7,
            rows,
            processed: 12,
            with_data: 10,
        };
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let (subject, body) = render_summary(&report, Path::new("reports/weekly_report_20250301.csv"), date);
        assert_eq!(subject, "Weekly YouTube growth report - 2025-03-01");
        assert!(body.contains("- high-potential: 1\n"));
        assert!(body.contains("- general-growth: 7\n"));
        assert!(body.contains("Channels monitored: 12"));
        assert!(body.contains("Average growth rate: 8.5%"));
        assert!(body.contains("5. ch4"));
        assert!(!body.contains("6. "));
    }

    #[test]
    fn mean_of_nothing_is_zero() {
        assert_eq!(mean(std::iter::empty()), 0.0);
    }
}
