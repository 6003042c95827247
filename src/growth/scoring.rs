use crate::config::{PeriodThresholds, ReportConfig};
use crate::models::{Channel, GrowthResult, ReportPeriod, ReportRow, Tier};

const MAX_SCORE: u8 = 10;

/// Ranks channel growth for one report period.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    period: ReportPeriod,
    thresholds: PeriodThresholds,
    min_subscribers: i64,
    max_subscribers: i64,
}

impl QualityScorer {
    pub fn new(period: ReportPeriod, config: &ReportConfig) -> Self {
        Self {
            period,
            thresholds: config.thresholds(period).clone(),
            min_subscribers: config.min_subscribers,
            max_subscribers: config.max_subscribers,
        }
    }

    pub fn period(&self) -> ReportPeriod {
        self.period
    }

    pub fn thresholds(&self) -> &PeriodThresholds {
        &self.thresholds
    }

    /// Quality score in `0..=10` from channel scale, period-normalised rate and amount.
    pub fn score(&self, current_subs: i64, growth_rate: f64, growth_amount: i64) -> u8 {
        let scale = match current_subs {
            s if s >= 1_000_000 => 3,
            s if s >= 500_000 => 2,
            s if s >= 100_000 => 1,
            _ => 0,
        };

        let rate = growth_rate * self.period.rate_multiplier();
        let rate_points = if rate > 20.0 {
            4
        } else if rate > 15.0 {
            3
        } else if rate > 10.0 {
            2
        } else if rate > 5.0 {
            1
        } else {
            0
        };

        let amount = growth_amount as f64 * self.period.amount_multiplier();
        let amount_points = if amount > 10_000.0 {
            3
        } else if amount > 5_000.0 {
            2
        } else if amount > 1_000.0 {
            1
        } else {
            0
        };

        (scale + rate_points + amount_points).min(MAX_SCORE)
    }

    pub fn tier(&self, growth_rate: f64, growth_amount: i64, score: u8) -> Tier {
        let min_rate = self.thresholds.min_growth_rate;
        let min_amount = self.thresholds.min_growth_amount as f64;
        let amount = growth_amount as f64;

        if growth_rate > min_rate * 3.0 && amount > min_amount * 10.0 && score >= 8 {
            Tier::HighPotential
        } else if growth_rate > min_rate * 2.0 && amount > min_amount * 5.0 && score >= 6 {
            Tier::QualityGrowth
        } else if growth_rate > min_rate * 1.5 && amount > min_amount * 2.0 {
            Tier::StableGrowth
        } else {
            Tier::GeneralGrowth
        }
    }

    /// Whether a channel's growth qualifies for the report at all.
    pub fn includes(&self, growth: &GrowthResult, short_video: bool) -> bool {
        !short_video
            && growth.rate >= self.thresholds.min_growth_rate
            && growth.amount >= self.thresholds.min_growth_amount
            && (self.min_subscribers..=self.max_subscribers).contains(&growth.end_subs)
            && growth.data_days >= self.thresholds.min_data_days
    }

    /// Build the report row for `channel`, or `None` when it is filtered out.
    pub fn evaluate(&self, channel: &Channel, growth: &GrowthResult) -> Option<ReportRow> {
        if !self.includes(growth, channel.short_video) {
            return None;
        }

        let quality_score = self.score(growth.end_subs, growth.rate, growth.amount);
        Some(ReportRow {
            tier: self.tier(growth.rate, growth.amount, quality_score),
            name: channel.display_name().to_string(),
            url: channel.url.clone(),
            start_subs: growth.start_subs,
            end_subs: growth.end_subs,
            growth_amount: growth.amount,
            growth_rate: (growth.rate * 100.0).round() / 100.0,
            quality_score,
            data_days: growth.data_days,
            updated_at: channel.updated_at,
        })
    }
}

/// Best tier first, then highest score.
pub fn rank(rows: &mut [ReportRow]) {
    rows.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then_with(|| b.quality_score.cmp(&a.quality_score))
    });
}
