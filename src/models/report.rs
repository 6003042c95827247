use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Daily => "daily",
            ReportPeriod::Weekly => "weekly",
            ReportPeriod::Monthly => "monthly",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportPeriod::Daily => "Daily",
            ReportPeriod::Weekly => "Weekly",
            ReportPeriod::Monthly => "Monthly",
        }
    }

    /// Short windows produce smaller percentages; scale them before banding.
    pub fn rate_multiplier(&self) -> f64 {
        match self {
            ReportPeriod::Daily => 5.0,
            ReportPeriod::Weekly => 2.0,
            ReportPeriod::Monthly => 1.0,
        }
    }

    pub fn amount_multiplier(&self) -> f64 {
        match self {
            ReportPeriod::Daily => 0.05,
            ReportPeriod::Weekly => 0.2,
            ReportPeriod::Monthly => 1.0,
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Growth quality classes, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    HighPotential,
    QualityGrowth,
    StableGrowth,
    GeneralGrowth,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::HighPotential,
        Tier::QualityGrowth,
        Tier::StableGrowth,
        Tier::GeneralGrowth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::HighPotential => "high-potential",
            Tier::QualityGrowth => "quality-growth",
            Tier::StableGrowth => "stable-growth",
            Tier::GeneralGrowth => "general-growth",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub tier: Tier,
    pub name: String,
    pub url: String,
    pub start_subs: i64,
    pub end_subs: i64,
    pub growth_amount: i64,
    pub growth_rate: f64,
    pub quality_score: u8,
    pub data_days: i64,
    pub updated_at: Option<DateTime<Utc>>,
}
