use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::ReportPeriod;
use crate::services::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,

    pub youtube_api_key: Option<String>,
    pub alert_email: Option<String>,

    #[serde(default = "default_sendmail_path")]
    pub sendmail_path: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Pause between two channels during a polling pass.
    #[serde(default = "default_request_interval")]
    pub request_interval_ms: u64,

    #[serde(default = "default_max_history_records")]
    pub max_history_records: usize,

    /// Per-poll growth rate (percent) that triggers an alert mail.
    #[serde(default = "default_growth_alert_threshold")]
    pub growth_alert_threshold: f64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub inactivity: InactivityConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub collector: CollectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InactivityConfig {
    #[serde(default = "default_inactive_days")]
    pub window_days: usize,
    #[serde(default = "default_growth_threshold")]
    pub growth_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_quota_limit")]
    pub daily_limit: u32,
    /// Stop issuing calls once this many units are spent.
    #[serde(default = "default_quota_safe_limit")]
    pub safe_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodThresholds {
    pub window_days: i64,
    pub min_growth_rate: f64,
    pub min_growth_amount: i64,
    pub min_data_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_min_subscribers")]
    pub min_subscribers: i64,
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: i64,
    #[serde(default = "default_daily")]
    pub daily: PeriodThresholds,
    #[serde(default = "default_weekly")]
    pub weekly: PeriodThresholds,
    #[serde(default = "default_monthly")]
    pub monthly: PeriodThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_collect_days")]
    pub collect_days: i64,
    #[serde(default = "default_collect_min_subs")]
    pub min_subs: i64,
    #[serde(default = "default_collect_max_subs")]
    pub max_subs: i64,
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
}

/// Country growth charts used as a second discovery source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    #[serde(default = "default_leaderboard_url")]
    pub base_url: String,
    /// Country codes scanned when `collect --leaderboard` names none.
    #[serde(default = "default_leaderboard_countries")]
    pub countries: Vec<String>,
    #[serde(default = "default_leaderboard_pages")]
    pub max_pages: usize,
    #[serde(default = "default_leaderboard_page_size")]
    pub page_size: usize,
    #[serde(default = "default_leaderboard_page_interval")]
    pub page_interval_ms: u64,
    #[serde(default = "default_leaderboard_country_interval")]
    pub country_interval_ms: u64,
}

fn data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("subtrack");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_db_path() -> String {
    data_dir().join("subtrack.db").to_string_lossy().to_string()
}

fn default_reports_dir() -> String {
    data_dir().join("reports").to_string_lossy().to_string()
}

fn default_sendmail_path() -> String {
    "/usr/sbin/sendmail".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_request_interval() -> u64 {
    1200
}

fn default_max_history_records() -> usize {
    90
}

fn default_growth_alert_threshold() -> f64 {
    10.0
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_inactive_days() -> usize {
    7
}

fn default_growth_threshold() -> f64 {
    0.01
}

fn default_quota_limit() -> u32 {
    10_000
}

fn default_quota_safe_limit() -> u32 {
    9_000
}

fn default_min_subscribers() -> i64 {
    5_000
}

fn default_max_subscribers() -> i64 {
    500_000
}

fn default_daily() -> PeriodThresholds {
    PeriodThresholds {
        window_days: 1,
        min_growth_rate: 1.0,
        min_growth_amount: 50,
        min_data_days: 1,
    }
}

fn default_weekly() -> PeriodThresholds {
    PeriodThresholds {
        window_days: 7,
        min_growth_rate: 3.0,
        min_growth_amount: 200,
        min_data_days: 3,
    }
}

fn default_monthly() -> PeriodThresholds {
    PeriodThresholds {
        window_days: 30,
        min_growth_rate: 5.0,
        min_growth_amount: 500,
        min_data_days: 7,
    }
}

fn default_collect_days() -> i64 {
    30
}

fn default_collect_min_subs() -> i64 {
    10_000
}

fn default_collect_max_subs() -> i64 {
    300_000
}

fn default_result_limit() -> usize {
    100
}

fn default_leaderboard_url() -> String {
    crate::services::DEFAULT_LEADERBOARD_URL.to_string()
}

fn default_leaderboard_countries() -> Vec<String> {
    [
        "AR", "AU", "AT", "BE", "BR", "CA", "CL", "CN", "CO", "CZ", "DK", "EG", "FR", "DE", "HK",
        "HU", "IN", "ID", "IE", "IL", "IT", "JP", "KZ", "KR", "MY", "MX", "MA", "NP", "NL", "NZ",
        "NG", "NO", "PE", "PH", "PL", "PT", "RO", "RU", "SA", "SG", "ZA", "ES", "SE", "CH", "TW",
        "TH", "TR", "UA", "US", "GB",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

fn default_leaderboard_pages() -> usize {
    2
}

fn default_leaderboard_page_size() -> usize {
    20
}

fn default_leaderboard_page_interval() -> u64 {
    10_000
}

fn default_leaderboard_country_interval() -> u64 {
    20_000
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            base_url: default_leaderboard_url(),
            countries: default_leaderboard_countries(),
            max_pages: default_leaderboard_pages(),
            page_size: default_leaderboard_page_size(),
            page_interval_ms: default_leaderboard_page_interval(),
            country_interval_ms: default_leaderboard_country_interval(),
        }
    }
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            window_days: default_inactive_days(),
            growth_threshold: default_growth_threshold(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_quota_limit(),
            safe_limit: default_quota_safe_limit(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            min_subscribers: default_min_subscribers(),
            max_subscribers: default_max_subscribers(),
            daily: default_daily(),
            weekly: default_weekly(),
            monthly: default_monthly(),
        }
    }
}

impl ReportConfig {
    pub fn thresholds(&self, period: ReportPeriod) -> &PeriodThresholds {
        match period {
            ReportPeriod::Daily => &self.daily,
            ReportPeriod::Weekly => &self.weekly,
            ReportPeriod::Monthly => &self.monthly,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            collect_days: default_collect_days(),
            min_subs: default_collect_min_subs(),
            max_subs: default_collect_max_subs(),
            result_limit: default_result_limit(),
            leaderboard: LeaderboardConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            reports_dir: default_reports_dir(),
            youtube_api_key: None,
            alert_email: None,
            sendmail_path: default_sendmail_path(),
            request_timeout_secs: default_request_timeout(),
            request_interval_ms: default_request_interval(),
            max_history_records: default_max_history_records(),
            growth_alert_threshold: default_growth_alert_threshold(),
            log_level: default_log_level(),
            inactivity: InactivityConfig::default(),
            retry: RetryPolicy::default(),
            quota: QuotaConfig::default(),
            report: ReportConfig::default(),
            collector: CollectorConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path` (or the default location), writing defaults on first run.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("subtrack")
            .join("config.toml")
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("YOUTUBE_API_KEY").filter(|v| !v.is_empty()) {
            self.youtube_api_key = Some(key);
        }
        if let Some(email) = lookup("ALERT_EMAIL").filter(|v| !v.is_empty()) {
            self.alert_email = Some(email);
        }
        if let Some(db) = lookup("SUBTRACK_DB").filter(|v| !v.is_empty()) {
            self.db_path = db;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_history_records < 2 {
            return Err(AppError::Config(
                "max_history_records must be at least 2".to_string(),
            ));
        }
        if self.inactivity.window_days == 0 {
            return Err(AppError::Config(
                "inactivity.window_days must be positive".to_string(),
            ));
        }
        for period in [ReportPeriod::Daily, ReportPeriod::Weekly, ReportPeriod::Monthly] {
            if self.report.thresholds(period).window_days < 1 {
                return Err(AppError::Config(format!(
                    "report.{}.window_days must be at least 1",
                    period.as_str()
                )));
            }
        }
        if self.report.min_subscribers > self.report.max_subscribers {
            return Err(AppError::Config(format!(
                "report.min_subscribers ({}) exceeds report.max_subscribers ({})",
                self.report.min_subscribers, self.report.max_subscribers
            )));
        }
        if self.quota.safe_limit > self.quota.daily_limit {
            return Err(AppError::Config(
                "quota.safe_limit must not exceed quota.daily_limit".to_string(),
            ));
        }
        Ok(())
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.youtube_api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("youtube_api_key is not set (or YOUTUBE_API_KEY)".to_string()))
    }
}
