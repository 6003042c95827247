use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::{AppError, Result};

pub const DEFAULT_LEADERBOARD_URL: &str = "https://lapi.playboard.co/v1/chart/channel";

/// Chart parameters: daily period, growth dimension, ranked within the country.
const CHART_TYPE_ID: &str = "10";
const PERIOD_TYPE_DAILY: &str = "2";
const INDEX_DIMENSION_GROWTH: &str = "31";
const INDEX_TYPE_COUNTRY: &str = "1";

/// Hour of the daily chart snapshot, local time.
const SNAPSHOT_HOUR: u32 = 8;

/// Per-country growth charts, read one cursor page at a time.
#[allow(async_fn_in_trait)]
pub trait LeaderboardSource {
    async fn fetch_page(
        &self,
        country: &str,
        period: i64,
        cursor: Option<&str>,
    ) -> Result<LeaderboardPage>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub channel_id: String,
    pub title: String,
    pub subscribers: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaderboardPage {
    pub entries: Vec<LeaderboardEntry>,
    pub cursor: Option<String>,
}

/// Start of the chart day `days_ago` days before `today`.
pub fn snapshot_time(today: NaiveDate, days_ago: i64) -> Option<NaiveDateTime> {
    let day = today.checked_sub_signed(chrono::TimeDelta::try_days(days_ago)?)?;
    Some(day.and_time(NaiveTime::from_hms_opt(SNAPSHOT_HOUR, 0, 0)?))
}

/// Unix timestamp of yesterday's local snapshot, the most recent complete chart.
pub fn latest_period() -> Option<i64> {
    let snapshot = snapshot_time(Local::now().date_naive(), 1)?;
    Local
        .from_local_datetime(&snapshot)
        .earliest()
        .map(|dt| dt.timestamp())
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    #[serde(default)]
    list: Vec<ChartItem>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartItem {
    #[serde(default)]
    channel: Option<ChartChannel>,
}

#[derive(Debug, Deserialize)]
struct ChartChannel {
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(rename = "subscriberCount")]
    subscriber_count: Option<i64>,
}

impl ChartResponse {
    fn into_page(self) -> LeaderboardPage {
        let entries = self
            .list
            .into_iter()
            .filter_map(|item| item.channel)
            .filter_map(|ch| {
                let channel_id = ch.channel_id.filter(|id| !id.is_empty())?;
                Some(LeaderboardEntry {
                    channel_id,
                    title: ch.name,
                    subscribers: ch.subscriber_count.unwrap_or(0),
                })
            })
            .collect();
        LeaderboardPage {
            entries,
            cursor: self.cursor.filter(|c| !c.is_empty()),
        }
    }
}

fn classify_chart_error(status: StatusCode, body: &str) -> AppError {
    let snippet: String = body.chars().take(200).collect();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AppError::Transient(format!("HTTP {}: {}", status, snippet))
    } else {
        AppError::Api(format!("HTTP {}: {}", status, snippet))
    }
}

pub struct LeaderboardClient {
    client: Client,
    base_url: String,
    page_size: usize,
}

impl LeaderboardClient {
    pub fn new(base_url: impl Into<String>, page_size: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (compatible; subtrack/1.0)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            page_size,
        })
    }
}

impl LeaderboardSource for LeaderboardClient {
    async fn fetch_page(
        &self,
        country: &str,
        period: i64,
        cursor: Option<&str>,
    ) -> Result<LeaderboardPage> {
        let period = period.to_string();
        let size = self.page_size.to_string();
        let mut query = vec![
            ("locale", "en"),
            ("countryCode", country),
            ("period", period.as_str()),
            ("size", size.as_str()),
            ("chartTypeId", CHART_TYPE_ID),
            ("periodTypeId", PERIOD_TYPE_DAILY),
            ("indexDimensionId", INDEX_DIMENSION_GROWTH),
            ("indexTypeId", INDEX_TYPE_COUNTRY),
            ("indexTarget", country),
            ("indexCountryCode", country),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let response = self.client.get(&self.base_url).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_chart_error(status, &body));
        }

        let chart: ChartResponse = response.json().await?;
        Ok(chart.into_page())
    }
}
