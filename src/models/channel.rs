use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest known state of one tracked channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub channel_id: Option<String>,
    pub name: String,
    pub url: String,
    pub current_subs: i64,
    pub last_subs: i64,
    pub growth: i64,
    pub growth_rate: f64,
    pub short_video: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Channel {
    /// Shift `current_subs` into `last_subs` and store the freshly polled count.
    pub fn apply_poll(&mut self, subscribers: i64, polled_at: DateTime<Utc>) {
        let previous = self.current_subs;
        let growth = subscribers - previous;
        let growth_rate = if previous > 0 {
            growth as f64 / previous as f64 * 100.0
        } else {
            0.0
        };

        self.last_subs = previous;
        self.current_subs = subscribers;
        self.growth = growth;
        self.growth_rate = (growth_rate * 10_000.0).round() / 10_000.0;
        self.updated_at = Some(polled_at);
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewChannel {
    pub channel_id: Option<String>,
    pub name: String,
    pub url: String,
    pub current_subs: i64,
    pub last_subs: i64,
    pub growth: i64,
    pub growth_rate: f64,
    pub short_video: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl NewChannel {
    pub fn discovered(channel_id: &str, name: &str) -> Self {
        Self {
            channel_id: Some(channel_id.to_string()),
            name: name.to_string(),
            url: channel_url(channel_id),
            ..Self::default()
        }
    }
}

/// A channel removed by the inactivity policy.
#[derive(Debug, Clone)]
pub struct ArchivedChannel {
    pub channel: Channel,
    pub archived_at: DateTime<Utc>,
}

pub fn channel_url(channel_id: &str) -> String {
    format!("https://www.youtube.com/channel/{}", channel_id)
}
