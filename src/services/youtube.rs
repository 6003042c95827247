use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};

use super::quota::QuotaTracker;

const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";
const MAX_PAGE_SIZE: usize = 50;
const SEARCH_COST: u32 = 100;
const LIST_COST: u32 = 1;

/// Source of current channel statistics.
#[allow(async_fn_in_trait)]
pub trait StatsProvider {
    async fn subscriber_count(&self, channel_id: &str, quota: &QuotaTracker) -> Result<i64>;

    /// Resolve a `/user/` or `/@handle` URL to a channel id.
    async fn resolve_channel_id(&self, url: &str, quota: &QuotaTracker) -> Result<String>;

    /// Durations in seconds of the channel's most recent uploads, newest first.
    async fn recent_video_durations(&self, channel_id: &str, quota: &QuotaTracker) -> Result<Vec<u64>>;
}

/// Keyword search used to discover candidate channels.
#[allow(async_fn_in_trait)]
pub trait DiscoveryProvider {
    async fn search_videos(
        &self,
        keyword: &str,
        published_after: DateTime<Utc>,
        limit: usize,
        quota: &QuotaTracker,
    ) -> Result<Vec<VideoHit>>;

    async fn video_durations(&self, video_ids: &[String], quota: &QuotaTracker) -> Result<Vec<(String, u64)>>;

    async fn channel_summaries(&self, channel_ids: &[String], quota: &QuotaTracker) -> Result<Vec<ChannelSummary>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoHit {
    pub video_id: String,
    pub channel_id: String,
    pub channel_title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub channel_id: String,
    pub title: String,
    pub subscribers: i64,
}

/// How a channel URL identifies its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(String),
    Username(String),
    Handle(String),
}

impl ChannelRef {
    /// `/channel/<id>`, `/user/<name>` or `/@handle`; anything else is taken as a bare id.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        let Ok(url) = Url::parse(input) else {
            return Some(ChannelRef::Id(input.to_string()));
        };

        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        match segments.next() {
            Some("channel") => segments.next().map(|id| ChannelRef::Id(id.to_string())),
            Some("user") => segments.next().map(|name| ChannelRef::Username(name.to_string())),
            Some(first) if first.starts_with('@') && first.len() > 1 => {
                Some(ChannelRef::Handle(first[1..].to_string()))
            }
            _ => None,
        }
    }
}

/// Seconds in an ISO-8601 duration such as `PT1H2M3S` or `P1DT2H`.
pub fn parse_iso8601_duration(s: &str) -> Option<u64> {
    static DURATION_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = DURATION_RE
        .get_or_init(|| {
            Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.\d+)?S)?)?$").ok()
        })
        .as_ref()?;

    let caps = re.captures(s.trim())?;
    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(part(1) * 86_400 + part(2) * 3_600 + part(3) * 60 + part(4))
}

// API response shapes

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: Option<ChannelSnippet>,
    statistics: Option<ChannelStatistics>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ChannelStatistics {
    #[serde(rename = "subscriberCount")]
    subscriber_count: Option<String>,
}

impl ChannelStatistics {
    fn subscribers(&self) -> i64 {
        self.subscriber_count
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    #[serde(rename = "channelId")]
    channel_id: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    #[serde(rename = "contentDetails")]
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemDetails {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: VideoDetails,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    duration: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Map a failed API response onto the error taxonomy.
fn classify_api_error(status: StatusCode, body: &str) -> AppError {
    let (message, reasons) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (
            envelope.error.message,
            envelope
                .error
                .errors
                .into_iter()
                .map(|e| e.reason)
                .collect::<Vec<_>>(),
        ),
        Err(_) => (body.chars().take(200).collect(), Vec::new()),
    };
    let has_reason = |wanted: &[&str]| reasons.iter().any(|r| wanted.contains(&r.as_str()));

    if has_reason(&["quotaExceeded", "dailyLimitExceeded"]) {
        return AppError::QuotaExhausted;
    }
    if status == StatusCode::TOO_MANY_REQUESTS
        || has_reason(&["rateLimitExceeded", "userRateLimitExceeded"])
        || status.is_server_error()
    {
        return AppError::Transient(format!("HTTP {}: {}", status, message));
    }
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || has_reason(&["keyInvalid", "keyExpired"])
    {
        return AppError::InvalidCredential(format!("HTTP {}: {}", status, message));
    }
    AppError::Api(format!("HTTP {}: {}", status, message))
}

pub struct YouTubeClient {
    client: Client,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("subtrack/1.0")
            .build()?;

        Ok(Self { client, api_key })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        cost: u32,
        quota: &QuotaTracker,
    ) -> Result<T> {
        quota.charge(cost)?;

        let response = self
            .client
            .get(format!("{}/{}", YOUTUBE_API_URL, endpoint))
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = classify_api_error(status, &body);
            match &error {
                AppError::QuotaExhausted => {
                    quota.mark_exhausted();
                    tracing::error!("YouTube API quota exhausted");
                }
                AppError::InvalidCredential(msg) => {
                    quota.mark_exhausted();
                    tracing::error!("YouTube API key rejected: {}", msg);
                }
                _ => {}
            }
            return Err(error);
        }

        Ok(response.json().await?)
    }

    async fn uploads_playlist(&self, channel_id: &str, quota: &QuotaTracker) -> Result<String> {
        let response: ListResponse<ChannelItem> = self
            .get(
                "channels",
                &[("part", "contentDetails"), ("id", channel_id)],
                LIST_COST,
                quota,
            )
            .await?;

        response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.content_details)
            .and_then(|details| details.related_playlists.uploads)
            .ok_or_else(|| AppError::NotFound(format!("uploads playlist for {}", channel_id)))
    }
}

impl StatsProvider for YouTubeClient {
    async fn subscriber_count(&self, channel_id: &str, quota: &QuotaTracker) -> Result<i64> {
        let response: ListResponse<ChannelItem> = self
            .get(
                "channels",
                &[("part", "statistics"), ("id", channel_id)],
                LIST_COST,
                quota,
            )
            .await?;

        let item = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("channel {}", channel_id)))?;
        Ok(item.statistics.map(|s| s.subscribers()).unwrap_or(0))
    }

    async fn resolve_channel_id(&self, url: &str, quota: &QuotaTracker) -> Result<String> {
        match ChannelRef::parse(url) {
            Some(ChannelRef::Id(id)) => Ok(id),
            Some(ChannelRef::Username(name)) => {
                let response: ListResponse<ChannelItem> = self
                    .get(
                        "channels",
                        &[("part", "id"), ("forUsername", name.as_str())],
                        LIST_COST,
                        quota,
                    )
                    .await?;
                response
                    .items
                    .into_iter()
                    .next()
                    .map(|item| item.id)
                    .ok_or_else(|| AppError::NotFound(format!("user {}", name)))
            }
            Some(ChannelRef::Handle(handle)) => {
                let q = format!("@{}", handle);
                let response: ListResponse<SearchItem> = self
                    .get(
                        "search",
                        &[
                            ("part", "snippet"),
                            ("q", q.as_str()),
                            ("type", "channel"),
                            ("maxResults", "1"),
                        ],
                        SEARCH_COST,
                        quota,
                    )
                    .await?;
                response
                    .items
                    .into_iter()
                    .next()
                    .map(|item| item.id.channel_id.unwrap_or(item.snippet.channel_id))
                    .ok_or_else(|| AppError::NotFound(format!("handle @{}", handle)))
            }
            None => Err(anyhow::anyhow!("Unrecognised channel URL: {}", url).into()),
        }
    }

    async fn recent_video_durations(&self, channel_id: &str, quota: &QuotaTracker) -> Result<Vec<u64>> {
        let playlist = self.uploads_playlist(channel_id, quota).await?;
        let items: ListResponse<PlaylistItem> = self
            .get(
                "playlistItems",
                &[
                    ("part", "contentDetails"),
                    ("playlistId", playlist.as_str()),
                    ("maxResults", "5"),
                ],
                LIST_COST,
                quota,
            )
            .await?;

        let ids: Vec<String> = items
            .items
            .into_iter()
            .map(|item| item.content_details.video_id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let durations = self.video_durations(&ids, quota).await?;
        Ok(ids
            .iter()
            .filter_map(|id| durations.iter().find(|(v, _)| v == id).map(|(_, secs)| *secs))
            .collect())
    }
}

impl DiscoveryProvider for YouTubeClient {
    async fn search_videos(
        &self,
        keyword: &str,
        published_after: DateTime<Utc>,
        limit: usize,
        quota: &QuotaTracker,
    ) -> Result<Vec<VideoHit>> {
        let published_after = published_after.to_rfc3339_opts(SecondsFormat::Secs, true);
        let page_size = MAX_PAGE_SIZE.to_string();
        let mut hits = Vec::new();
        let mut page_token: Option<String> = None;

        while hits.len() < limit {
            let mut query = vec![
                ("part", "id,snippet"),
                ("q", keyword),
                ("type", "video"),
                ("order", "viewCount"),
                ("maxResults", page_size.as_str()),
                ("publishedAfter", published_after.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response: ListResponse<SearchItem> =
                self.get("search", &query, SEARCH_COST, quota).await?;

            hits.extend(response.items.into_iter().filter_map(|item| {
                item.id.video_id.map(|video_id| VideoHit {
                    video_id,
                    channel_id: item.snippet.channel_id,
                    channel_title: item.snippet.channel_title,
                })
            }));

            match response.next_page_token {
                Some(token) if hits.len() < limit => {
                    page_token = Some(token);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                _ => break,
            }
        }

        hits.truncate(limit);
        Ok(hits)
    }

    async fn video_durations(&self, video_ids: &[String], quota: &QuotaTracker) -> Result<Vec<(String, u64)>> {
        let mut durations = Vec::with_capacity(video_ids.len());
        for batch in video_ids.chunks(MAX_PAGE_SIZE) {
            let ids = batch.join(",");
            let response: ListResponse<VideoItem> = self
                .get(
                    "videos",
                    &[("part", "contentDetails"), ("id", ids.as_str())],
                    batch.len() as u32 * LIST_COST,
                    quota,
                )
                .await?;
            durations.extend(response.items.into_iter().filter_map(|item| {
                parse_iso8601_duration(&item.content_details.duration).map(|secs| (item.id, secs))
            }));
        }
        Ok(durations)
    }

    async fn channel_summaries(&self, channel_ids: &[String], quota: &QuotaTracker) -> Result<Vec<ChannelSummary>> {
        let mut summaries = Vec::with_capacity(channel_ids.len());
        for batch in channel_ids.chunks(MAX_PAGE_SIZE) {
            let ids = batch.join(",");
            let response: ListResponse<ChannelItem> = self
                .get(
                    "channels",
                    &[("part", "snippet,statistics"), ("id", ids.as_str())],
                    batch.len() as u32 * LIST_COST,
                    quota,
                )
                .await?;
            summaries.extend(response.items.into_iter().map(|item| ChannelSummary {
                subscribers: item.statistics.as_ref().map(|s| s.subscribers()).unwrap_or(0),
                title: item.snippet.map(|s| s.title).unwrap_or_default(),
                channel_id: item.id,
            }));
        }
        Ok(summaries)
    }
}
