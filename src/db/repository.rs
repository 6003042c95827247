use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{ArchivedChannel, Channel, KeywordScore, NewChannel};

use super::history::HistoryStore;
use super::schema::SCHEMA;

const CHANNEL_COLUMNS: &str = "id, channel_id, name, url, current_subs, last_subs, growth, growth_rate, short_video, updated_at";

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// History series share the snapshot database.
    pub fn history(&self, max_records: usize) -> HistoryStore {
        HistoryStore::new(self.conn.clone(), max_records)
    }

    // Channel operations

    /// Insert a newly discovered channel; returns false when it is already tracked.
    pub async fn insert_channel(&self, channel: NewChannel) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO channels (channel_id, name, url, current_subs, last_subs, growth, growth_rate, short_video, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                       ON CONFLICT DO NOTHING"#,
                    params![
                        channel.channel_id,
                        channel.name,
                        channel.url,
                        channel.current_subs,
                        channel.last_subs,
                        channel.growth,
                        channel.growth_rate,
                        channel.short_video,
                        channel.updated_at.map(|dt| dt.to_rfc3339()),
                    ],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(inserted)
    }

    /// Insert or overwrite a channel keyed by its URL.
    pub async fn upsert_channel(&self, channel: NewChannel) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO channels (channel_id, name, url, current_subs, last_subs, growth, growth_rate, short_video, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                       ON CONFLICT(url) DO UPDATE SET
                           channel_id = COALESCE(excluded.channel_id, channels.channel_id),
                           name = excluded.name,
                           current_subs = excluded.current_subs,
                           last_subs = excluded.last_subs,
                           growth = excluded.growth,
                           growth_rate = excluded.growth_rate,
                           short_video = excluded.short_video,
                           updated_at = COALESCE(excluded.updated_at, channels.updated_at)"#,
                    params![
                        channel.channel_id,
                        channel.name,
                        channel.url,
                        channel.current_subs,
                        channel.last_subs,
                        channel.growth,
                        channel.growth_rate,
                        channel.short_video,
                        channel.updated_at.map(|dt| dt.to_rfc3339()),
                    ],
                )?;
                let id = conn.query_row(
                    "SELECT id FROM channels WHERE url = ?1",
                    params![channel.url],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Option<Channel>> {
        let channel_id = channel_id.to_string();
        let channel = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM channels WHERE channel_id = ?1",
                    CHANNEL_COLUMNS
                ))?;
                let channel = stmt
                    .query_row(params![channel_id], channel_from_row)
                    .optional()?;
                Ok(channel)
            })
            .await?;
        Ok(channel)
    }

    pub async fn list_channels(&self) -> Result<Vec<Channel>> {
        let channels = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM channels ORDER BY id",
                    CHANNEL_COLUMNS
                ))?;
                let channels = stmt
                    .query_map([], channel_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(channels)
            })
            .await?;
        Ok(channels)
    }

    /// Persist a polling pass; either every row is written or none is.
    pub async fn update_channels(&self, channels: Vec<Channel>) -> Result<usize> {
        let written = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        r#"UPDATE channels SET
                               channel_id = ?1, name = ?2, current_subs = ?3, last_subs = ?4,
                               growth = ?5, growth_rate = ?6, short_video = ?7, updated_at = ?8
                           WHERE id = ?9"#,
                    )?;
                    for channel in &channels {
                        stmt.execute(params![
                            channel.channel_id,
                            channel.name,
                            channel.current_subs,
                            channel.last_subs,
                            channel.growth,
                            channel.growth_rate,
                            channel.short_video,
                            channel.updated_at.map(|dt| dt.to_rfc3339()),
                            channel.id,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(channels.len())
            })
            .await?;
        Ok(written)
    }

    pub async fn rename_channel(&self, channel_id: &str, name: &str, url: &str) -> Result<()> {
        let (channel_id, name, url) = (channel_id.to_string(), name.to_string(), url.to_string());
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE channels SET name = ?1, url = ?2 WHERE channel_id = ?3",
                    params![name, url, channel_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_channel_id(&self, id: i64, channel_id: &str) -> Result<()> {
        let channel_id = channel_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE channels SET channel_id = ?1 WHERE id = ?2",
                    params![channel_id, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_short_video(&self, id: i64, short_video: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE channels SET short_video = ?1 WHERE id = ?2",
                    params![short_video, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn delete_channel(&self, channel_id: &str) -> Result<bool> {
        let channel_id = channel_id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                let changed =
                    conn.execute("DELETE FROM channels WHERE channel_id = ?1", params![channel_id])?;
                Ok(changed > 0)
            })
            .await?;
        Ok(deleted)
    }

    // Inactive archive

    /// Copy channels into the archive, then drop them and their history in one transaction.
    pub async fn retire_channels(
        &self,
        channels: Vec<Channel>,
        archived_at: DateTime<Utc>,
    ) -> Result<usize> {
        let archived_at = archived_at.to_rfc3339();
        let retired = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut archive = tx.prepare(
                        r#"INSERT INTO inactive_channels
                               (channel_id, name, url, current_subs, last_subs, growth, growth_rate, short_video, updated_at, archived_at)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
                    )?;
                    let mut remove = tx.prepare("DELETE FROM channels WHERE id = ?1")?;
                    let mut drop_history = tx.prepare("DELETE FROM history WHERE channel_id = ?1")?;
                    for channel in &channels {
                        archive.execute(params![
                            channel.channel_id,
                            channel.name,
                            channel.url,
                            channel.current_subs,
                            channel.last_subs,
                            channel.growth,
                            channel.growth_rate,
                            channel.short_video,
                            channel.updated_at.map(|dt| dt.to_rfc3339()),
                            archived_at,
                        ])?;
                        remove.execute(params![channel.id])?;
                        if let Some(channel_id) = &channel.channel_id {
                            let removed = drop_history.execute(params![channel_id])?;
                            tracing::debug!("Deleted {} history records for {}", removed, channel_id);
                        }
                    }
                }
                tx.commit()?;
                Ok(channels.len())
            })
            .await?;
        Ok(retired)
    }

    pub async fn list_archived(&self) -> Result<Vec<ArchivedChannel>> {
        let archived = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, channel_id, name, url, current_subs, last_subs, growth, growth_rate,
                              short_video, updated_at, archived_at
                       FROM inactive_channels ORDER BY id"#,
                )?;
                let archived = stmt
                    .query_map([], |row| {
                        Ok(ArchivedChannel {
                            channel: channel_from_row(row)?,
                            archived_at: row
                                .get::<_, String>(10)
                                .ok()
                                .and_then(|s| parse_datetime(&s))
                                .unwrap_or_else(Utc::now),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(archived)
            })
            .await?;
        Ok(archived)
    }

    // Keyword scores

    pub async fn record_keyword_score(&self, score: KeywordScore) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO keyword_scores
                           (date, keyword, total_videos, long_videos, total_channels, potential_channels, hot_rate)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                    params![
                        score.date.format("%Y-%m-%d").to_string(),
                        score.keyword,
                        score.total_videos as i64,
                        score.long_videos as i64,
                        score.total_channels as i64,
                        score.potential_channels as i64,
                        score.hot_rate(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn keyword_count(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count = conn.query_row("SELECT COUNT(*) FROM keyword_scores", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn channel_from_row(row: &Row) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        current_subs: row.get(4)?,
        last_subs: row.get(5)?,
        growth: row.get(6)?,
        growth_rate: row.get(7)?,
        short_video: row.get::<_, i64>(8)? != 0,
        updated_at: row
            .get::<_, Option<String>>(9)?
            .and_then(|s| parse_datetime(&s)),
    })
}
