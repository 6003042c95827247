use chrono::NaiveDateTime;
use rusqlite::params;
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{format_timestamp, parse_timestamp, HistoryRecord};

/// Per-channel subscriber series with bounded retention.
///
/// One record per distinct timestamp: re-appending a timestamp replaces its
/// count. After every append only the newest `max_records` survive.
#[derive(Clone)]
pub struct HistoryStore {
    conn: Connection,
    max_records: usize,
}

impl HistoryStore {
    pub fn new(conn: Connection, max_records: usize) -> Self {
        Self { conn, max_records }
    }

    pub async fn append(
        &self,
        channel_id: &str,
        recorded_at: NaiveDateTime,
        subscribers: i64,
    ) -> Result<()> {
        let channel_id = channel_id.to_string();
        let recorded_at = format_timestamp(&recorded_at);
        let max_records = self.max_records as i64;

        let evicted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    r#"INSERT INTO history (channel_id, recorded_at, subscribers)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(channel_id, recorded_at) DO UPDATE SET
                           subscribers = excluded.subscribers"#,
                    params![channel_id, recorded_at, subscribers],
                )?;
                let evicted = tx.execute(
                    r#"DELETE FROM history
                       WHERE channel_id = ?1
                         AND recorded_at NOT IN (
                             SELECT recorded_at FROM history
                             WHERE channel_id = ?1
                             ORDER BY recorded_at DESC
                             LIMIT ?2
                         )"#,
                    params![channel_id, max_records],
                )?;
                tx.commit()?;
                Ok(evicted)
            })
            .await?;

        if evicted > 0 {
            debug!("History: evicted {} old records", evicted);
        }
        Ok(())
    }

    /// Ascending series; with `limit`, only the most recent `limit` records.
    pub async fn read(&self, channel_id: &str, limit: Option<usize>) -> Result<Vec<HistoryRecord>> {
        let owner = channel_id.to_string();
        let limit = limit.map(|n| n as i64).unwrap_or(-1);

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT recorded_at, subscribers FROM history
                       WHERE channel_id = ?1
                       ORDER BY recorded_at DESC
                       LIMIT ?2"#,
                )?;
                let rows = stmt
                    .query_map(params![owner, limit], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let mut records: Vec<HistoryRecord> = rows
            .into_iter()
            .filter_map(|(ts, subscribers)| match parse_timestamp(&ts) {
                Some(recorded_at) => Some(HistoryRecord::new(recorded_at, subscribers)),
                None => {
                    warn!("History for {}: skipping unparseable timestamp {:?}", channel_id, ts);
                    None
                }
            })
            .collect();
        records.sort_by_key(|r| r.recorded_at);
        Ok(records)
    }

    pub async fn delete(&self, channel_id: &str) -> Result<usize> {
        let channel_id = channel_id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute("DELETE FROM history WHERE channel_id = ?1", params![channel_id])?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted)
    }
}
