use std::path::Path;

use tracing::{info, warn};

use crate::db::{HistoryStore, Repository};
use crate::error::{AppError, Result};
use crate::models::{parse_timestamp, NewChannel};
use crate::services::{ChannelRef, Table};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Integer cell; accepts float renderings such as `1234.0`.
fn parse_count(value: &str) -> Option<i64> {
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Read a legacy file, replacing invalid UTF-8 rather than refusing it.
fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(
                "{} is not valid UTF-8 (at byte {}), undecodable characters replaced",
                path.display(),
                e.utf8_error().valid_up_to()
            );
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Load a `channels.csv` snapshot table, upserting each row by URL.
pub async fn import_channels(repo: &Repository, path: &Path) -> Result<ImportSummary> {
    let text = read_text(path)?;
    let table = Table::parse(&text);

    let url_col = table
        .column("url")
        .ok_or_else(|| AppError::Import(format!("{}: missing url column", path.display())))?;
    let name_col = table
        .column("name")
        .ok_or_else(|| AppError::Import(format!("{}: missing name column", path.display())))?;
    let id_col = table.column("id");
    let current_col = table.column("current_subs");
    let last_col = table.column("last_subs");
    let growth_col = table.column("growth");
    let rate_col = table.column("growth_rate");
    let updated_col = table.column("update_time");
    let short_col = table.column("short_video");

    let mut summary = ImportSummary::default();
    for (line, row) in table.rows.iter().enumerate() {
        let Some(url) = table.cell(row, Some(url_col)) else {
            warn!("{} row {}: no url, skipping", path.display(), line + 2);
            summary.skipped += 1;
            continue;
        };

        let channel_id = table
            .cell(row, id_col)
            .filter(|id| *id != "nan")
            .map(str::to_string)
            .or_else(|| match ChannelRef::parse(url) {
                Some(ChannelRef::Id(id)) => Some(id),
                _ => None,
            });
        let count = |col: Option<usize>| table.cell(row, col).and_then(parse_count).unwrap_or(0);

        let channel = NewChannel {
            channel_id,
            name: table.cell(row, Some(name_col)).unwrap_or(url).to_string(),
            url: url.to_string(),
            current_subs: count(current_col),
            last_subs: count(last_col),
            growth: count(growth_col),
            growth_rate: table
                .cell(row, rate_col)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(0.0),
            short_video: table.cell(row, short_col).map(parse_flag).unwrap_or(false),
            updated_at: table
                .cell(row, updated_col)
                .and_then(parse_timestamp)
                .map(|ts| ts.and_utc()),
        };

        match repo.upsert_channel(channel).await {
            Ok(_) => summary.imported += 1,
            Err(e) => {
                warn!("{} row {}: {}", path.display(), line + 2, e);
                summary.skipped += 1;
            }
        }
    }

    info!(
        "Imported {} channels from {} ({} skipped)",
        summary.imported,
        path.display(),
        summary.skipped
    );
    Ok(summary)
}

/// Load every `<channel_id>.csv` (`date,subscribers`) in `dir` into the history store.
pub async fn import_history(history: &HistoryStore, dir: &Path) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();

    for path in paths {
        let Some(channel_id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let text = match read_text(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                continue;
            }
        };

        let table = Table::parse(&text);
        let (Some(date_col), Some(subs_col)) = (table.column("date"), table.column("subscribers")) else {
            warn!("{}: not a history file, skipping", path.display());
            continue;
        };

        for row in &table.rows {
            let record = table
                .cell(row, Some(date_col))
                .and_then(parse_timestamp)
                .zip(table.cell(row, Some(subs_col)).and_then(parse_count));
            match record {
                Some((recorded_at, subscribers)) => {
                    history.append(channel_id, recorded_at, subscribers).await?;
                    summary.imported += 1;
                }
                None => {
                    warn!("{}: malformed row {:?}, skipping", path.display(), row);
                    summary.skipped += 1;
                }
            }
        }
    }

    info!(
        "Imported {} history records from {} ({} skipped)",
        summary.imported,
        dir.display(),
        summary.skipped
    );
    Ok(summary)
}
