pub const SCHEMA: &str = r#"
-- channels table (live snapshot, one row per tracked channel)
CREATE TABLE IF NOT EXISTS channels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id TEXT UNIQUE,
    name TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    current_subs INTEGER NOT NULL DEFAULT 0,
    last_subs INTEGER NOT NULL DEFAULT 0,
    growth INTEGER NOT NULL DEFAULT 0,
    growth_rate REAL NOT NULL DEFAULT 0,
    short_video INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_channels_channel_id ON channels(channel_id);

-- history table (subscriber count series per channel)
CREATE TABLE IF NOT EXISTS history (
    channel_id TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    subscribers INTEGER NOT NULL,
    PRIMARY KEY (channel_id, recorded_at)
);

CREATE INDEX IF NOT EXISTS idx_history_channel_recorded ON history(channel_id, recorded_at DESC);

-- inactive_channels table (append-only archive of pruned channels)
CREATE TABLE IF NOT EXISTS inactive_channels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id TEXT,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    current_subs INTEGER NOT NULL,
    last_subs INTEGER NOT NULL,
    growth INTEGER NOT NULL,
    growth_rate REAL NOT NULL,
    short_video INTEGER NOT NULL,
    updated_at TEXT,
    archived_at TEXT NOT NULL
);

-- keyword_scores table (one row per keyword per collection run)
CREATE TABLE IF NOT EXISTS keyword_scores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    keyword TEXT NOT NULL,
    total_videos INTEGER NOT NULL,
    long_videos INTEGER NOT NULL,
    total_channels INTEGER NOT NULL,
    potential_channels INTEGER NOT NULL,
    hot_rate REAL NOT NULL
);
"#;
