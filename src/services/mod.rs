mod csv;
mod leaderboard;
mod mailer;
mod quota;
mod retry;
mod youtube;

pub use csv::{write_atomic, Table};
pub use leaderboard::{
    latest_period, LeaderboardClient, LeaderboardEntry, LeaderboardPage, LeaderboardSource,
    DEFAULT_LEADERBOARD_URL,
};
pub use mailer::{Mailer, Notifier, SendmailMailer};
pub use quota::QuotaTracker;
pub use retry::{retry, RetryPolicy};
pub use youtube::{
    ChannelRef, ChannelSummary, DiscoveryProvider, StatsProvider, VideoHit, YouTubeClient,
};

#[cfg(test)]
pub(crate) use mailer::testing;
