mod discovery;
mod leaderboard;

pub use discovery::Collector;
pub use leaderboard::LeaderboardCollector;
