use chrono::NaiveDate;

/// Outcome of one keyword search during channel collection.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordScore {
    pub date: NaiveDate,
    pub keyword: String,
    pub total_videos: usize,
    pub long_videos: usize,
    pub total_channels: usize,
    pub potential_channels: usize,
}

impl KeywordScore {
    pub fn hot_rate(&self) -> f64 {
        self.potential_channels as f64 / self.total_channels.max(1) as f64
    }
}
