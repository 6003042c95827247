/// Growth of one channel over a lookback window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthResult {
    pub amount: i64,
    pub rate: f64,
    pub start_subs: i64,
    pub end_subs: i64,
    /// Days of history actually covered; below the window when history is short.
    pub data_days: i64,
    pub reliable: bool,
}

impl GrowthResult {
    pub fn zero() -> Self {
        Self {
            amount: 0,
            rate: 0.0,
            start_subs: 0,
            end_subs: 0,
            data_days: 0,
            reliable: false,
        }
    }

    pub fn between(start_subs: i64, end_subs: i64, data_days: i64, reliable: bool) -> Self {
        let amount = end_subs - start_subs;
        let rate = if start_subs > 0 {
            amount as f64 / start_subs as f64 * 100.0
        } else {
            0.0
        };
        Self {
            amount,
            rate,
            start_subs,
            end_subs,
            data_days,
            reliable,
        }
    }
}
