use chrono::TimeDelta;

use crate::db::HistoryStore;
use crate::models::{GrowthResult, HistoryRecord};

/// Minimum covered days for a fallback result to count as reliable.
pub fn reliability_floor(window_days: i64) -> i64 {
    if window_days >= 30 {
        7
    } else {
        window_days.min(3)
    }
}

/// Growth over the last `window_days` of `records`.
///
/// The anchor is the latest record at or before `end - window_days`. When the
/// series does not reach back that far the earliest record is used instead and
/// `data_days` reports the span actually covered. A window reaching past the
/// representable calendar behaves like one longer than the series.
pub fn compute_growth(records: &[HistoryRecord], window_days: i64) -> GrowthResult {
    if records.len() < 2 || window_days < 1 {
        return GrowthResult::zero();
    }

    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.recorded_at);

    let end = sorted[sorted.len() - 1];
    let target = TimeDelta::try_days(window_days)
        .and_then(|window| end.recorded_at.checked_sub_signed(window));
    let anchor = target.and_then(|target| sorted.iter().rev().find(|r| r.recorded_at <= target));

    match anchor {
        Some(anchor) => GrowthResult::between(anchor.subscribers, end.subscribers, window_days, true),
        None => {
            let anchor = sorted[0];
            let data_days = (end.recorded_at - anchor.recorded_at).num_days();
            let reliable = data_days >= reliability_floor(window_days);
            GrowthResult::between(anchor.subscribers, end.subscribers, data_days, reliable)
        }
    }
}

/// Reads history and computes growth; store failures degrade to a zero result.
pub struct GrowthCalculator {
    history: HistoryStore,
}

impl GrowthCalculator {
    pub fn new(history: HistoryStore) -> Self {
        Self { history }
    }

    pub async fn compute(&self, channel_id: &str, window_days: i64) -> GrowthResult {
        match self.history.read(channel_id, None).await {
            Ok(records) => compute_growth(&records, window_days),
            Err(e) => {
                tracing::warn!("Failed to read history for {}: {}", channel_id, e);
                GrowthResult::zero()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Repository;
    use chrono::{NaiveDate, NaiveDateTime};

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn series(points: &[(u32, i64)]) -> Vec<HistoryRecord> {
        points
            .iter()
            .map(|&(d, subs)| HistoryRecord::new(day(d), subs))
            .collect()
    }

    #[test]
    fn fewer_than_two_records_is_zero() {
        assert_eq!(compute_growth(&[], 7), GrowthResult::zero());
        let single = compute_growth(&series(&[(1, 1000)]), 7);
        assert_eq!(single.amount, 0);
        assert_eq!(single.data_days, 0);
    }

    #[test]
    fn anchors_on_latest_record_before_window_start() {
        let result = compute_growth(&series(&[(1, 1000), (4, 1100), (8, 1300)]), 7);
        assert_eq!(result.amount, 300);
        assert!((result.rate - 30.0).abs() < 1e-9);
        assert_eq!(result.start_subs, 1000);
        assert_eq!(result.end_subs, 1300);
        assert_eq!(result.data_days, 7);
        assert!(result.reliable);
    }

    #[test]
    fn short_history_falls_back_to_earliest_record() {
        let result = compute_growth(&series(&[(4, 1100), (8, 1300)]), 7);
        assert_eq!(result.amount, 200);
        assert_eq!(result.data_days, 4);
        assert!(result.reliable);

        let thin = compute_growth(&series(&[(7, 1000), (8, 1010)]), 7);
        assert_eq!(thin.amount, 10);
        assert_eq!(thin.data_days, 1);
        assert!(!thin.reliable);
    }

    #[test]
    fn monthly_window_needs_a_week_of_data() {
        let result = compute_growth(&series(&[(1, 1000), (6, 1500)]), 30);
        assert_eq!(result.data_days, 5);
        assert!(!result.reliable);

        let result = compute_growth(&series(&[(1, 1000), (9, 1500)]), 30);
        assert_eq!(result.data_days, 8);
        assert!(result.reliable);
    }

    #[test]
    fn end_equals_start_plus_amount() {
        let records = series(&[(3, 500), (1, 0), (9, 800), (5, 650)]);
        for window in [1, 2, 5, 7, 30] {
            let r = compute_growth(&records, window);
            assert_eq!(r.end_subs, r.start_subs + r.amount);
            assert_eq!(r.end_subs, 800);
        }
    }

    #[test]
    fn oversized_window_uses_all_history() {
        let records = series(&[(1, 1000), (8, 1300)]);
        for window in [1_000_000_000, i64::MAX] {
            let result = compute_growth(&records, window);
            assert_eq!(result.amount, 300);
            assert_eq!(result.start_subs, 1000);
            assert_eq!(result.data_days, 7);
            assert!(result.reliable);
        }
    }

    #[test]
    fn non_positive_window_is_zero() {
        let records = series(&[(1, 1000), (8, 1300)]);
        assert_eq!(compute_growth(&records, 0), GrowthResult::zero());
        assert_eq!(compute_growth(&records, -5), GrowthResult::zero());
    }

    #[test]
    fn zero_start_gives_zero_rate() {
        let result = compute_growth(&series(&[(1, 0), (9, 800)]), 7);
        assert_eq!(result.amount, 800);
        assert_eq!(result.rate, 0.0);
    }

    #[test]
    fn floor_is_capped_by_short_windows() {
        assert_eq!(reliability_floor(1), 1);
        assert_eq!(reliability_floor(7), 3);
        assert_eq!(reliability_floor(29), 3);
        assert_eq!(reliability_floor(30), 7);
    }

    #[tokio::test]
    async fn calculator_reads_from_history_store() {
        let repo = Repository::in_memory().await.unwrap();
        let history = repo.history(90);
        for (d, subs) in [(1, 1000), (4, 1100), (8, 1300)] {
            history.append("UC1", day(d), subs).await.unwrap();
        }

        let calculator = GrowthCalculator::new(history);
        let result = calculator.compute("UC1", 7).await;
        assert_eq!(result.amount, 300);

        let missing = calculator.compute("UCmissing", 7).await;
        assert_eq!(missing, GrowthResult::zero());
    }
}
