mod classify;
mod inactivity;
mod updater;

pub use classify::classify_channels;
pub use inactivity::InactivityDetector;
pub use updater::{Monitor, UpdateOptions};

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use crate::error::{AppError, Result};
    use crate::services::{QuotaTracker, StatsProvider};

    /// Scripted provider: counts per channel id, optional per-id failures.
    #[derive(Default)]
    pub struct FakeProvider {
        pub counts: HashMap<String, i64>,
        pub handles: HashMap<String, String>,
        pub durations: HashMap<String, Vec<u64>>,
        pub transient_failures: RefCell<HashMap<String, u32>>,
        pub quota_exhausted_on: Option<String>,
        pub calls: RefCell<Vec<String>>,
    }

    impl FakeProvider {
        pub fn with_counts(counts: &[(&str, i64)]) -> Self {
            Self {
                counts: counts.iter().map(|(id, n)| (id.to_string(), *n)).collect(),
                ..Self::default()
            }
        }

        pub fn fail_times(&self, channel_id: &str, times: u32) {
            self.transient_failures
                .borrow_mut()
                .insert(channel_id.to_string(), times);
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl StatsProvider for FakeProvider {
        async fn subscriber_count(&self, channel_id: &str, quota: &QuotaTracker) -> Result<i64> {
            quota.charge(1)?;
            self.calls.borrow_mut().push(channel_id.to_string());

            if self.quota_exhausted_on.as_deref() == Some(channel_id) {
                quota.mark_exhausted();
                return Err(AppError::QuotaExhausted);
            }
            if let Some(left) = self.transient_failures.borrow_mut().get_mut(channel_id) {
                if *left > 0 {
                    *left -= 1;
                    return Err(AppError::Transient("HTTP 503".into()));
                }
            }
            self.counts
                .get(channel_id)
                .copied()
                .ok_or_else(|| AppError::NotFound(channel_id.to_string()))
        }

        async fn resolve_channel_id(&self, url: &str, quota: &QuotaTracker) -> Result<String> {
            quota.charge(1)?;
            self.handles
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::NotFound(url.to_string()))
        }

        async fn recent_video_durations(&self, channel_id: &str, quota: &QuotaTracker) -> Result<Vec<u64>> {
            quota.charge(2)?;
            self.durations
                .get(channel_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(channel_id.to_string()))
        }
    }
}
