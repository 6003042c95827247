use std::cell::Cell;

use crate::error::{AppError, Result};

/// API budget for one run, passed by reference into every provider call.
#[derive(Debug)]
pub struct QuotaTracker {
    limit: u32,
    safe_limit: u32,
    used: Cell<u32>,
    exhausted: Cell<bool>,
}

impl QuotaTracker {
    pub fn new(limit: u32, safe_limit: u32) -> Self {
        Self {
            limit,
            safe_limit: safe_limit.min(limit),
            used: Cell::new(0),
            exhausted: Cell::new(false),
        }
    }

    pub fn used(&self) -> u32 {
        self.used.get()
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used.get())
    }

    pub fn can_continue(&self) -> bool {
        !self.exhausted.get() && self.used.get() < self.safe_limit
    }

    /// Reserve `cost` units, refusing once the safe limit has been reached.
    pub fn charge(&self, cost: u32) -> Result<()> {
        if !self.can_continue() {
            return Err(AppError::QuotaExhausted);
        }
        let used = self.used.get().saturating_add(cost);
        self.used.set(used);
        tracing::debug!("Quota used: {}/{}", used, self.limit);
        if used >= self.safe_limit {
            tracing::warn!(
                "API quota near limit ({}/{}), stopping further requests",
                used,
                self.limit
            );
        }
        Ok(())
    }

    /// The provider reported the daily quota as spent.
    pub fn mark_exhausted(&self) {
        self.exhausted.set(true);
    }
}
