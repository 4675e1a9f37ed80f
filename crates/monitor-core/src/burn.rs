use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{UsageRecord, UsageStats};
use crate::plans::PlanLimits;

/// Default width of the recent tail the rates are computed over, in minutes.
pub const DEFAULT_WINDOW_MINUTES: u64 = 10;

/// Instantaneous consumption rates derived from the recent record tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnRate {
    /// Tokens consumed per minute.
    pub tokens_per_minute: f64,
    /// US dollars spent per minute.
    pub cost_per_minute: f64,
    /// Minutes until the active plan limit is reached at the current rate;
    /// `f64::INFINITY` when unbounded or idle.
    pub estimated_time_to_limit: f64,
    /// Sample-size confidence in `[0, 1]`: `min(1, n / 20)`.
    pub confidence: f64,
}

impl BurnRate {
    /// The zero rate reported when fewer than two records are in the window.
    pub fn idle() -> Self {
        Self {
            tokens_per_minute: 0.0,
            cost_per_minute: 0.0,
            estimated_time_to_limit: f64::INFINITY,
            confidence: 0.0,
        }
    }

    /// The time-to-limit projection, when finite.
    pub fn time_to_limit(&self) -> Option<f64> {
        if self.estimated_time_to_limit.is_finite() {
            Some(self.estimated_time_to_limit)
        } else {
            None
        }
    }
}

/// Derives [`BurnRate`] figures from the tail of the record stream.
pub struct BurnRateEstimator {
    window_minutes: u64,
}

impl BurnRateEstimator {
    /// Create an estimator with the given tail width.
    pub fn new(window_minutes: u64) -> Self {
        Self { window_minutes }
    }

    /// Create an estimator with the default 10-minute tail.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_WINDOW_MINUTES)
    }

    /// Compute rates from the records falling in `(now - window, now]`.
    ///
    /// `current` and `limits` feed the time-to-limit projection: when both a
    /// token and a cost limit are bounded, the nearer projection wins.
    /// Fewer than two records in the window yields [`BurnRate::idle`].
    pub fn estimate(
        &self,
        records: &[UsageRecord],
        now: DateTime<Utc>,
        current: &UsageStats,
        limits: &PlanLimits,
    ) -> BurnRate {
        let window_start = now - TimeDelta::minutes(self.window_minutes as i64);
        let tail: Vec<&UsageRecord> = records
            .iter()
            .filter(|r| r.timestamp > window_start && r.timestamp <= now)
            .collect();

        if tail.len() < 2 {
            return BurnRate::idle();
        }

        let window = self.window_minutes as f64;
        let tokens: u64 = tail.iter().map(|r| r.tokens.total()).sum();
        let cost: f64 = tail.iter().map(|r| r.cost_usd).sum();

        let tokens_per_minute = tokens as f64 / window;
        let cost_per_minute = cost / window;

        let token_projection = limits.token_limit.and_then(|limit| {
            let used = current.total_tokens();
            if used < limit && tokens_per_minute > 0.0 {
                Some((limit - used) as f64 / tokens_per_minute)
            } else {
                None
            }
        });
        let cost_projection = limits.cost_limit.and_then(|limit| {
            if current.cost_usd < limit && cost_per_minute > 0.0 {
                Some((limit - current.cost_usd) / cost_per_minute)
            } else {
                None
            }
        });

        let estimated_time_to_limit = match (token_projection, cost_projection) {
            (Some(t), Some(c)) => t.min(c),
            (Some(t), None) => t,
            (None, Some(c)) => c,
            (None, None) => f64::INFINITY,
        };

        BurnRate {
            tokens_per_minute,
            cost_per_minute,
            estimated_time_to_limit,
            confidence: (tail.len() as f64 / 20.0).min(1.0),
        }
    }
}
