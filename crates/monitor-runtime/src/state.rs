//! Snapshot types published to the UI on every tick.
//!
//! Snapshots are plain cloneable values. The driver builds a fresh
//! [`MultiPlatformState`] each tick and swaps it into a watch channel, so a
//! reader sees either the previous snapshot or the next one, never a torn
//! mix.

use chrono::{DateTime, Utc};

use monitor_core::alerts::Alert;
use monitor_core::burn::BurnRate;
use monitor_core::models::{Provider, SessionBlock, UsageStats};
use monitor_core::p90::P90Estimate;
use monitor_core::plans::PlanLimits;

/// Everything the UI needs about one provider, for one tick.
#[derive(Debug, Clone)]
pub struct MonitorState {
    pub provider: Provider,
    /// Limits in force this tick (custom plans carry the P90-derived limit).
    pub plan_limits: PlanLimits,
    /// Stats for the active session block; zeroed when idle.
    pub session_stats: UsageStats,
    /// Stats over the whole analysis window.
    pub window_stats: UsageStats,
    /// Stats for the current "day", rolling at the configured reset hour.
    pub today_stats: UsageStats,
    /// The active session block, when one is open.
    pub active_block: Option<SessionBlock>,
    /// Burn rates over the recent record tail.
    pub burn_rate: BurnRate,
    /// P90 estimate backing the custom plan's token limit, when computed.
    pub p90: Option<P90Estimate>,
    /// Alerts raised this tick, in evaluation order.
    pub active_alerts: Vec<Alert>,
    /// Whether the session should be reset, and why.
    pub should_reset: bool,
    pub reset_reason: String,
    /// Composite session health in `[0, 100]`.
    pub health_score: u8,
    /// False while the source is failing; stats are then last-known-good.
    pub source_healthy: bool,
    /// Lines dropped by the parser during the last pull.
    pub skipped_lines_last_tick: usize,
}

impl MonitorState {
    /// A zeroed state for a provider with no data yet.
    pub fn idle(provider: Provider, plan_limits: PlanLimits) -> Self {
        Self {
            provider,
            plan_limits,
            session_stats: UsageStats::default(),
            window_stats: UsageStats::default(),
            today_stats: UsageStats::default(),
            active_block: None,
            burn_rate: BurnRate::idle(),
            p90: None,
            active_alerts: Vec::new(),
            should_reset: false,
            reset_reason: String::new(),
            health_score: 100,
            source_healthy: true,
            skipped_lines_last_tick: 0,
        }
    }
}

/// The published per-tick snapshot across both providers.
#[derive(Debug, Clone)]
pub struct MultiPlatformState {
    pub codex: Option<MonitorState>,
    pub claude: Option<MonitorState>,
    pub last_update: DateTime<Utc>,
}

impl MultiPlatformState {
    /// A snapshot with neither provider populated.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            codex: None,
            claude: None,
            last_update: now,
        }
    }

    /// Store `state` in its provider's slot.
    pub fn set(&mut self, state: MonitorState) {
        match state.provider {
            Provider::Codex => self.codex = Some(state),
            Provider::Claude => self.claude = Some(state),
        }
    }

    /// The state for `provider`, if that slot is populated.
    pub fn get(&self, provider: Provider) -> Option<&MonitorState> {
        match provider {
            Provider::Codex => self.codex.as_ref(),
            Provider::Claude => self.claude.as_ref(),
        }
    }

    /// Both populated slots, Codex first.
    pub fn states(&self) -> impl Iterator<Item = &MonitorState> {
        self.codex.iter().chain(self.claude.iter())
    }

    /// Window cost summed across the populated slots.
    pub fn total_cost(&self) -> f64 {
        self.states().map(|s| s.window_stats.cost_usd).sum()
    }

    /// Window tokens summed across the populated slots.
    pub fn total_tokens(&self) -> u64 {
        self.states().map(|s| s.window_stats.total_tokens()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use monitor_core::models::TokenUsage;
    use monitor_core::plans::PlanType;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn state_with_usage(provider: Provider, tokens: u64, cost: f64) -> MonitorState {
        let mut state = MonitorState::idle(provider, PlanLimits::for_plan(PlanType::Custom));
        state.window_stats = UsageStats {
            tokens: TokenUsage {
                input: tokens,
                output: 0,
                cache_creation: 0,
                cache_read: 0,
            },
            cost_usd: cost,
            cache_savings: 0.0,
            call_count: 1,
        };
        state
    }

    #[test]
    fn test_empty_snapshot_has_no_slots() {
        let snap = MultiPlatformState::empty(now());
        assert!(snap.codex.is_none());
        assert!(snap.claude.is_none());
        assert_eq!(snap.total_tokens(), 0);
        assert_eq!(snap.total_cost(), 0.0);
    }

    #[test]
    fn test_set_routes_by_provider() {
        let mut snap = MultiPlatformState::empty(now());
        snap.set(state_with_usage(Provider::Claude, 100, 1.0));
        assert!(snap.get(Provider::Claude).is_some());
        assert!(snap.get(Provider::Codex).is_none());
    }

    #[test]
    fn test_totals_sum_across_present_slots() {
        let mut snap = MultiPlatformState::empty(now());
        snap.set(state_with_usage(Provider::Claude, 1_000, 3.0));
        snap.set(state_with_usage(Provider::Codex, 500, 2.0));
        assert_eq!(snap.total_tokens(), 1_500);
        assert!((snap.total_cost() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_idle_state_defaults() {
        let state = MonitorState::idle(Provider::Codex, PlanLimits::for_plan(PlanType::Payg));
        assert_eq!(state.health_score, 100);
        assert!(state.source_healthy);
        assert!(state.active_alerts.is_empty());
        assert!(state.burn_rate.estimated_time_to_limit.is_infinite());
    }
}
