use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::burn::BurnRate;
use crate::formatting::format_currency;
use crate::models::UsageStats;
use crate::plans::PlanLimits;

// ── Levels and metrics ────────────────────────────────────────────────────────

/// Alert severity ladder, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
    Danger,
}

impl AlertLevel {
    /// Usage-percent threshold at which this level activates.
    pub fn threshold(&self) -> f64 {
        match self {
            AlertLevel::Info => 50.0,
            AlertLevel::Warning => 75.0,
            AlertLevel::Critical => 90.0,
            AlertLevel::Danger => 95.0,
        }
    }

    /// The highest level whose threshold is at or below `pct`.
    ///
    /// Exact threshold values promote: 75.000 % is WARNING, 95.000 % DANGER.
    pub fn from_pct(pct: f64) -> Option<Self> {
        if pct >= 95.0 {
            Some(AlertLevel::Danger)
        } else if pct >= 90.0 {
            Some(AlertLevel::Critical)
        } else if pct >= 75.0 {
            Some(AlertLevel::Warning)
        } else if pct >= 50.0 {
            Some(AlertLevel::Info)
        } else {
            None
        }
    }

    /// Uppercase display label.
    pub fn label(&self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Critical => "CRITICAL",
            AlertLevel::Danger => "DANGER",
        }
    }
}

/// Which measurement an alert refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMetric {
    Tokens,
    Cost,
    BurnTokens,
    BurnCost,
}

/// One emitted alert with enough context to render and act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub metric: AlertMetric,
    /// Observed value of the metric (tokens, dollars, or per-minute rate).
    pub current_value: f64,
    /// The limit or rate threshold the value is measured against.
    pub threshold_value: f64,
    /// Capped percentage severity in `[0, 100]`.
    pub severity: u8,
    pub message: String,
    pub recommended_action: String,
    pub timestamp: DateTime<Utc>,
}

// ── Burn-rate thresholds ──────────────────────────────────────────────────────

/// Tokens-per-minute rate that triggers a BURN_TOKENS warning.
pub const BURN_TOKENS_WARNING: f64 = 10_000.0;
/// Tokens-per-minute rate that escalates BURN_TOKENS to critical.
pub const BURN_TOKENS_CRITICAL: f64 = 25_000.0;
/// Cost-per-minute rate (USD) that triggers a BURN_COST warning.
pub const BURN_COST_WARNING: f64 = 1.00;
/// Cost-per-minute rate (USD) that escalates BURN_COST to critical.
pub const BURN_COST_CRITICAL: f64 = 2.50;

/// Minutes-to-limit under which a >=90 % session should be reset.
const RESET_HORIZON_MINUTES: f64 = 30.0;

// ── Engine ────────────────────────────────────────────────────────────────────

/// Stateless evaluation of usage and burn rates against plan limits.
pub struct AlertEngine;

impl AlertEngine {
    /// Evaluate the ladder for both usage metrics plus the burn-rate gates.
    ///
    /// Pure: same inputs, same alerts (timestamps aside).
    pub fn evaluate(
        stats: &UsageStats,
        burn: &BurnRate,
        limits: &PlanLimits,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if let Some(limit) = limits.token_limit {
            if let Some(alert) = Self::usage_alert(
                AlertMetric::Tokens,
                stats.total_tokens() as f64,
                limit as f64,
                burn,
                now,
            ) {
                alerts.push(alert);
            }
        }
        if let Some(limit) = limits.cost_limit {
            if let Some(alert) =
                Self::usage_alert(AlertMetric::Cost, stats.cost_usd, limit, burn, now)
            {
                alerts.push(alert);
            }
        }

        alerts.extend(Self::burn_alerts(burn, now));
        alerts
    }

    /// Alert for one usage metric, when its percentage reaches the ladder.
    fn usage_alert(
        metric: AlertMetric,
        current: f64,
        limit: f64,
        burn: &BurnRate,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        if limit <= 0.0 {
            return None;
        }
        let pct = 100.0 * current / limit;
        let level = AlertLevel::from_pct(pct)?;

        let mut message = match metric {
            AlertMetric::Tokens => format!(
                "Token usage at {:.1}% of limit ({} / {})",
                pct,
                crate::formatting::format_number(current, 0),
                crate::formatting::format_number(limit, 0),
            ),
            _ => format!(
                "Cost at {:.1}% of budget ({} / {})",
                pct,
                format_currency(current),
                format_currency(limit),
            ),
        };
        if let Some(minutes) = burn.time_to_limit() {
            message.push_str(&format!(
                ", ~{} to limit",
                crate::formatting::format_time(minutes)
            ));
        }

        Some(Alert {
            level,
            metric,
            current_value: current,
            threshold_value: limit,
            severity: severity_from_pct(pct),
            message,
            recommended_action: recommended_action(level, metric).to_string(),
            timestamp: now,
        })
    }

    /// Burn-rate gates: velocity alerts independent of consumed budget.
    fn burn_alerts(burn: &BurnRate, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if burn.tokens_per_minute > BURN_TOKENS_WARNING {
            let level = if burn.tokens_per_minute > BURN_TOKENS_CRITICAL {
                AlertLevel::Critical
            } else {
                AlertLevel::Warning
            };
            alerts.push(Alert {
                level,
                metric: AlertMetric::BurnTokens,
                current_value: burn.tokens_per_minute,
                threshold_value: BURN_TOKENS_WARNING,
                severity: severity_from_pct(100.0 * burn.tokens_per_minute / BURN_TOKENS_WARNING),
                message: format!(
                    "Burning {} tokens/min (threshold {})",
                    crate::formatting::format_number(burn.tokens_per_minute, 0),
                    crate::formatting::format_number(BURN_TOKENS_WARNING, 0),
                ),
                recommended_action: recommended_action(level, AlertMetric::BurnTokens).to_string(),
                timestamp: now,
            });
        }

        if burn.cost_per_minute > BURN_COST_WARNING {
            let level = if burn.cost_per_minute > BURN_COST_CRITICAL {
                AlertLevel::Critical
            } else {
                AlertLevel::Warning
            };
            alerts.push(Alert {
                level,
                metric: AlertMetric::BurnCost,
                current_value: burn.cost_per_minute,
                threshold_value: BURN_COST_WARNING,
                severity: severity_from_pct(100.0 * burn.cost_per_minute / BURN_COST_WARNING),
                message: format!(
                    "Spending {}/min (threshold {}/min)",
                    format_currency(burn.cost_per_minute),
                    format_currency(BURN_COST_WARNING),
                ),
                recommended_action: recommended_action(level, AlertMetric::BurnCost).to_string(),
                timestamp: now,
            });
        }

        alerts
    }

    /// Whether the current session should be reset, and why.
    ///
    /// True when any active alert is at DANGER (even if the burn rate is
    /// idle and the time-to-limit is infinite), or when a usage metric is at
    /// or above 90 % with less than 30 minutes to the limit.
    pub fn should_reset_session(
        stats: &UsageStats,
        limits: &PlanLimits,
        burn: &BurnRate,
        alerts: &[Alert],
    ) -> (bool, String) {
        if let Some(alert) = alerts.iter().find(|a| a.level == AlertLevel::Danger) {
            return (
                true,
                format!("{} at danger level: {}", alert.level.label(), alert.message),
            );
        }

        let pct = max_usage_pct(stats, limits);
        if pct >= 90.0 {
            if let Some(minutes) = burn.time_to_limit() {
                if minutes < RESET_HORIZON_MINUTES {
                    return (
                        true,
                        format!(
                            "usage at {:.0}% with ~{:.0}m to limit",
                            pct, minutes
                        ),
                    );
                }
            }
        }

        (false, "session within budget".to_string())
    }

    /// Composite health score in `[0, 100]`.
    ///
    /// Starts at `100 - max usage percent`, then loses 10 per CRITICAL and
    /// 25 per DANGER alert, clamped to the valid range.
    pub fn session_health_score(
        stats: &UsageStats,
        limits: &PlanLimits,
        alerts: &[Alert],
    ) -> u8 {
        let mut score = 100.0 - max_usage_pct(stats, limits);
        for alert in alerts {
            score -= match alert.level {
                AlertLevel::Critical => 10.0,
                AlertLevel::Danger => 25.0,
                _ => 0.0,
            };
        }
        score.clamp(0.0, 100.0).round() as u8
    }
}

/// Percent severity capped at 100 so downstream validators never overflow.
fn severity_from_pct(pct: f64) -> u8 {
    pct.round().min(100.0).max(0.0) as u8
}

/// The larger of the token and cost usage percentages (0 when unlimited).
fn max_usage_pct(stats: &UsageStats, limits: &PlanLimits) -> f64 {
    let token_pct = limits
        .token_limit
        .filter(|&l| l > 0)
        .map(|l| 100.0 * stats.total_tokens() as f64 / l as f64)
        .unwrap_or(0.0);
    let cost_pct = limits
        .cost_limit
        .filter(|&l| l > 0.0)
        .map(|l| 100.0 * stats.cost_usd / l)
        .unwrap_or(0.0);
    token_pct.max(cost_pct)
}

/// Recommended operator action for each `(level, metric)` pair.
fn recommended_action(level: AlertLevel, metric: AlertMetric) -> &'static str {
    match (level, metric) {
        (AlertLevel::Info, AlertMetric::Tokens) => {
            "Halfway through the token budget. No action needed yet."
        }
        (AlertLevel::Warning, AlertMetric::Tokens) => {
            "Consider batching requests and trimming prompt context."
        }
        (AlertLevel::Critical, AlertMetric::Tokens) => {
            "Plan to reset session soon. Review usage patterns and optimize prompts to reduce consumption."
        }
        (AlertLevel::Danger, AlertMetric::Tokens) => {
            "IMMEDIATE ACTION REQUIRED. Reset the session now or requests will start failing."
        }
        (AlertLevel::Info, AlertMetric::Cost) => {
            "Halfway through the cost budget. No action needed yet."
        }
        (AlertLevel::Warning, AlertMetric::Cost) => {
            "Review spend against budget; prefer cheaper models for routine work."
        }
        (AlertLevel::Critical, AlertMetric::Cost) => {
            "Budget nearly exhausted. Switch remaining work to a cheaper model."
        }
        (AlertLevel::Danger, AlertMetric::Cost) => {
            "IMMEDIATE ACTION REQUIRED. Stop current session to avoid exceeding budget."
        }
        (AlertLevel::Critical, AlertMetric::BurnTokens) => {
            "Extreme token velocity. Pause automated loops before the window is consumed."
        }
        (_, AlertMetric::BurnTokens) => {
            "High token velocity. Check for runaway loops or oversized context."
        }
        (AlertLevel::Critical, AlertMetric::BurnCost) => {
            "Extreme spend velocity. Pause expensive model calls immediately."
        }
        (_, AlertMetric::BurnCost) => {
            "Spend velocity is elevated. Verify the model mix before continuing."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenUsage;
    use crate::plans::WARNING_THRESHOLDS;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn stats(tokens: u64, cost: f64) -> UsageStats {
        UsageStats {
            tokens: TokenUsage {
                input: tokens,
                output: 0,
                cache_creation: 0,
                cache_read: 0,
            },
            cost_usd: cost,
            cache_savings: 0.0,
            call_count: 1,
        }
    }

    fn limits(tokens: Option<u64>, cost: Option<f64>) -> PlanLimits {
        PlanLimits {
            name: "test".to_string(),
            token_limit: tokens,
            cost_limit: cost,
            warning_thresholds: WARNING_THRESHOLDS,
        }
    }

    fn burn(tpm: f64, cpm: f64, ttl: f64) -> BurnRate {
        BurnRate {
            tokens_per_minute: tpm,
            cost_per_minute: cpm,
            estimated_time_to_limit: ttl,
            confidence: 0.5,
        }
    }

    fn find(alerts: &[Alert], metric: AlertMetric) -> Option<&Alert> {
        alerts.iter().find(|a| a.metric == metric)
    }

    // ── Ladder selection ──────────────────────────────────────────────────

    #[test]
    fn test_level_from_pct_boundaries_promote() {
        assert_eq!(AlertLevel::from_pct(49.999), None);
        assert_eq!(AlertLevel::from_pct(50.0), Some(AlertLevel::Info));
        assert_eq!(AlertLevel::from_pct(75.0), Some(AlertLevel::Warning));
        assert_eq!(AlertLevel::from_pct(90.0), Some(AlertLevel::Critical));
        assert_eq!(AlertLevel::from_pct(95.0), Some(AlertLevel::Danger));
        assert_eq!(AlertLevel::from_pct(140.0), Some(AlertLevel::Danger));
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(AlertLevel::Info < AlertLevel::Warning);
        assert!(AlertLevel::Warning < AlertLevel::Critical);
        assert!(AlertLevel::Critical < AlertLevel::Danger);
    }

    #[test]
    fn test_below_half_emits_nothing() {
        let alerts = AlertEngine::evaluate(
            &stats(400_000, 40.0),
            &BurnRate::idle(),
            &limits(Some(1_000_000), Some(100.0)),
            now(),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_unlimited_metric_emits_nothing() {
        let alerts = AlertEngine::evaluate(
            &stats(999_999_999, 0.0),
            &BurnRate::idle(),
            &limits(None, None),
            now(),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_ninety_two_percent_both_metrics_critical() {
        // 920k/1M tokens and $92/$100 with a modest burn rate:
        // CRITICAL on both usage metrics, no burn alerts.
        let alerts = AlertEngine::evaluate(
            &stats(920_000, 92.0),
            &burn(2_500.0, 0.25, 32.0),
            &limits(Some(1_000_000), Some(100.0)),
            now(),
        );
        assert_eq!(alerts.len(), 2);
        let tokens = find(&alerts, AlertMetric::Tokens).unwrap();
        assert_eq!(tokens.level, AlertLevel::Critical);
        assert_eq!(tokens.severity, 92);
        let cost = find(&alerts, AlertMetric::Cost).unwrap();
        assert_eq!(cost.level, AlertLevel::Critical);
        assert!(cost.message.contains("92.0%"));
    }

    #[test]
    fn test_over_hundred_percent_caps_severity() {
        let alerts = AlertEngine::evaluate(
            &stats(1_400_000, 0.0),
            &BurnRate::idle(),
            &limits(Some(1_000_000), None),
            now(),
        );
        let alert = find(&alerts, AlertMetric::Tokens).unwrap();
        assert_eq!(alert.level, AlertLevel::Danger);
        assert_eq!(alert.severity, 100);
    }

    #[test]
    fn test_message_includes_finite_time_to_limit() {
        let alerts = AlertEngine::evaluate(
            &stats(920_000, 0.0),
            &burn(2_500.0, 0.0, 32.0),
            &limits(Some(1_000_000), None),
            now(),
        );
        let alert = find(&alerts, AlertMetric::Tokens).unwrap();
        assert!(alert.message.contains("32m"), "message: {}", alert.message);
    }

    #[test]
    fn test_recommended_actions_match_contract() {
        let alerts = AlertEngine::evaluate(
            &stats(920_000, 96.0),
            &BurnRate::idle(),
            &limits(Some(1_000_000), Some(100.0)),
            now(),
        );
        let tokens = find(&alerts, AlertMetric::Tokens).unwrap();
        assert_eq!(
            tokens.recommended_action,
            "Plan to reset session soon. Review usage patterns and optimize prompts to reduce consumption."
        );
        let cost = find(&alerts, AlertMetric::Cost).unwrap();
        assert_eq!(
            cost.recommended_action,
            "IMMEDIATE ACTION REQUIRED. Stop current session to avoid exceeding budget."
        );
    }

    // ── Burn gates ────────────────────────────────────────────────────────

    #[test]
    fn test_burn_tokens_warning_gate() {
        // 15 000 tokens/min: one BURN_TOKENS warning, nothing else.
        let alerts = AlertEngine::evaluate(
            &stats(0, 0.0),
            &burn(15_000.0, 0.0, f64::INFINITY),
            &limits(None, None),
            now(),
        );
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.metric, AlertMetric::BurnTokens);
        assert_eq!(alert.level, AlertLevel::Warning);
    }

    #[test]
    fn test_burn_tokens_critical_gate() {
        let alerts = AlertEngine::evaluate(
            &stats(0, 0.0),
            &burn(26_000.0, 0.0, f64::INFINITY),
            &limits(None, None),
            now(),
        );
        assert_eq!(
            find(&alerts, AlertMetric::BurnTokens).unwrap().level,
            AlertLevel::Critical
        );
    }

    #[test]
    fn test_burn_cost_gates() {
        let warning = AlertEngine::evaluate(
            &stats(0, 0.0),
            &burn(0.0, 1.5, f64::INFINITY),
            &limits(None, None),
            now(),
        );
        assert_eq!(
            find(&warning, AlertMetric::BurnCost).unwrap().level,
            AlertLevel::Warning
        );

        let critical = AlertEngine::evaluate(
            &stats(0, 0.0),
            &burn(0.0, 3.0, f64::INFINITY),
            &limits(None, None),
            now(),
        );
        assert_eq!(
            find(&critical, AlertMetric::BurnCost).unwrap().level,
            AlertLevel::Critical
        );
    }

    #[test]
    fn test_burn_gates_are_exclusive_above_threshold_only() {
        let alerts = AlertEngine::evaluate(
            &stats(0, 0.0),
            &burn(10_000.0, 1.0, f64::INFINITY),
            &limits(None, None),
            now(),
        );
        // Exactly at threshold is not above it.
        assert!(alerts.is_empty());
    }

    // ── should_reset_session ──────────────────────────────────────────────

    #[test]
    fn test_reset_on_danger_even_when_idle() {
        let s = stats(980_000, 0.0);
        let l = limits(Some(1_000_000), None);
        let b = BurnRate::idle();
        let alerts = AlertEngine::evaluate(&s, &b, &l, now());
        let (reset, reason) = AlertEngine::should_reset_session(&s, &l, &b, &alerts);
        assert!(reset);
        assert!(reason.contains("danger"));
    }

    #[test]
    fn test_no_reset_at_92_pct_with_32_minutes() {
        // 92 % usage and 32 minutes to limit: neither condition holds.
        let s = stats(920_000, 92.0);
        let l = limits(Some(1_000_000), Some(100.0));
        let b = burn(2_500.0, 0.25, 32.0);
        let alerts = AlertEngine::evaluate(&s, &b, &l, now());
        let (reset, _) = AlertEngine::should_reset_session(&s, &l, &b, &alerts);
        assert!(!reset);
    }

    #[test]
    fn test_reset_at_92_pct_under_30_minutes() {
        let s = stats(920_000, 0.0);
        let l = limits(Some(1_000_000), None);
        let b = burn(4_000.0, 0.0, 20.0);
        let alerts = AlertEngine::evaluate(&s, &b, &l, now());
        let (reset, reason) = AlertEngine::should_reset_session(&s, &l, &b, &alerts);
        assert!(reset);
        assert!(reason.contains("92%"));
    }

    // ── Health score ──────────────────────────────────────────────────────

    #[test]
    fn test_health_score_clean_session() {
        let s = stats(200_000, 20.0);
        let l = limits(Some(1_000_000), Some(100.0));
        assert_eq!(AlertEngine::session_health_score(&s, &l, &[]), 80);
    }

    #[test]
    fn test_health_score_deducts_per_alert_level() {
        let s = stats(920_000, 92.0);
        let l = limits(Some(1_000_000), Some(100.0));
        let alerts = AlertEngine::evaluate(&s, &BurnRate::idle(), &l, now());
        // 100 - 92 = 8, minus 10 per critical (two of them) -> clamped to 0.
        assert_eq!(AlertEngine::session_health_score(&s, &l, &alerts), 0);
    }

    #[test]
    fn test_health_score_clamped_at_zero() {
        let s = stats(2_000_000, 0.0);
        let l = limits(Some(1_000_000), None);
        let alerts = AlertEngine::evaluate(&s, &BurnRate::idle(), &l, now());
        assert_eq!(AlertEngine::session_health_score(&s, &l, &alerts), 0);
    }

    // ── Monotonicity ──────────────────────────────────────────────────────

    #[test]
    fn test_max_level_nondecreasing_as_usage_grows() {
        let l = limits(Some(1_000_000), None);
        let mut previous: Option<AlertLevel> = None;
        for tokens in [100_000u64, 400_000, 600_000, 800_000, 930_000, 980_000, 1_100_000] {
            let alerts =
                AlertEngine::evaluate(&stats(tokens, 0.0), &BurnRate::idle(), &l, now());
            let level = alerts.iter().map(|a| a.level).max();
            assert!(level >= previous, "level regressed at {tokens} tokens");
            previous = level;
        }
    }
}
