use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Subscription plans across both providers.
///
/// `Free`/`Payg`/`Tier1`/`Tier2` are the Codex tiers; `Pro`/`Max5`/`Max20`
/// are the Claude tiers. `Custom` derives its token limit from the P90 of
/// historical session blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Free,
    Payg,
    Tier1,
    Tier2,
    Pro,
    Max5,
    Max20,
    Custom,
}

impl FromStr for PlanType {
    type Err = MonitorError;

    /// Case-insensitive construction from a plan name.
    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "free" => Ok(PlanType::Free),
            "payg" => Ok(PlanType::Payg),
            "tier1" => Ok(PlanType::Tier1),
            "tier2" => Ok(PlanType::Tier2),
            "pro" => Ok(PlanType::Pro),
            "max5" => Ok(PlanType::Max5),
            "max20" => Ok(PlanType::Max20),
            "custom" => Ok(PlanType::Custom),
            other => Err(MonitorError::InvalidPlan(other.to_string())),
        }
    }
}

impl PlanType {
    /// The canonical lowercase string identifier for this plan.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Payg => "payg",
            PlanType::Tier1 => "tier1",
            PlanType::Tier2 => "tier2",
            PlanType::Pro => "pro",
            PlanType::Max5 => "max5",
            PlanType::Max20 => "max20",
            PlanType::Custom => "custom",
        }
    }
}

/// Budget limits governing alert generation for one provider.
///
/// `None` means unlimited: no alert is ever generated for that metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Canonical plan name.
    pub name: String,
    /// Token budget per session window, when bounded.
    pub token_limit: Option<u64>,
    /// Cost budget (USD) per session window, when bounded.
    pub cost_limit: Option<f64>,
    /// Alert ladder thresholds, in ascending percent.
    pub warning_thresholds: [f64; 4],
}

// ── Shared constants ──────────────────────────────────────────────────────────

/// Floor for the P90-derived custom limit; also the Pro session budget.
pub const DEFAULT_TOKEN_LIMIT: u64 = 44_000;

/// Default cost budget for the custom plan (USD per session window).
pub const DEFAULT_COST_LIMIT: f64 = 50.0;

/// Per-block token totals of the known Claude tiers (Pro / Max5 / Max20),
/// used to detect limit-hitting sessions.
pub const KNOWN_TOKEN_LIMITS: &[u64] = &[44_000, 88_000, 220_000];

/// Fraction of a known limit at which a session counts as having hit it.
pub const LIMIT_DETECTION_THRESHOLD: f64 = 0.95;

/// The four-level alert ladder, in ascending percent.
pub const WARNING_THRESHOLDS: [f64; 4] = [50.0, 75.0, 90.0, 95.0];

impl PlanLimits {
    /// Limits for a named plan.
    ///
    /// The custom plan starts with the default floor as its token limit; the
    /// driver replaces it with the P90 output each tick unless an explicit
    /// override is configured.
    pub fn for_plan(plan: PlanType) -> Self {
        let (token_limit, cost_limit) = match plan {
            PlanType::Free => (Some(50_000), None),
            PlanType::Payg => (None, Some(10.0)),
            PlanType::Tier1 => (Some(500_000), Some(50.0)),
            PlanType::Tier2 => (Some(2_000_000), Some(200.0)),
            PlanType::Pro => (Some(44_000), Some(18.0)),
            PlanType::Max5 => (Some(88_000), Some(35.0)),
            PlanType::Max20 => (Some(220_000), Some(140.0)),
            PlanType::Custom => (Some(DEFAULT_TOKEN_LIMIT), Some(DEFAULT_COST_LIMIT)),
        };
        Self {
            name: plan.as_str().to_string(),
            token_limit,
            cost_limit,
            warning_thresholds: WARNING_THRESHOLDS,
        }
    }

    /// Apply explicit CLI overrides on top of the plan defaults.
    pub fn with_overrides(mut self, tokens: Option<u64>, cost: Option<f64>) -> Self {
        if tokens.is_some() {
            self.token_limit = tokens;
        }
        if cost.is_some() {
            self.cost_limit = cost;
        }
        self
    }

    /// Compact human-readable token limit (e.g. `"44k"`, `"unlimited"`).
    pub fn formatted_token_limit(&self) -> String {
        match self.token_limit {
            None => "unlimited".to_string(),
            Some(n) if n >= 1_000 => format!("{}k", n / 1_000),
            Some(n) => n.to_string(),
        }
    }
}
