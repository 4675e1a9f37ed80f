use serde::{Deserialize, Serialize};

use crate::models::SessionBlock;
use crate::plans::{DEFAULT_TOKEN_LIMIT, KNOWN_TOKEN_LIMITS, LIMIT_DETECTION_THRESHOLD};

/// Which path produced a [`P90Estimate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum P90Source {
    /// P90 over sessions that hit a known tier limit.
    KnownLimit,
    /// P90 over all completed sessions (no session hit a known limit).
    Fallback,
    /// No completed sessions; the floor was returned.
    Default,
}

/// Output of the P90 limit estimator: the custom plan's token budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct P90Estimate {
    /// Estimated per-block token limit, never below the floor.
    pub limit: u64,
    /// Sample-size confidence in `[0, 1]`: `min(1, n / 20)`.
    pub confidence: f64,
    /// Which estimation path was taken.
    pub source: P90Source,
}

/// Configuration for the P90 token-limit estimator.
#[derive(Debug, Clone)]
pub struct P90Config {
    /// Known tier limits used to detect limit-hitting sessions.
    pub known_limits: Vec<u64>,
    /// Fraction of a known limit at which a session counts as at-limit.
    pub limit_threshold: f64,
    /// Minimum limit returned even when the observed P90 is lower.
    pub floor: u64,
}

impl Default for P90Config {
    fn default() -> Self {
        Self {
            known_limits: KNOWN_TOKEN_LIMITS.to_vec(),
            limit_threshold: LIMIT_DETECTION_THRESHOLD,
            floor: DEFAULT_TOKEN_LIMIT,
        }
    }
}

/// Estimates a session token limit from historical block totals.
pub struct P90Calculator {
    config: P90Config,
}

impl P90Calculator {
    /// Create a calculator with the supplied configuration.
    pub fn new(config: P90Config) -> Self {
        Self { config }
    }

    /// Create a calculator with the production defaults.
    pub fn with_defaults() -> Self {
        Self::new(P90Config::default())
    }

    /// Estimate the limit from the blocks currently in the analysis window.
    ///
    /// 1. Consider only completed blocks: neither gaps nor the active one.
    /// 2. Prefer blocks whose total is >= threshold x some known limit.
    /// 3. Fall back to all completed blocks when none hit a limit.
    /// 4. Take the 90th percentile and apply the floor.
    ///
    /// The percentile is the sorted value at index `ceil(0.9 * n) - 1`
    /// (no interpolation), so independent implementations agree exactly.
    pub fn estimate(&self, blocks: &[SessionBlock]) -> P90Estimate {
        let completed: Vec<u64> = blocks
            .iter()
            .filter(|b| !b.is_gap && !b.is_active)
            .map(|b| b.total_tokens())
            .collect();

        if completed.is_empty() {
            return P90Estimate {
                limit: self.config.floor,
                confidence: 0.0,
                source: P90Source::Default,
            };
        }

        let limit_hitting: Vec<u64> = completed
            .iter()
            .copied()
            .filter(|&tokens| {
                self.config
                    .known_limits
                    .iter()
                    .any(|&limit| tokens as f64 >= limit as f64 * self.config.limit_threshold)
            })
            .collect();

        let (mut sample, source) = if limit_hitting.is_empty() {
            (completed, P90Source::Fallback)
        } else {
            (limit_hitting, P90Source::KnownLimit)
        };
        sample.sort_unstable();

        let p90 = sample[p90_index(sample.len())];
        P90Estimate {
            limit: p90.max(self.config.floor),
            confidence: (sample.len() as f64 / 20.0).min(1.0),
            source,
        }
    }
}

/// Index of the 90th percentile in an ascending sample of `n` elements:
/// `ceil(0.9 * n) - 1`.
fn p90_index(n: usize) -> usize {
    ((0.9 * n as f64).ceil() as usize).saturating_sub(1)
}
