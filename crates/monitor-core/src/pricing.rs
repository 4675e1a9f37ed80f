use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::models::{normalize_model_name, TokenUsage};

/// Per-model rates in US dollars per million tokens.
///
/// GPT models have no prompt cache; their cache rates are zero so the dot
/// product stays uniform across providers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Price per million input (prompt) tokens.
    pub input: f64,
    /// Price per million output (completion) tokens.
    pub output: f64,
    /// Price per million cache-creation tokens.
    pub cache_creation: f64,
    /// Price per million cache-read tokens.
    pub cache_read: f64,
}

impl ModelPricing {
    const fn new(input: f64, output: f64, cache_creation: f64, cache_read: f64) -> Self {
        Self {
            input,
            output,
            cache_creation,
            cache_read,
        }
    }
}

// ── Family rates ($/million tokens) ───────────────────────────────────────────
//
// For the Claude families cache_creation is exactly 1.25 x input and
// cache_read exactly 0.10 x input. Cache creation is MORE expensive than
// input; pricing it at the cache-read rate understates cost by up to an
// order of magnitude.

const OPUS: ModelPricing = ModelPricing::new(15.0, 75.0, 18.75, 1.50);
const SONNET: ModelPricing = ModelPricing::new(3.0, 15.0, 3.75, 0.30);
const HAIKU: ModelPricing = ModelPricing::new(0.25, 1.25, 0.3125, 0.025);
const GPT4: ModelPricing = ModelPricing::new(30.0, 60.0, 0.0, 0.0);
const GPT4_TURBO: ModelPricing = ModelPricing::new(10.0, 30.0, 0.0, 0.0);
const GPT35_TURBO: ModelPricing = ModelPricing::new(0.50, 1.50, 0.0, 0.0);

/// Key of the conservative fallback entry (Sonnet rates) used for
/// unrecognised models.
pub const DEFAULT_MODEL_KEY: &str = "default";

fn builtin_rates() -> HashMap<String, ModelPricing> {
    let mut map = HashMap::new();
    map.insert("claude-3-sonnet".to_string(), SONNET);
    map.insert("claude-3-5-sonnet".to_string(), SONNET);
    map.insert("claude-sonnet-4".to_string(), SONNET);
    map.insert("claude-3-opus".to_string(), OPUS);
    map.insert("claude-opus-4".to_string(), OPUS);
    map.insert("claude-3-haiku".to_string(), HAIKU);
    map.insert("claude-3-5-haiku".to_string(), HAIKU);
    map.insert("gpt-4".to_string(), GPT4);
    map.insert("gpt-4-turbo".to_string(), GPT4_TURBO);
    map.insert("gpt-3-5-turbo".to_string(), GPT35_TURBO);
    map.insert(DEFAULT_MODEL_KEY.to_string(), SONNET);
    map
}

/// Resolves per-model rates and computes call costs.
///
/// Read-only after construction apart from the warn-once set used to log
/// each unknown model a single time.
pub struct PricingTable {
    rates: HashMap<String, ModelPricing>,
    warned_models: HashSet<String>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingTable {
    /// Build the table with the built-in rates.
    pub fn new() -> Self {
        Self {
            rates: builtin_rates(),
            warned_models: HashSet::new(),
        }
    }

    /// Resolve rates for `model` without logging:
    /// normalized lookup, then a Claude family keyword, then the default
    /// (Sonnet-rate) entry.
    pub fn rates(&self, model: &str) -> &ModelPricing {
        let normalized = normalize_model_name(model);
        if let Some(p) = self.rates.get(&normalized) {
            return p;
        }
        if normalized.contains("opus") {
            return &OPUS;
        }
        if normalized.contains("haiku") {
            return &HAIKU;
        }
        if normalized.contains("sonnet") {
            return &SONNET;
        }
        &self.rates[DEFAULT_MODEL_KEY]
    }

    /// Whether `model` resolves to a known entry (exact or family keyword).
    fn is_known(&self, model: &str) -> bool {
        let normalized = normalize_model_name(model);
        self.rates.contains_key(&normalized)
            || normalized.contains("opus")
            || normalized.contains("haiku")
            || normalized.contains("sonnet")
    }

    /// Cost in USD for one call: the dot product of the token counts with
    /// the per-million rates.
    ///
    /// Unknown models fall back to the default entry and are logged once
    /// per unique name.
    pub fn cost(&mut self, model: &str, tokens: &TokenUsage) -> f64 {
        if !self.is_known(model) && self.warned_models.insert(model.to_string()) {
            warn!(model, "unknown model; using conservative default pricing");
        }
        let p = self.rates(model);
        (tokens.input as f64 * p.input
            + tokens.output as f64 * p.output
            + tokens.cache_creation as f64 * p.cache_creation
            + tokens.cache_read as f64 * p.cache_read)
            / 1e6
    }

    /// Counterfactual cache savings: what the cache reads would have cost at
    /// the input rate minus what they actually cost.
    pub fn cache_savings(&self, model: &str, tokens: &TokenUsage) -> f64 {
        let p = self.rates(model);
        tokens.cache_read as f64 * (p.input - p.cache_read) / 1e6
    }
}
