use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Upstream API vendor whose usage is being monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-backed coding assistant; usage arrives via the local
    /// append-only log written by the monitored application.
    Codex,
    /// Anthropic Claude; usage is tailed from the provider-native JSONL
    /// project logs.
    Claude,
}

impl Provider {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Codex => "codex",
            Provider::Claude => "claude",
        }
    }

    /// Width of one session window for this provider.
    ///
    /// Claude accounts reset on a rolling 5-hour window; Codex usage is
    /// bucketed into 24-hour windows.
    pub fn block_duration(&self) -> TimeDelta {
        match self {
            Provider::Codex => TimeDelta::hours(24),
            Provider::Claude => TimeDelta::hours(5),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = crate::error::MonitorError;

    fn from_str(value: &str) -> crate::error::Result<Self> {
        match value.to_lowercase().as_str() {
            "codex" => Ok(Provider::Codex),
            "claude" => Ok(Provider::Claude),
            other => Err(crate::error::MonitorError::InvalidPlatform(
                other.to_string(),
            )),
        }
    }
}

/// The four-way token split of a single API call or an aggregate thereof.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input (prompt) tokens.
    pub input: u64,
    /// Output (completion) tokens.
    pub output: u64,
    /// Tokens written into the prompt cache (Claude only; zero for Codex).
    #[serde(default)]
    pub cache_creation: u64,
    /// Tokens read back from the prompt cache (Claude only; zero for Codex).
    #[serde(default)]
    pub cache_read: u64,
}

impl TokenUsage {
    /// Sum of all four token categories.
    pub fn total(&self) -> u64 {
        self.input + self.output + self.cache_creation + self.cache_read
    }

    /// Accumulate another usage into this one.
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.input += other.input;
        self.output += other.output;
        self.cache_creation += other.cache_creation;
        self.cache_read += other.cache_read;
    }
}

/// A single normalized per-call usage event.
///
/// Immutable once it has passed the deduplication filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// UTC instant the call was made.
    pub timestamp: DateTime<Utc>,
    /// Raw model identifier as reported by the provider.
    pub model: String,
    /// Token counts for the call.
    pub tokens: TokenUsage,
    /// Cost in US dollars, either authoritative from the log line or
    /// computed from the pricing table.
    pub cost_usd: f64,
    /// Message identifier; half of the dedup key.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Request identifier; the other half of the dedup key.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Which provider emitted this record.
    pub provider: Provider,
}

impl UsageRecord {
    /// The `(message_id, request_id)` dedup pair, when both halves exist.
    pub fn dedup_key(&self) -> Option<(&str, &str)> {
        match (self.message_id.as_deref(), self.request_id.as_deref()) {
            (Some(m), Some(r)) if !m.is_empty() && !r.is_empty() => Some((m, r)),
            _ => None,
        }
    }
}

/// Per-model breakdown of usage within a session block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelStats {
    /// Token counts attributed to this model.
    pub tokens: TokenUsage,
    /// Cost in USD attributed to this model.
    pub cost_usd: f64,
    /// Number of individual calls for this model.
    pub call_count: u32,
}

/// A rate-limit notification observed in a provider log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitEvent {
    /// When the limit message was emitted (UTC).
    pub timestamp: DateTime<Utc>,
    /// Raw content of the notification.
    pub content: String,
}

/// One session window: 5 hours for Claude, 24 hours for Codex.
///
/// Blocks are a *cover* of the timeline, not a partition: a record near the
/// end of one window may also open the next, so two real blocks can overlap.
/// Synthetic gap blocks carry no records and exist only so idle stretches
/// can be rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBlock {
    /// Block identifier: the ISO-8601 start instant.
    pub id: String,
    /// Inclusive start, rounded down to the hour.
    pub start_time: DateTime<Utc>,
    /// Exclusive end: `start_time + block_duration`.
    pub end_time: DateTime<Utc>,
    /// Timestamp of the last record admitted to this block.
    #[serde(default)]
    pub actual_end_time: Option<DateTime<Utc>>,
    /// Whether this block is a synthetic idle-period placeholder.
    #[serde(default)]
    pub is_gap: bool,
    /// Whether this block is the provider's currently open window.
    #[serde(default)]
    pub is_active: bool,
    /// Records admitted to this block, in admission order.
    #[serde(default)]
    pub records: Vec<UsageRecord>,
    /// Aggregate token counts for the block.
    #[serde(default)]
    pub tokens: TokenUsage,
    /// Aggregate cost (USD) for the block.
    #[serde(default)]
    pub cost_usd: f64,
    /// Token and cost statistics broken down by normalized model name.
    #[serde(default)]
    pub per_model_stats: HashMap<String, ModelStats>,
    /// Rate-limit notifications whose timestamp falls inside this block.
    #[serde(default)]
    pub limit_events: Vec<LimitEvent>,
}

impl SessionBlock {
    /// Open a fresh, empty block covering `[start, start + duration)`.
    pub fn open(start: DateTime<Utc>, duration: TimeDelta) -> Self {
        Self {
            id: start.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            start_time: start,
            end_time: start + duration,
            actual_end_time: None,
            is_gap: false,
            is_active: false,
            records: Vec::new(),
            tokens: TokenUsage::default(),
            cost_usd: 0.0,
            per_model_stats: HashMap::new(),
            limit_events: Vec::new(),
        }
    }

    /// Build a synthetic gap block spanning exactly `[start, end)`.
    pub fn gap(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: format!("gap-{}", start.format("%Y-%m-%dT%H:%M:%SZ")),
            start_time: start,
            end_time: end,
            actual_end_time: None,
            is_gap: true,
            is_active: false,
            records: Vec::new(),
            tokens: TokenUsage::default(),
            cost_usd: 0.0,
            per_model_stats: HashMap::new(),
            limit_events: Vec::new(),
        }
    }

    /// Whether `t` falls inside the block's half-open window.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start_time <= t && t < self.end_time
    }

    /// Sum of all token categories over the block.
    pub fn total_tokens(&self) -> u64 {
        self.tokens.total()
    }

    /// Alias for `cost_usd`.
    pub fn total_cost(&self) -> f64 {
        self.cost_usd
    }

    /// Minutes between the block start and its last record (or nominal end),
    /// clamped to a minimum of 1.0.
    pub fn duration_minutes(&self) -> f64 {
        let end = self.actual_end_time.unwrap_or(self.end_time);
        let secs = (end - self.start_time).num_seconds() as f64;
        f64::max(secs / 60.0, 1.0)
    }

    /// Admit a record: accumulate block totals, per-model stats, and advance
    /// `actual_end_time`. The caller is responsible for window membership.
    pub fn push_record(&mut self, record: &UsageRecord) {
        let model = if record.model.is_empty() {
            "unknown".to_string()
        } else {
            normalize_model_name(&record.model)
        };

        let stats = self.per_model_stats.entry(model).or_default();
        stats.tokens.accumulate(&record.tokens);
        stats.cost_usd += record.cost_usd;
        stats.call_count += 1;

        self.tokens.accumulate(&record.tokens);
        self.cost_usd += record.cost_usd;

        self.actual_end_time = Some(match self.actual_end_time {
            Some(existing) => existing.max(record.timestamp),
            None => record.timestamp,
        });

        self.records.push(record.clone());
    }
}

/// Aggregate usage over an arbitrary projection window.
///
/// Derived on demand from the record stream; never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    /// Aggregate token counts.
    pub tokens: TokenUsage,
    /// Aggregate cost (USD).
    pub cost_usd: f64,
    /// Counterfactual savings from cache reads priced at the input rate.
    pub cache_savings: f64,
    /// Number of calls in the window.
    pub call_count: u32,
}

impl UsageStats {
    /// Sum of all token categories.
    pub fn total_tokens(&self) -> u64 {
        self.tokens.total()
    }

    /// Fraction of prompt tokens served from cache:
    /// `cache_read / (input + cache_read)`, or 0 when no prompt tokens.
    pub fn cache_hit_rate(&self) -> f64 {
        let denom = self.tokens.input + self.tokens.cache_read;
        if denom == 0 {
            return 0.0;
        }
        self.tokens.cache_read as f64 / denom as f64
    }
}

/// Normalise a raw model identifier into the canonical pricing key.
///
/// Three deterministic steps:
/// 1. lower-case,
/// 2. collapse version dots (`3.5` → `3-5`),
/// 3. strip a trailing provider date suffix (`-20250514`).
///
/// # Examples
///
/// ```
/// use monitor_core::models::normalize_model_name;
///
/// assert_eq!(normalize_model_name("claude-3-opus-20240229"), "claude-3-opus");
/// assert_eq!(normalize_model_name("claude-sonnet-4-20250514"), "claude-sonnet-4");
/// assert_eq!(normalize_model_name("GPT-3.5-Turbo"), "gpt-3-5-turbo");
/// assert_eq!(normalize_model_name("gpt-4"), "gpt-4");
/// ```
pub fn normalize_model_name(model: &str) -> String {
    if model.is_empty() {
        return String::new();
    }

    let mut name = model.trim().to_lowercase().replace('.', "-");

    // A provider date suffix is an eight-digit trailing segment.
    if let Some(idx) = name.rfind('-') {
        let tail = &name[idx + 1..];
        if tail.len() == 8 && tail.bytes().all(|b| b.is_ascii_digit()) {
            name.truncate(idx);
        }
    }

    name
}
