//! JSONL line classification for both provider log formats.
//!
//! One JSON object per line. Lines that carry usage become [`UsageRecord`]s;
//! rate-limit system messages become [`LimitEvent`]s; everything else is
//! skipped, malformed, or invalid, and counted for diagnostics.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use monitor_core::models::{LimitEvent, Provider, TokenUsage, UsageRecord};
use monitor_core::pricing::PricingTable;

/// Classification of one log line.
#[derive(Debug)]
pub enum LineOutcome {
    /// A usable per-call usage record.
    Record(UsageRecord),
    /// A rate-limit notification worth attaching to the current block.
    Limit(LimitEvent),
    /// No usage payload (system chatter, tool results, blank line).
    Skipped,
    /// Unparseable JSON or a usage line missing its required timestamp.
    Malformed,
    /// Structurally fine but impossible data (negative token counts).
    Invalid,
}

fn limit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)rate limit.*opus|token limit reached").expect("regex is valid")
    })
}

/// Classify a single line from a provider log.
///
/// Token extraction prefers `message.usage.*` over the top-level fields;
/// an explicit `cost`/`costUSD` value is authoritative, otherwise the cost
/// is computed from the pricing table.
pub fn parse_usage_line(
    line: &str,
    provider: Provider,
    pricing: &mut PricingTable,
) -> LineOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineOutcome::Skipped;
    }

    let data: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return LineOutcome::Malformed,
    };

    // Rate-limit system messages have no usage payload but still matter.
    if let Some(event) = detect_limit_event(&data) {
        return LineOutcome::Limit(event);
    }

    let Some(usage_obj) = usage_object(&data) else {
        return LineOutcome::Skipped;
    };

    let input = find_i64(usage_obj, &["input_tokens"]);
    let output = find_i64(usage_obj, &["output_tokens"]);
    let cache_creation = find_i64(
        usage_obj,
        &["cache_creation_input_tokens", "cache_creation_tokens"],
    );
    let cache_read = find_i64(usage_obj, &["cache_read_input_tokens", "cache_read_tokens"]);

    if input < 0 || output < 0 || cache_creation < 0 || cache_read < 0 {
        return LineOutcome::Invalid;
    }

    let Some(timestamp) = data
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(parse_timestamp)
    else {
        return LineOutcome::Malformed;
    };

    let tokens = TokenUsage {
        input: input as u64,
        output: output as u64,
        cache_creation: cache_creation as u64,
        cache_read: cache_read as u64,
    };

    let model = extract_model(&data);

    // An explicit cost on the line is trusted over recomputation.
    let cost_usd = data
        .get("cost")
        .or_else(|| data.get("costUSD"))
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| pricing.cost(&model, &tokens));

    let message_id = data
        .get("message_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| {
            data.get("message")
                .and_then(|m| m.get("id"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });
    let request_id = data
        .get("requestId")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| {
            data.get("request_id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });

    LineOutcome::Record(UsageRecord {
        timestamp,
        model,
        tokens,
        cost_usd,
        message_id,
        request_id,
        provider,
    })
}

/// Parse an ISO-8601 timestamp, accepting both the `Z` suffix and explicit
/// offsets; the result is always UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    let normalised = match s.strip_suffix('Z') {
        Some(stripped) => format!("{}+00:00", stripped),
        None => s.to_string(),
    };
    DateTime::parse_from_rfc3339(&normalised)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The object holding the token counts: `message.usage` when it carries
/// usage keys, otherwise the top level when it does.
fn usage_object(data: &Value) -> Option<&Value> {
    let has_usage_keys =
        |obj: &Value| obj.get("input_tokens").is_some() || obj.get("output_tokens").is_some();

    if let Some(nested) = data.get("message").and_then(|m| m.get("usage")) {
        if has_usage_keys(nested) {
            return Some(nested);
        }
    }
    if has_usage_keys(data) {
        return Some(data);
    }
    None
}

/// First matching key as a signed integer, so negative counts are caught
/// instead of silently dropped.
fn find_i64(obj: &Value, keys: &[&str]) -> i64 {
    for &key in keys {
        if let Some(v) = obj.get(key).and_then(|v| v.as_i64()) {
            return v;
        }
    }
    0
}

/// Model from `message.model`, then the top level, else `"unknown"`.
fn extract_model(data: &Value) -> String {
    if let Some(s) = data
        .get("message")
        .and_then(|m| m.get("model"))
        .and_then(|v| v.as_str())
    {
        if !s.is_empty() {
            return s.to_string();
        }
    }
    if let Some(s) = data.get("model").and_then(|v| v.as_str()) {
        if !s.is_empty() {
            return s.to_string();
        }
    }
    "unknown".to_string()
}

/// A system message matching the rate-limit pattern, with a timestamp.
fn detect_limit_event(data: &Value) -> Option<LimitEvent> {
    if data.get("type").and_then(|v| v.as_str()) != Some("system") {
        return None;
    }
    let content = data.get("content").and_then(|v| v.as_str())?;
    if !limit_regex().is_match(content) {
        return None;
    }
    let timestamp = data
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(parse_timestamp)?;
    Some(LimitEvent {
        timestamp,
        content: content.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn pricing() -> PricingTable {
        PricingTable::new()
    }

    // ── parse_timestamp ───────────────────────────────────────────────────

    #[test]
    fn test_parse_timestamp_z_suffix() {
        let dt = parse_timestamp("2025-03-10T10:30:00Z").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parse_timestamp_offset_normalized_to_utc() {
        let dt = parse_timestamp("2025-03-10T14:00:00+05:00").unwrap();
        assert_eq!(dt.hour(), 9);
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert!(parse_timestamp("not-a-time").is_none());
        assert!(parse_timestamp("").is_none());
    }

    // ── record extraction ─────────────────────────────────────────────────

    #[test]
    fn test_top_level_usage_fields() {
        let line = serde_json::json!({
            "timestamp": "2025-03-10T10:00:00Z",
            "model": "claude-3-5-sonnet-20241022",
            "input_tokens": 100,
            "output_tokens": 50,
            "message_id": "m1",
            "request_id": "r1",
        })
        .to_string();

        let LineOutcome::Record(record) = parse_usage_line(&line, Provider::Claude, &mut pricing())
        else {
            panic!("expected record");
        };
        assert_eq!(record.tokens.input, 100);
        assert_eq!(record.tokens.output, 50);
        assert_eq!(record.message_id.as_deref(), Some("m1"));
        assert_eq!(record.provider, Provider::Claude);
    }

    #[test]
    fn test_nested_usage_preferred_over_top_level() {
        let line = serde_json::json!({
            "timestamp": "2025-03-10T10:00:00Z",
            "input_tokens": 999,
            "output_tokens": 999,
            "message": {
                "model": "claude-sonnet-4-20250514",
                "id": "msg-nested",
                "usage": {
                    "input_tokens": 300,
                    "output_tokens": 150,
                    "cache_creation_input_tokens": 20,
                    "cache_read_input_tokens": 10,
                }
            },
            "requestId": "req-1",
        })
        .to_string();

        let LineOutcome::Record(record) =
            parse_usage_line(&line, Provider::Claude, &mut pricing())
        else {
            panic!("expected record");
        };
        assert_eq!(record.tokens.input, 300);
        assert_eq!(record.tokens.cache_creation, 20);
        assert_eq!(record.tokens.cache_read, 10);
        assert_eq!(record.model, "claude-sonnet-4-20250514");
        assert_eq!(record.message_id.as_deref(), Some("msg-nested"));
        assert_eq!(record.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_explicit_cost_is_authoritative() {
        let line = serde_json::json!({
            "timestamp": "2025-03-10T10:00:00Z",
            "model": "claude-3-5-sonnet",
            "input_tokens": 1_000_000,
            "output_tokens": 0,
            "costUSD": 1.23,
        })
        .to_string();

        let LineOutcome::Record(record) =
            parse_usage_line(&line, Provider::Claude, &mut pricing())
        else {
            panic!("expected record");
        };
        assert!((record.cost_usd - 1.23).abs() < 1e-9);
    }

    #[test]
    fn test_missing_cost_is_computed_from_pricing() {
        let line = serde_json::json!({
            "timestamp": "2025-03-10T10:00:00Z",
            "model": "claude-3-5-sonnet",
            "input_tokens": 1_000_000,
            "output_tokens": 1_000_000,
        })
        .to_string();

        let LineOutcome::Record(record) =
            parse_usage_line(&line, Provider::Claude, &mut pricing())
        else {
            panic!("expected record");
        };
        assert!((record.cost_usd - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_null_cost_falls_back_to_computation() {
        let line = serde_json::json!({
            "timestamp": "2025-03-10T10:00:00Z",
            "model": "claude-3-haiku",
            "input_tokens": 1_000_000,
            "output_tokens": 0,
            "cost": null,
        })
        .to_string();

        let LineOutcome::Record(record) =
            parse_usage_line(&line, Provider::Claude, &mut pricing())
        else {
            panic!("expected record");
        };
        assert!((record.cost_usd - 0.25).abs() < 1e-9);
    }

    // ── non-record outcomes ───────────────────────────────────────────────

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_usage_line("{not json{{", Provider::Claude, &mut pricing()),
            LineOutcome::Malformed
        ));
    }

    #[test]
    fn test_blank_line_skipped() {
        assert!(matches!(
            parse_usage_line("   ", Provider::Claude, &mut pricing()),
            LineOutcome::Skipped
        ));
    }

    #[test]
    fn test_line_without_usage_skipped() {
        let line = serde_json::json!({
            "timestamp": "2025-03-10T10:00:00Z",
            "type": "system",
            "content": "session started",
        })
        .to_string();
        assert!(matches!(
            parse_usage_line(&line, Provider::Claude, &mut pricing()),
            LineOutcome::Skipped
        ));
    }

    #[test]
    fn test_negative_tokens_invalid() {
        let line = serde_json::json!({
            "timestamp": "2025-03-10T10:00:00Z",
            "model": "claude-3-5-sonnet",
            "input_tokens": -5,
            "output_tokens": 10,
        })
        .to_string();
        assert!(matches!(
            parse_usage_line(&line, Provider::Claude, &mut pricing()),
            LineOutcome::Invalid
        ));
    }

    #[test]
    fn test_usage_without_timestamp_malformed() {
        let line = serde_json::json!({
            "model": "claude-3-5-sonnet",
            "input_tokens": 10,
            "output_tokens": 5,
        })
        .to_string();
        assert!(matches!(
            parse_usage_line(&line, Provider::Claude, &mut pricing()),
            LineOutcome::Malformed
        ));
    }

    // ── limit events ──────────────────────────────────────────────────────

    #[test]
    fn test_opus_rate_limit_detected() {
        let line = serde_json::json!({
            "type": "system",
            "timestamp": "2025-03-10T10:00:00Z",
            "content": "Rate limit for Opus reached, please wait.",
        })
        .to_string();
        assert!(matches!(
            parse_usage_line(&line, Provider::Claude, &mut pricing()),
            LineOutcome::Limit(_)
        ));
    }

    #[test]
    fn test_token_limit_reached_detected() {
        let line = serde_json::json!({
            "type": "system",
            "timestamp": "2025-03-10T10:00:00Z",
            "content": "Token limit reached|1741600800",
        })
        .to_string();
        let LineOutcome::Limit(event) =
            parse_usage_line(&line, Provider::Claude, &mut pricing())
        else {
            panic!("expected limit event");
        };
        assert!(event.content.contains("Token limit reached"));
    }

    #[test]
    fn test_non_system_limit_text_not_detected() {
        let line = serde_json::json!({
            "type": "assistant",
            "timestamp": "2025-03-10T10:00:00Z",
            "content": "token limit reached",
        })
        .to_string();
        assert!(matches!(
            parse_usage_line(&line, Provider::Claude, &mut pricing()),
            LineOutcome::Skipped
        ));
    }
}
