//! The local Codex usage log: read side and the writer helper the
//! monitored application links against.
//!
//! Schema matches the Claude logs except the cache fields are always zero.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use monitor_core::error::{MonitorError, Result};
use monitor_core::models::Provider;
use monitor_core::pricing::PricingTable;
use monitor_core::settings::STATE_DIR_NAME;

use crate::parse::{parse_usage_line, LineOutcome};
use crate::source::{SourcePull, UsageSource};
use crate::tail::FileTailer;

/// File name of the append-only Codex usage log.
pub const USAGE_LOG_FILE: &str = "usage_log.jsonl";

/// Default path: `$HOME/.genai-code-usage-monitor/usage_log.jsonl`.
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_DIR_NAME)
        .join(USAGE_LOG_FILE)
}

// ── Read side ─────────────────────────────────────────────────────────────────

/// Tails the single append-only Codex log.
pub struct CodexSource {
    log_path: PathBuf,
    tailer: FileTailer,
    pricing: PricingTable,
}

impl CodexSource {
    /// Create a source over an explicit log path.
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            tailer: FileTailer::new(),
            pricing: PricingTable::new(),
        }
    }

    /// Create a source over the default log path.
    pub fn with_default_path() -> Self {
        Self::new(default_log_path())
    }

    /// The log path this source reads from.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

impl UsageSource for CodexSource {
    fn provider(&self) -> Provider {
        Provider::Codex
    }

    fn pull_new_records(&mut self, deadline: Option<Instant>) -> Result<SourcePull> {
        let mut pull = SourcePull::default();

        // No log yet just means the monitored application has not run.
        if !self.log_path.exists() {
            return Ok(pull);
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                pull.stats.deadline_hit = true;
                return Ok(pull);
            }
        }

        let lines = self
            .tailer
            .read_new_lines(&self.log_path)
            .map_err(|e| MonitorError::Source {
                path: self.log_path.clone(),
                message: e.to_string(),
            })?;

        for line in &lines {
            match parse_usage_line(line, Provider::Codex, &mut self.pricing) {
                LineOutcome::Record(record) => {
                    pull.stats.records += 1;
                    pull.records.push(record);
                }
                LineOutcome::Limit(event) => pull.limit_events.push(event),
                LineOutcome::Skipped => pull.stats.skipped_lines += 1,
                LineOutcome::Malformed => pull.stats.malformed_lines += 1,
                LineOutcome::Invalid => pull.stats.invalid_records += 1,
            }
        }

        pull.records.sort_by_key(|r| r.timestamp);
        debug!(records = pull.stats.records, "codex pull complete");
        Ok(pull)
    }
}

// ── Write side ────────────────────────────────────────────────────────────────

/// One call as the monitored application reports it.
#[derive(Debug, Clone)]
pub struct LoggedCall {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Authoritative cost if the caller already knows it.
    pub cost_usd: Option<f64>,
    pub message_id: Option<String>,
    pub request_id: Option<String>,
}

/// On-disk line shape, kept in lockstep with the parser's expectations.
#[derive(Serialize)]
struct WireRecord<'a> {
    timestamp: String,
    model: &'a str,
    input_tokens: u64,
    output_tokens: u64,
    cache_creation_tokens: u64,
    cache_read_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
}

/// Append-only JSONL writer exposed to the monitored application.
pub struct UsageLogWriter {
    path: PathBuf,
}

impl UsageLogWriter {
    /// Create a writer targeting an explicit path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Create a writer targeting the default log path.
    pub fn with_default_path() -> Self {
        Self::new(default_log_path())
    }

    /// Append one call to the log, creating parent directories on first use.
    pub fn append(&self, call: &LoggedCall) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let wire = WireRecord {
            timestamp: call.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            model: &call.model,
            input_tokens: call.input_tokens,
            output_tokens: call.output_tokens,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
            cost: call.cost_usd,
            message_id: call.message_id.as_deref(),
            request_id: call.request_id.as_deref(),
        };

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&wire)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn call(h: u32, input: u64, output: u64) -> LoggedCall {
        LoggedCall {
            timestamp: Utc.with_ymd_and_hms(2025, 3, 10, h, 0, 0).unwrap(),
            model: "gpt-4-turbo".to_string(),
            input_tokens: input,
            output_tokens: output,
            cost_usd: None,
            message_id: Some(format!("m-{h}")),
            request_id: Some(format!("r-{h}")),
        }
    }

    #[test]
    fn test_writer_then_reader_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(USAGE_LOG_FILE);

        let writer = UsageLogWriter::new(path.clone());
        writer.append(&call(10, 1_000, 500)).unwrap();
        writer.append(&call(11, 2_000, 1_000)).unwrap();

        let mut source = CodexSource::new(path);
        let pull = source.pull_new_records(None).unwrap();

        assert_eq!(pull.records.len(), 2);
        assert_eq!(pull.records[0].tokens.input, 1_000);
        assert_eq!(pull.records[0].tokens.cache_creation, 0);
        assert_eq!(pull.records[0].tokens.cache_read, 0);
        assert_eq!(pull.records[0].provider, Provider::Codex);
        // gpt-4-turbo: (1000 * 10 + 500 * 30) / 1e6 = 0.025
        assert!((pull.records[0].cost_usd - 0.025).abs() < 1e-9);
    }

    #[test]
    fn test_writer_explicit_cost_survives_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(USAGE_LOG_FILE);

        let mut c = call(10, 100, 50);
        c.cost_usd = Some(0.42);
        UsageLogWriter::new(path.clone()).append(&c).unwrap();

        let mut source = CodexSource::new(path);
        let pull = source.pull_new_records(None).unwrap();
        assert!((pull.records[0].cost_usd - 0.42).abs() < 1e-9);
    }

    #[test]
    fn test_missing_log_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let mut source = CodexSource::new(dir.path().join("never-written.jsonl"));
        let pull = source.pull_new_records(None).unwrap();
        assert!(pull.records.is_empty());
        assert!(!pull.stats.deadline_hit);
    }

    #[test]
    fn test_incremental_reads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(USAGE_LOG_FILE);
        let writer = UsageLogWriter::new(path.clone());

        writer.append(&call(10, 100, 50)).unwrap();
        let mut source = CodexSource::new(path);
        assert_eq!(source.pull_new_records(None).unwrap().records.len(), 1);

        writer.append(&call(11, 200, 100)).unwrap();
        let pull = source.pull_new_records(None).unwrap();
        assert_eq!(pull.records.len(), 1);
        assert_eq!(pull.records[0].tokens.input, 200);
    }

    #[test]
    fn test_default_log_path_shape() {
        let path = default_log_path();
        assert!(path.ends_with(
            Path::new(STATE_DIR_NAME).join(USAGE_LOG_FILE)
        ));
    }
}
