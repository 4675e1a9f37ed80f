//! The contract every ingestion source satisfies.

use std::time::Instant;

use monitor_core::error::Result;
use monitor_core::models::{LimitEvent, Provider, UsageRecord};

/// Per-pull diagnostic counters, surfaced on the monitor state so the UI
/// can show drop rates without a log file.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullStats {
    /// Lines that became usage records.
    pub records: usize,
    /// Lines with no usage payload.
    pub skipped_lines: usize,
    /// Unparseable lines or usage lines missing a timestamp.
    pub malformed_lines: usize,
    /// Lines with impossible data (negative token counts).
    pub invalid_records: usize,
    /// Whether the soft deadline cut this pull short.
    pub deadline_hit: bool,
}

impl PullStats {
    /// Total lines dropped for any reason.
    pub fn dropped(&self) -> usize {
        self.skipped_lines + self.malformed_lines + self.invalid_records
    }
}

/// Everything one pull produced.
#[derive(Debug, Default)]
pub struct SourcePull {
    /// New usage records, sorted by timestamp.
    pub records: Vec<UsageRecord>,
    /// Rate-limit notifications observed in the new lines.
    pub limit_events: Vec<LimitEvent>,
    /// Diagnostic counters for this pull.
    pub stats: PullStats,
}

/// An adapter that yields new usage records on each driver tick.
///
/// Pulls are idempotent across overlapping windows: re-reading lines is
/// fine, because deduplication happens downstream.
pub trait UsageSource: Send {
    /// Which provider this source feeds.
    fn provider(&self) -> Provider;

    /// Pull the records appended since the previous call.
    ///
    /// `deadline` is a cooperative soft deadline: a source past it stops
    /// early and returns what it has, with `stats.deadline_hit` set.
    /// Partial data is acceptable; the next tick picks up the rest.
    fn pull_new_records(&mut self, deadline: Option<Instant>) -> Result<SourcePull>;
}
