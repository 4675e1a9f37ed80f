//! Per-provider aggregation of usage records into session blocks and
//! windowed statistics.
//!
//! Blocks are a cover of the timeline, not a partition: a record joins
//! every existing block whose window contains it, and opens a new
//! hour-floored block when none does. Overlap therefore happens when
//! sessions straddle each other; per-block stats intentionally reflect the
//! full set of records inside each window. Windowed statistics are computed
//! from a flat record list instead, so overlapping blocks never double
//! count.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};

use monitor_core::models::{
    LimitEvent, Provider, SessionBlock, UsageRecord, UsageStats,
};
use monitor_core::pricing::PricingTable;
use monitor_core::time_utils::floor_to_hour;

/// Default analysis window: 8 days of history.
pub const DEFAULT_ANALYSIS_WINDOW_HOURS: u64 = 192;

/// Owns all records and session blocks for a single provider.
pub struct UsageAggregator {
    provider: Provider,
    window: TimeDelta,
    /// Every admitted record, chronologically; the source of truth for
    /// windowed stats and the burn-rate tail.
    records: Vec<UsageRecord>,
    /// Session blocks sorted by start time; gap blocks appear after
    /// [`UsageAggregator::refresh`].
    blocks: Vec<SessionBlock>,
    /// Rate-limit notifications inside the analysis window.
    limit_events: Vec<LimitEvent>,
    pricing: PricingTable,
}

impl UsageAggregator {
    /// Create an aggregator with the default 192-hour analysis window.
    pub fn new(provider: Provider) -> Self {
        Self::with_window(provider, DEFAULT_ANALYSIS_WINDOW_HOURS)
    }

    /// Create an aggregator with an explicit analysis window.
    pub fn with_window(provider: Provider, window_hours: u64) -> Self {
        Self {
            provider,
            window: TimeDelta::hours(window_hours as i64),
            records: Vec::new(),
            blocks: Vec::new(),
            limit_events: Vec::new(),
            pricing: PricingTable::new(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    // ── Admission ─────────────────────────────────────────────────────────

    /// Admit one deduplicated record.
    ///
    /// The record joins every existing block whose window contains its
    /// timestamp; when none does, a new block opens at the hour floor.
    pub fn admit(&mut self, record: &UsageRecord) {
        let mut joined = false;
        for block in self.blocks.iter_mut() {
            if !block.is_gap && block.contains(record.timestamp) {
                block.push_record(record);
                joined = true;
            }
        }

        if !joined {
            let start = floor_to_hour(record.timestamp);
            let mut block = SessionBlock::open(start, self.provider.block_duration());
            block.push_record(record);
            let position = self
                .blocks
                .partition_point(|b| b.start_time <= block.start_time);
            self.blocks.insert(position, block);
        }

        let position = self
            .records
            .partition_point(|r| r.timestamp <= record.timestamp);
        self.records.insert(position, record.clone());
    }

    /// Admit a batch, then rebuild gaps and active flags.
    pub fn admit_all(&mut self, records: &[UsageRecord], now: DateTime<Utc>) {
        for record in records {
            self.admit(record);
        }
        self.refresh(now);
    }

    /// Attach rate-limit events to the blocks containing them and keep them
    /// in the sidecar list.
    pub fn record_limit_events(&mut self, events: &[LimitEvent]) {
        for event in events {
            for block in self.blocks.iter_mut() {
                if !block.is_gap && block.contains(event.timestamp) {
                    block.limit_events.push(event.clone());
                }
            }
            self.limit_events.push(event.clone());
        }
    }

    // ── Maintenance ───────────────────────────────────────────────────────

    /// Rebuild gap blocks and the active flag.
    ///
    /// A gap is synthesized between adjacent non-gap blocks whose idle
    /// interval exceeds one block duration, spanning exactly the open
    /// interval between them. Exactly one block can be active: the most
    /// recent non-gap block, when it has records and its window is open.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        self.blocks.retain(|b| !b.is_gap);
        self.blocks.sort_by_key(|b| b.start_time);

        let threshold = self.provider.block_duration();
        let mut rebuilt: Vec<SessionBlock> = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.drain(..) {
            if let Some(prev) = rebuilt.last() {
                if block.start_time - prev.end_time > threshold {
                    rebuilt.push(SessionBlock::gap(prev.end_time, block.start_time));
                }
            }
            rebuilt.push(block);
        }
        self.blocks = rebuilt;

        for block in self.blocks.iter_mut() {
            block.is_active = false;
        }
        if let Some(last) = self.blocks.iter_mut().rev().find(|b| !b.is_gap) {
            last.is_active = !last.records.is_empty() && now < last.end_time;
        }
    }

    /// Drop blocks, records, and limit events older than the analysis
    /// window. Dedup state is unaffected; its own bound handles growth.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        self.blocks.retain(|b| b.end_time >= cutoff);
        self.records.retain(|r| r.timestamp >= cutoff);
        self.limit_events.retain(|e| e.timestamp >= cutoff);
    }

    // ── Views ─────────────────────────────────────────────────────────────

    /// All blocks in chronological order, gaps included.
    pub fn blocks(&self) -> &[SessionBlock] {
        &self.blocks
    }

    /// All retained records in chronological order.
    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }

    /// Rate-limit events inside the analysis window.
    pub fn limit_events(&self) -> &[LimitEvent] {
        &self.limit_events
    }

    /// The currently active block, if any.
    pub fn active_block(&self) -> Option<&SessionBlock> {
        self.blocks.iter().rev().find(|b| b.is_active)
    }

    /// Stats over records at or after `cutoff` (e.g. the last 24/168/720 h).
    pub fn stats_since(&self, cutoff: DateTime<Utc>) -> UsageStats {
        self.stats_from(self.records.iter().filter(|r| r.timestamp >= cutoff))
    }

    /// Stats over everything retained in the analysis window.
    pub fn window_stats(&self) -> UsageStats {
        self.stats_from(self.records.iter())
    }

    /// Stats over the active session block; zeroed when idle.
    pub fn session_stats(&self) -> UsageStats {
        match self.active_block() {
            Some(block) => self.stats_from(block.records.iter()),
            None => UsageStats::default(),
        }
    }

    /// Per-day stats, where a "day" rolls at `reset_hour` (0-23) rather
    /// than midnight. Keys are `YYYY-MM-DD` of the rolled day, ascending.
    pub fn daily_buckets(&self, reset_hour: u8) -> Vec<(String, UsageStats)> {
        let shift = TimeDelta::hours(i64::from(reset_hour));
        let mut buckets: BTreeMap<String, UsageStats> = BTreeMap::new();
        for record in &self.records {
            let key = (record.timestamp - shift).format("%Y-%m-%d").to_string();
            let stats = buckets.entry(key).or_default();
            stats.tokens.accumulate(&record.tokens);
            stats.cost_usd += record.cost_usd;
            stats.cache_savings += self.pricing.cache_savings(&record.model, &record.tokens);
            stats.call_count += 1;
        }
        buckets.into_iter().collect()
    }

    fn stats_from<'a>(&self, records: impl Iterator<Item = &'a UsageRecord>) -> UsageStats {
        let mut stats = UsageStats::default();
        for record in records {
            stats.tokens.accumulate(&record.tokens);
            stats.cost_usd += record.cost_usd;
            stats.cache_savings += self.pricing.cache_savings(&record.model, &record.tokens);
            stats.call_count += 1;
        }
        stats
    }
}
