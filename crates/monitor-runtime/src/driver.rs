//! The single-writer tick loop.
//!
//! One tokio task owns every mutable piece of the pipeline: sources, dedup
//! filters, and aggregators. Each tick runs pull -> dedup -> admit ->
//! prune -> P90 -> burn -> alerts, then publishes an immutable
//! [`MultiPlatformState`] through a watch channel. Readers grab the latest
//! snapshot without locks; the previous one is reclaimed when its last
//! reader drops it.

use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use monitor_core::alerts::AlertEngine;
use monitor_core::burn::BurnRateEstimator;
use monitor_core::p90::P90Calculator;
use monitor_core::plans::{PlanLimits, PlanType};
use monitor_data::aggregator::{UsageAggregator, DEFAULT_ANALYSIS_WINDOW_HOURS};
use monitor_data::dedup::DedupFilter;
use monitor_data::source::UsageSource;

use crate::state::{MonitorState, MultiPlatformState};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Static configuration for the driver loop.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Tick period; source pulls get half of it as a soft deadline.
    pub tick_period: Duration,
    /// Active plan applied to every monitored provider.
    pub plan: PlanType,
    /// Explicit token-limit override (custom plan).
    pub custom_limit_tokens: Option<u64>,
    /// Explicit cost-limit override (custom plan).
    pub custom_limit_cost: Option<f64>,
    /// Analysis window for block retention and the P90 sample.
    pub analysis_window_hours: u64,
    /// Hour of day (0-23) at which the daily view buckets roll.
    pub reset_hour: u8,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(10),
            plan: PlanType::Custom,
            custom_limit_tokens: None,
            custom_limit_cost: None,
            analysis_window_hours: DEFAULT_ANALYSIS_WINDOW_HOURS,
            reset_hour: 0,
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Everything owned per provider: the source tail, its dedup set, and the
/// aggregated history.
struct ProviderPipeline {
    source: Box<dyn UsageSource>,
    dedup: DedupFilter,
    aggregator: UsageAggregator,
    source_healthy: bool,
    skipped_last_tick: usize,
}

impl ProviderPipeline {
    fn new(source: Box<dyn UsageSource>, window_hours: u64) -> Self {
        let provider = source.provider();
        Self {
            source,
            dedup: DedupFilter::new(),
            aggregator: UsageAggregator::with_window(provider, window_hours),
            source_healthy: true,
            skipped_last_tick: 0,
        }
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

/// Owns the per-tick pipeline and publishes snapshots.
pub struct MonitorDriver {
    config: DriverConfig,
    pipelines: Vec<ProviderPipeline>,
    p90: P90Calculator,
    burn: BurnRateEstimator,
}

impl MonitorDriver {
    /// Create a driver with no sources attached yet.
    pub fn new(config: DriverConfig) -> Self {
        Self {
            pipelines: Vec::new(),
            p90: P90Calculator::with_defaults(),
            burn: BurnRateEstimator::with_defaults(),
            config,
        }
    }

    /// Attach a source; one pipeline per provider.
    pub fn add_source(&mut self, source: Box<dyn UsageSource>) {
        let window = self.config.analysis_window_hours;
        self.pipelines.push(ProviderPipeline::new(source, window));
    }

    /// Spawn the tick loop.
    ///
    /// Returns the snapshot receiver and an abort handle. The loop performs
    /// an immediate first tick, then fires on the configured period; missed
    /// ticks are skipped rather than piled up.
    pub fn start(self) -> (watch::Receiver<MultiPlatformState>, DriverHandle) {
        let (tx, rx) = watch::channel(MultiPlatformState::empty(Utc::now()));

        let handle = tokio::spawn(async move {
            self.run(tx).await;
        });

        (rx, DriverHandle { handle })
    }

    async fn run(mut self, tx: watch::Sender<MultiPlatformState>) {
        let mut interval = time::interval(self.config.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if tx.is_closed() {
                debug!("snapshot channel closed; stopping driver loop");
                break;
            }

            let snapshot = self.tick(Utc::now());
            if tx.send(snapshot).is_err() {
                break;
            }
        }
    }

    /// Run one full tick and return the snapshot to publish.
    ///
    /// Synchronous: all file I/O happens here, on the driver task, never on
    /// a UI thread.
    pub fn tick(&mut self, now: DateTime<Utc>) -> MultiPlatformState {
        let deadline = Instant::now() + self.config.tick_period / 2;
        let mut snapshot = MultiPlatformState::empty(now);

        for pipeline in self.pipelines.iter_mut() {
            let state = Self::tick_provider(
                pipeline,
                &self.config,
                &self.p90,
                &self.burn,
                now,
                deadline,
            );
            snapshot.set(state);
        }

        snapshot
    }

    fn tick_provider(
        pipeline: &mut ProviderPipeline,
        config: &DriverConfig,
        p90: &P90Calculator,
        burn: &BurnRateEstimator,
        now: DateTime<Utc>,
        deadline: Instant,
    ) -> MonitorState {
        let provider = pipeline.source.provider();

        // 1-2. Pull and classify. A failing source keeps last-known-good
        // aggregates; only its health flag changes.
        match pipeline.source.pull_new_records(Some(deadline)) {
            Ok(pull) => {
                pipeline.source_healthy = true;
                pipeline.skipped_last_tick = pull.stats.dropped();
                if pull.stats.deadline_hit {
                    debug!(provider = %provider, "pull hit its soft deadline; partial data this tick");
                }

                // 3. Dedup, then admit to the aggregator.
                let kept: Vec<_> = pull
                    .records
                    .into_iter()
                    .filter(|r| pipeline.dedup.admit(r))
                    .collect();
                pipeline.aggregator.admit_all(&kept, now);
                pipeline.aggregator.record_limit_events(&pull.limit_events);
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "source pull failed");
                pipeline.source_healthy = false;
                pipeline.skipped_last_tick = 0;
            }
        }

        // 4. Prune the analysis window, then rebuild gaps and active flags.
        pipeline.aggregator.prune(now);
        pipeline.aggregator.refresh(now);

        // 5. Plan limits; the custom plan's token limit tracks the P90
        // unless an explicit override pins it.
        let mut limits = PlanLimits::for_plan(config.plan)
            .with_overrides(config.custom_limit_tokens, config.custom_limit_cost);
        let p90_estimate = if config.plan == PlanType::Custom {
            let estimate = p90.estimate(pipeline.aggregator.blocks());
            if config.custom_limit_tokens.is_none() {
                limits.token_limit = Some(estimate.limit);
            }
            Some(estimate)
        } else {
            None
        };

        // 6-7. Burn rate, then alerts against the active session.
        let session_stats = pipeline.aggregator.session_stats();
        let burn_rate = burn.estimate(pipeline.aggregator.records(), now, &session_stats, &limits);
        let alerts = AlertEngine::evaluate(&session_stats, &burn_rate, &limits, now);
        let (should_reset, reset_reason) =
            AlertEngine::should_reset_session(&session_stats, &limits, &burn_rate, &alerts);
        let health_score = AlertEngine::session_health_score(&session_stats, &limits, &alerts);

        // The bucket keyed by the rolled current date is the day in
        // progress; zeroed when nothing has been used since the reset hour.
        let today_key = (now - TimeDelta::hours(i64::from(config.reset_hour)))
            .format("%Y-%m-%d")
            .to_string();
        let today_stats = pipeline
            .aggregator
            .daily_buckets(config.reset_hour)
            .into_iter()
            .rev()
            .find(|(key, _)| *key == today_key)
            .map(|(_, stats)| stats)
            .unwrap_or_default();

        // 8. Assemble.
        MonitorState {
            provider,
            plan_limits: limits,
            session_stats,
            window_stats: pipeline.aggregator.window_stats(),
            today_stats,
            active_block: pipeline.aggregator.active_block().cloned(),
            burn_rate,
            p90: p90_estimate,
            active_alerts: alerts,
            should_reset,
            reset_reason,
            health_score,
            source_healthy: pipeline.source_healthy,
            skipped_lines_last_tick: pipeline.skipped_last_tick,
        }
    }

    /// The analysis-window cutoff currently in force.
    pub fn window(&self) -> TimeDelta {
        TimeDelta::hours(self.config.analysis_window_hours as i64)
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Abortable handle to the background driver task.
pub struct DriverHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl DriverHandle {
    /// Stop the tick loop immediately.
    pub fn abort(&self) {
        self.handle.abort();
    }
}
