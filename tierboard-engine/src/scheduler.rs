//! Refresh Scheduler
//!
//! Drives the classification pipeline from four sources:
//!
//! - the initial load on startup (today, fixed roster only)
//! - manual triggers from the command channel
//! - a short polling interval that silently re-runs the current filter
//! - a long interval that forces the view back to today + fixed roster
//!
//! The loop awaits each run before looking at the next trigger, so runs never
//! overlap. Triggers that queue up meanwhile are folded into a single run.

use crate::config::EngineConfig;
use crate::constants::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_RESET_INTERVAL_MS};
use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::state::{coalesce, Trigger, TriggerKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Silent re-run of the current filter (default: 2 minutes)
    pub poll_interval: Duration,

    /// Forced reset to today + fixed roster (default: 30 minutes)
    pub reset_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            reset_interval: Duration::from_millis(DEFAULT_RESET_INTERVAL_MS),
        }
    }
}

impl From<&EngineConfig> for SchedulerConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            reset_interval: config.reset_interval(),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for pipeline activity since startup.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    pub runs_started: AtomicU64,
    pub runs_committed: AtomicU64,
    pub runs_failed: AtomicU64,

    /// Classification runs and time-series refreshes dropped because a newer
    /// one was triggered.
    pub stale_discarded: AtomicU64,

    /// Triggers folded into another one while a run was in flight.
    pub triggers_coalesced: AtomicU64,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_committed: self.runs_committed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            triggers_coalesced: self.triggers_coalesced.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub runs_started: u64,
    pub runs_committed: u64,
    pub runs_failed: u64,
    pub stale_discarded: u64,
    pub triggers_coalesced: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Run the scheduler until `shutdown_rx` flips to `true` (or its sender is
/// dropped). A run in progress always finishes first.
///
/// Closing the trigger channel only stops manual triggers; the timers keep
/// running.
pub async fn scheduler_task(
    pipeline: Arc<Pipeline>,
    config: SchedulerConfig,
    mut triggers: mpsc::Receiver<Trigger>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SchedulerMetrics> {
    let metrics = pipeline.metrics();

    let start = Instant::now();
    let mut poll = interval_at(start + config.poll_interval, config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut reset = interval_at(start + config.reset_interval, config.reset_interval);
    reset.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        reset_interval_ms = config.reset_interval.as_millis() as u64,
        "Refresh scheduler started"
    );

    dispatch(&pipeline, Trigger::initial()).await;

    let mut triggers_open = true;
    loop {
        let first = tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Refresh scheduler shutting down");
                    break;
                }
                continue;
            }

            received = triggers.recv(), if triggers_open => match received {
                Some(trigger) => trigger,
                None => {
                    tracing::debug!("Trigger channel closed; timers only");
                    triggers_open = false;
                    continue;
                }
            },

            _ = reset.tick() => Trigger::reset(),

            _ = poll.tick() => Trigger::poll(),
        };

        let mut pending = vec![first];
        while let Ok(next) = triggers.try_recv() {
            pending.push(next);
        }
        if pending.len() > 1 {
            metrics
                .triggers_coalesced
                .fetch_add((pending.len() - 1) as u64, Ordering::Relaxed);
            tracing::debug!(count = pending.len(), "Coalescing pending triggers");
        }
        if let Some(trigger) = coalesce(pending) {
            let was_reset = trigger.kind == TriggerKind::Reset;
            dispatch(&pipeline, trigger).await;
            // A reset already re-ran the current filter; restart the poll period.
            if was_reset {
                poll.reset();
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        runs_started = snapshot.runs_started,
        runs_committed = snapshot.runs_committed,
        runs_failed = snapshot.runs_failed,
        stale_discarded = snapshot.stale_discarded,
        triggers_coalesced = snapshot.triggers_coalesced,
        "Refresh scheduler completed"
    );

    metrics
}

/// Run one trigger. Failures are already reported by the pipeline.
async fn dispatch(pipeline: &Pipeline, trigger: Trigger) {
    let kind = trigger.kind;
    match pipeline.run(trigger).await {
        Ok(report) => {
            tracing::trace!(run_id = report.run_id.0, trigger = %kind, "Run dispatched");
        }
        Err(PipelineError::Stale { run_id, latest }) => {
            tracing::debug!(run_id = run_id.0, latest = latest.0, "Run superseded");
        }
        Err(PipelineError::Fetch(_)) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_orders_intervals() {
        let config = SchedulerConfig::default();
        assert!(config.reset_interval > config.poll_interval);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = SchedulerMetrics::new();
        metrics.runs_started.fetch_add(3, Ordering::Relaxed);
        metrics.triggers_coalesced.fetch_add(2, Ordering::Relaxed);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs_started, 3);
        assert_eq!(snapshot.triggers_coalesced, 2);
        assert_eq!(snapshot.runs_failed, 0);
    }
}
