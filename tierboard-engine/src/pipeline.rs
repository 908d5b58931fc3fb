//! Classification pipeline
//!
//! fetch → ingest → (relabel) → classify → diff → signal → commit.
//!
//! Runs are serialized by a single async gate. Every run is tagged with a
//! [`RunId`] when it is triggered; a run that only gets the gate after a newer
//! run committed is discarded without fetching. Time-series refreshes run
//! outside the gate and are tagged the same way, so only the most recently
//! started refresh may publish.

use crate::clock::Clock;
use crate::config::{EngineConfig, LabelingMode};
use crate::constants::MAX_NOTIFICATIONS;
use crate::error::PipelineError;
use crate::notifications::{push_bounded, Notification, NotificationAction, NotificationLevel};
use crate::scheduler::SchedulerMetrics;
use crate::state::{
    Banner, DashboardFilter, DashboardView, LoadingState, RunId, SnapshotPair, Trigger,
    TriggerKind, Verbosity,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tierboard_core::ingest;
use tierboard_core::{
    aggregate, classify, classify_with_roster, diff, label_by_cumulative_share, AnimationSignal,
    DailyQuery, FetchError, IngestWarning, LabeledRecord, MovementSummary, QueryBackend,
    TrackedSelection,
};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub labeling: LabelingMode,
    /// Agent refs padded into the fourth quartile when the fixed-roster
    /// filter is on and they are missing from the response.
    pub roster: Vec<String>,
}

impl From<&EngineConfig> for PipelineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            labeling: config.labeling,
            roster: config.roster.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct PipelineState {
    filter: DashboardFilter,
    pair: SnapshotPair,
    signal: AnimationSignal,
    last_committed: RunId,
    last_selection: Option<TrackedSelection>,
}

/// Outcome of a committed run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub trigger: TriggerKind,
    pub total_agents: usize,
    pub summary: MovementSummary,
    pub generation_bumped: bool,
    pub warnings: Vec<IngestWarning>,
    /// Time-series refresh started by this run, if any.
    pub time_series: Option<JoinHandle<()>>,
}

pub struct Pipeline {
    backend: Arc<dyn QueryBackend>,
    settings: PipelineSettings,
    clock: Arc<dyn Clock>,
    view: Arc<watch::Sender<DashboardView>>,
    gate: Mutex<PipelineState>,
    next_run: AtomicU64,
    latest_time_series: Arc<AtomicU64>,
    metrics: Arc<SchedulerMetrics>,
}

impl Pipeline {
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        settings: PipelineSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (view, _) = watch::channel(DashboardView::default());
        Self {
            backend,
            settings,
            clock,
            view: Arc::new(view),
            gate: Mutex::new(PipelineState::default()),
            next_run: AtomicU64::new(0),
            latest_time_series: Arc::new(AtomicU64::new(0)),
            metrics: Arc::new(SchedulerMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view.subscribe()
    }

    /// Copy of the currently published view.
    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    /// Tag `trigger` with a fresh run id and run it once the gate is free.
    ///
    /// Ids are taken right before queuing on the gate, and the gate hands out
    /// turns in FIFO order, so runs commit in id order. The stale check below
    /// holds that invariant for any caller that breaks it.
    pub async fn run(&self, trigger: Trigger) -> Result<RunReport, PipelineError> {
        let run_id = RunId(self.next_run.fetch_add(1, Ordering::SeqCst) + 1);
        self.metrics.runs_started.fetch_add(1, Ordering::Relaxed);

        let mut state = self.gate.lock().await;
        if run_id < state.last_committed {
            self.metrics.stale_discarded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                run_id = run_id.0,
                latest = state.last_committed.0,
                trigger = %trigger.kind,
                "Discarding superseded run"
            );
            return Err(PipelineError::Stale {
                run_id,
                latest: state.last_committed,
            });
        }

        let today = self.clock.today();
        for change in &trigger.changes {
            state.filter.apply(change, today);
        }
        let filter = state.filter.clone();
        let verbosity = trigger.kind.verbosity();

        self.view.send_modify(|view| {
            view.filter = filter.clone();
            if verbosity.loading != LoadingState::Idle {
                view.loading = verbosity.loading;
            }
        });

        tracing::debug!(
            run_id = run_id.0,
            trigger = %trigger.kind,
            start = ?filter.query.start_date,
            end = ?filter.query.end_date,
            fixed_roster_only = filter.query.fixed_roster_only,
            "Classification run started"
        );

        let response = match self.backend.fetch_quartiles(&filter.query).await {
            Ok(response) => response,
            Err(err) => {
                self.report_failure(run_id, trigger.kind, verbosity, &err);
                return Err(err.into());
            }
        };

        let ingested = ingest::quartile_records(&response);
        for warning in &ingested.warnings {
            match warning {
                IngestWarning::EmptyPopulation => {
                    tracing::info!(run_id = run_id.0, "No agents matched the active filter")
                }
                IngestWarning::MalformedRecord { .. } => {
                    tracing::warn!(run_id = run_id.0, warning = %warning, "Skipped backend row")
                }
            }
        }

        let records = self.label(ingested.value);
        let captured_at = self.clock.now();
        let snapshot = if filter.query.fixed_roster_only && !self.settings.roster.is_empty() {
            classify_with_roster(records, &self.settings.roster, captured_at)
        } else {
            classify(records, captured_at)
        };

        let movements = diff(state.pair.current(), &snapshot);
        let generation_bumped = state.signal.observe(&movements);
        let highlights = state.signal.highlights(&movements);
        let generation = state.signal.generation();
        let summary = MovementSummary::of(&movements);
        let total_agents = snapshot.total_agents();
        let banner = Banner::from_warnings(&ingested.warnings);

        state.pair.advance(snapshot.clone());
        state.last_committed = run_id;

        self.view.send_modify(|view| {
            view.snapshot = Some(snapshot);
            view.movements = movements;
            view.summary = summary;
            view.generation = generation;
            view.highlights = highlights;
            view.banner = banner;
            view.loading = LoadingState::Idle;
            view.last_run = Some(run_id);
        });
        self.metrics.runs_committed.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            run_id = run_id.0,
            trigger = %trigger.kind,
            agents = total_agents,
            promoted = summary.promoted,
            demoted = summary.demoted,
            improved = summary.improved,
            generation,
            "Classification run committed"
        );

        let selection = filter.selection();
        let selection_changed = state.last_selection.as_ref() != Some(&selection);
        let time_series = if trigger.kind != TriggerKind::Poll || selection_changed {
            state.last_selection = Some(selection.clone());
            self.refresh_time_series(
                selection,
                filter.query.fixed_roster_only,
                verbosity.notify_errors,
            )
        } else {
            None
        };

        Ok(RunReport {
            run_id,
            trigger: trigger.kind,
            total_agents,
            summary,
            generation_bumped,
            warnings: ingested.warnings,
            time_series,
        })
    }

    fn label(&self, records: Vec<LabeledRecord>) -> Vec<LabeledRecord> {
        match self.settings.labeling {
            LabelingMode::Backend => records,
            LabelingMode::CumulativeShare => {
                label_by_cumulative_share(records.into_iter().map(|r| r.record).collect())
            }
        }
    }

    fn report_failure(
        &self,
        run_id: RunId,
        kind: TriggerKind,
        verbosity: Verbosity,
        err: &FetchError,
    ) {
        self.metrics.runs_failed.fetch_add(1, Ordering::Relaxed);
        if !verbosity.notify_errors {
            tracing::warn!(
                run_id = run_id.0,
                trigger = %kind,
                error = %err,
                "Background refresh failed; keeping last snapshot"
            );
            return;
        }

        tracing::error!(run_id = run_id.0, trigger = %kind, error = %err, "Refresh failed");
        let notification = Notification::new(
            NotificationLevel::Error,
            format!("Refresh failed: {}", err),
            self.clock.now(),
        )
        .with_action(NotificationAction::Refresh);
        self.view.send_modify(|view| {
            view.loading = LoadingState::Idle;
            push_bounded(&mut view.notifications, notification, MAX_NOTIFICATIONS);
        });
    }

    /// Recompute the time-series view for `selection`. An idle selection
    /// clears the view without touching the backend.
    fn refresh_time_series(
        &self,
        selection: TrackedSelection,
        fixed_roster_only: bool,
        notify_errors: bool,
    ) -> Option<JoinHandle<()>> {
        let id = self.latest_time_series.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(range) = selection.range.filter(|_| selection.is_active()) else {
            self.view.send_modify(|view| {
                view.time_series = Default::default();
                view.time_series_loading = false;
            });
            return None;
        };

        self.view.send_modify(|view| view.time_series_loading = true);

        let task = TimeSeriesTask {
            id,
            query: DailyQuery {
                range,
                fixed_roster_only,
                agents: selection.agents.iter().cloned().collect(),
            },
            selection,
            notify_errors,
            backend: Arc::clone(&self.backend),
            clock: Arc::clone(&self.clock),
            view: Arc::clone(&self.view),
            latest: Arc::clone(&self.latest_time_series),
            metrics: Arc::clone(&self.metrics),
        };
        Some(tokio::spawn(task.run()))
    }
}

struct TimeSeriesTask {
    id: u64,
    query: DailyQuery,
    selection: TrackedSelection,
    notify_errors: bool,
    backend: Arc<dyn QueryBackend>,
    clock: Arc<dyn Clock>,
    view: Arc<watch::Sender<DashboardView>>,
    latest: Arc<AtomicU64>,
    metrics: Arc<SchedulerMetrics>,
}

impl TimeSeriesTask {
    async fn run(self) {
        let (metric_rows, quartile_rows) = tokio::join!(
            self.backend.fetch_daily_metric(&self.query),
            self.backend.fetch_daily_quartile_position(&self.query),
        );

        let latest = self.latest.load(Ordering::SeqCst);
        if latest != self.id {
            self.metrics.stale_discarded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(run_id = self.id, latest, "Discarding superseded time-series refresh");
            return;
        }

        let (metric_rows, quartile_rows) = match (metric_rows, quartile_rows) {
            (Ok(m), Ok(q)) => (m, q),
            (Err(err), _) | (_, Err(err)) => {
                self.report_failure(&err);
                return;
            }
        };

        let metric = ingest::daily_metric_rows(&metric_rows);
        let quartile = ingest::daily_quartile_rows(&quartile_rows);
        let skipped = metric.warnings.len() + quartile.warnings.len();
        let skipped_notice = (skipped > 0).then(|| {
            tracing::warn!(run_id = self.id, skipped, "Skipped malformed daily rows");
            Notification::new(
                NotificationLevel::Warning,
                format!("{} malformed daily rows were skipped", skipped),
                self.clock.now(),
            )
        });

        let series = aggregate(&self.selection, &metric.value, &quartile.value);
        tracing::info!(
            run_id = self.id,
            days = self.query.range.len(),
            agents = self.selection.agents.len(),
            "Time series refreshed"
        );
        let notify = self.notify_errors;
        self.view.send_modify(|view| {
            view.time_series = series;
            view.time_series_loading = false;
            if let Some(notice) = skipped_notice.filter(|_| notify) {
                push_bounded(&mut view.notifications, notice, MAX_NOTIFICATIONS);
            }
        });
    }

    fn report_failure(&self, err: &FetchError) {
        if !self.notify_errors {
            tracing::warn!(run_id = self.id, error = %err, "Background time-series refresh failed");
            self.view.send_modify(|view| view.time_series_loading = false);
            return;
        }
        tracing::error!(run_id = self.id, error = %err, "Time-series refresh failed");
        let notification = Notification::new(
            NotificationLevel::Error,
            format!("Time series refresh failed: {}", err),
            self.clock.now(),
        )
        .with_action(NotificationAction::Refresh);
        self.view.send_modify(|view| {
            view.time_series_loading = false;
            push_bounded(&mut view.notifications, notification, MAX_NOTIFICATIONS);
        });
    }
}
