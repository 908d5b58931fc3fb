//! Dashboard state shared between the pipeline and its observers.

use crate::notifications::Notification;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tierboard_core::{
    AgentKey, ClassificationSnapshot, DateRange, HighlightKey, IngestWarning, MovementMap,
    MovementSummary, QueryFilter, TimeSeriesView, TrackedSelection,
};

/// Monotonic tag for pipeline and time-series runs. Higher is newer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Initial,
    Manual,
    Poll,
    Reset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingState {
    #[default]
    Idle,
    /// Blocks interaction until the run finishes.
    Blocking,
    /// Small non-blocking indicator.
    Indicator,
}

/// How loudly a run reports progress and failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verbosity {
    pub loading: LoadingState,
    pub notify_errors: bool,
}

impl TriggerKind {
    pub fn verbosity(self) -> Verbosity {
        match self {
            TriggerKind::Initial | TriggerKind::Manual => Verbosity {
                loading: LoadingState::Blocking,
                notify_errors: true,
            },
            TriggerKind::Reset => Verbosity {
                loading: LoadingState::Indicator,
                notify_errors: true,
            },
            TriggerKind::Poll => Verbosity {
                loading: LoadingState::Idle,
                notify_errors: false,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::Initial => "initial",
            TriggerKind::Manual => "manual",
            TriggerKind::Poll => "poll",
            TriggerKind::Reset => "reset",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One edit to the dashboard filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterChange {
    /// Today only, fixed roster only, no agent subset.
    ResetToToday,
    /// Today only; other settings kept.
    Today,
    Range { range: DateRange },
    FixedRosterOnly { enabled: bool },
    /// Restrict the quartile query to these agents; empty means everyone.
    AgentSubset { agents: Vec<AgentKey> },
    Track { agents: Vec<AgentKey> },
    Untrack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub changes: Vec<FilterChange>,
}

impl Trigger {
    pub fn initial() -> Self {
        Self {
            kind: TriggerKind::Initial,
            changes: vec![FilterChange::ResetToToday],
        }
    }

    pub fn manual(changes: Vec<FilterChange>) -> Self {
        Self {
            kind: TriggerKind::Manual,
            changes,
        }
    }

    pub fn refresh() -> Self {
        Self::manual(Vec::new())
    }

    pub fn poll() -> Self {
        Self {
            kind: TriggerKind::Poll,
            changes: Vec::new(),
        }
    }

    pub fn reset() -> Self {
        Self {
            kind: TriggerKind::Reset,
            changes: vec![FilterChange::ResetToToday],
        }
    }
}

/// Fold pending triggers into one: the last kind wins and every filter change
/// is applied in arrival order.
pub fn coalesce(pending: Vec<Trigger>) -> Option<Trigger> {
    let kind = pending.last()?.kind;
    let changes = pending.into_iter().flat_map(|t| t.changes).collect();
    Some(Trigger { kind, changes })
}

/// Active quartile filter plus the tracked-agent set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardFilter {
    pub query: QueryFilter,
    pub tracked: BTreeSet<AgentKey>,
}

impl DashboardFilter {
    pub fn apply(&mut self, change: &FilterChange, today: NaiveDate) {
        match change {
            FilterChange::ResetToToday => self.query = QueryFilter::today(today),
            FilterChange::Today => self.query.set_range(DateRange::single(today)),
            FilterChange::Range { range } => self.query.set_range(*range),
            FilterChange::FixedRosterOnly { enabled } => self.query.fixed_roster_only = *enabled,
            FilterChange::AgentSubset { agents } => self.query.set_agents(agents),
            FilterChange::Track { agents } => {
                self.tracked = agents.iter().filter(|k| !k.is_empty()).cloned().collect();
            }
            FilterChange::Untrack => self.tracked.clear(),
        }
    }

    pub fn selection(&self) -> TrackedSelection {
        TrackedSelection {
            range: self.query.range(),
            agents: self.tracked.clone(),
        }
    }
}

/// The displayed snapshot and the one before it.
#[derive(Debug, Clone, Default)]
pub struct SnapshotPair {
    current: Option<ClassificationSnapshot>,
    previous: Option<ClassificationSnapshot>,
}

impl SnapshotPair {
    pub fn current(&self) -> Option<&ClassificationSnapshot> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&ClassificationSnapshot> {
        self.previous.as_ref()
    }

    /// Make `next` current; the old current becomes previous.
    pub fn advance(&mut self, next: ClassificationSnapshot) {
        self.previous = self.current.replace(next);
    }
}

/// Informational strip shown above the board. Never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Banner {
    NoData,
    SkippedRows { count: usize },
}

impl Banner {
    pub fn from_warnings(warnings: &[IngestWarning]) -> Option<Self> {
        if warnings.contains(&IngestWarning::EmptyPopulation) {
            return Some(Banner::NoData);
        }
        let skipped = warnings
            .iter()
            .filter(|w| matches!(w, IngestWarning::MalformedRecord { .. }))
            .count();
        (skipped > 0).then_some(Banner::SkippedRows { count: skipped })
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Banner::NoData => f.write_str("No agents match the current filters"),
            Banner::SkippedRows { count } => write!(f, "{} malformed rows were skipped", count),
        }
    }
}

/// Read-only view published to observers after every change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardView {
    pub snapshot: Option<ClassificationSnapshot>,
    pub movements: MovementMap,
    pub summary: MovementSummary,
    pub generation: u64,
    pub highlights: Vec<HighlightKey>,
    pub time_series: TimeSeriesView,
    pub time_series_loading: bool,
    pub banner: Option<Banner>,
    pub notifications: Vec<Notification>,
    pub loading: LoadingState,
    pub filter: DashboardFilter,
    pub last_run: Option<RunId>,
}
