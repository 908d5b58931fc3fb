//! Daily series and quartile occupancy over a date range.
//!
//! Every view here is recomputed from scratch whenever the tracked agents or
//! the range change. Missing data is never treated as good data: a day with no
//! row for a tracked agent is booked as [`Quartile::Fourth`] with a zero
//! metric, and still counts as an observed day.

use crate::error::DateRangeError;
use crate::identity::AgentKey;
use crate::quartile::Quartile;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Calendar date format used on the wire.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// Parse `YYYY-MM-DD` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self, DateRangeError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days, both ends included.
    pub fn len(&self) -> u32 {
        let span = (self.end - self.start).num_days();
        u32::try_from(span + 1).unwrap_or(u32::MAX)
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, DateRangeError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| DateRangeError::Parse {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Daily metric total, optionally attributed to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMetricRow {
    pub date: NaiveDate,
    pub agent: Option<AgentKey>,
    pub total: u64,
}

/// Quartile held by one agent on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuartileRow {
    pub date: NaiveDate,
    pub agent_key: AgentKey,
    pub quartile: Quartile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuartilePoint {
    pub date: NaiveDate,
    pub agent_key: AgentKey,
    pub quartile: Quartile,
    pub metric_value: u64,
}

/// Percentage of observed days spent in each quartile.
///
/// Percentages are rounded independently and may not add up to exactly 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyStats {
    pub agent_key: AgentKey,
    pub pct_quartile1: u8,
    pub pct_quartile2: u8,
    pub pct_quartile3: u8,
    pub pct_quartile4: u8,
    pub total_days_observed: u32,
}

impl OccupancyStats {
    pub fn pct(&self, quartile: Quartile) -> u8 {
        match quartile {
            Quartile::First => self.pct_quartile1,
            Quartile::Second => self.pct_quartile2,
            Quartile::Third => self.pct_quartile3,
            Quartile::Fourth => self.pct_quartile4,
        }
    }
}

/// Agents and range the time-series views are computed for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSelection {
    pub range: Option<DateRange>,
    pub agents: BTreeSet<AgentKey>,
}

impl TrackedSelection {
    pub fn new(range: DateRange, agents: impl IntoIterator<Item = AgentKey>) -> Self {
        Self {
            range: Some(range),
            agents: agents.into_iter().filter(|k| !k.is_empty()).collect(),
        }
    }

    /// Views are only computed with a concrete range and at least one agent.
    pub fn is_active(&self) -> bool {
        self.range.is_some() && !self.agents.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesView {
    pub daily_totals: Vec<DailyTotal>,
    pub positions: Vec<DailyQuartilePoint>,
    pub occupancy: BTreeMap<AgentKey, OccupancyStats>,
}

impl TimeSeriesView {
    pub fn is_empty(&self) -> bool {
        self.daily_totals.is_empty() && self.positions.is_empty() && self.occupancy.is_empty()
    }
}

/// Build all views for `selection`. Idle selections yield an empty view.
pub fn aggregate(
    selection: &TrackedSelection,
    metric_rows: &[DailyMetricRow],
    quartile_rows: &[DailyQuartileRow],
) -> TimeSeriesView {
    let Some(range) = selection.range.filter(|_| selection.is_active()) else {
        return TimeSeriesView::default();
    };
    let positions = quartile_position_series(&range, &selection.agents, quartile_rows, metric_rows);
    let occupancy = occupancy_stats(&positions);
    TimeSeriesView {
        daily_totals: daily_metric_series(&range, metric_rows, &selection.agents),
        positions,
        occupancy,
    }
}

/// Per-day metric sum over the tracked agents, or over every row when
/// `tracked` is empty.
pub fn daily_metric_series(
    range: &DateRange,
    rows: &[DailyMetricRow],
    tracked: &BTreeSet<AgentKey>,
) -> Vec<DailyTotal> {
    let mut by_day: BTreeMap<NaiveDate, u64> = range.days().map(|d| (d, 0)).collect();
    for row in rows {
        let counted = tracked.is_empty()
            || row.agent.as_ref().is_some_and(|agent| tracked.contains(agent));
        if !counted {
            continue;
        }
        if let Some(total) = by_day.get_mut(&row.date) {
            *total = total.saturating_add(row.total);
        }
    }
    by_day
        .into_iter()
        .map(|(date, total)| DailyTotal { date, total })
        .collect()
}

/// One point per day per tracked agent, ordered by date then agent.
pub fn quartile_position_series(
    range: &DateRange,
    tracked: &BTreeSet<AgentKey>,
    quartile_rows: &[DailyQuartileRow],
    metric_rows: &[DailyMetricRow],
) -> Vec<DailyQuartilePoint> {
    let mut quartiles: HashMap<(NaiveDate, &AgentKey), Quartile> = HashMap::new();
    for row in quartile_rows {
        if !range.contains(row.date) || !tracked.contains(&row.agent_key) {
            continue;
        }
        quartiles
            .entry((row.date, &row.agent_key))
            .and_modify(|q| {
                if row.quartile.is_better_than(*q) {
                    *q = row.quartile;
                }
            })
            .or_insert(row.quartile);
    }

    let mut metrics: HashMap<(NaiveDate, &AgentKey), u64> = HashMap::new();
    for row in metric_rows {
        let Some(agent) = row.agent.as_ref() else {
            continue;
        };
        if range.contains(row.date) && tracked.contains(agent) {
            let metric = metrics.entry((row.date, agent)).or_insert(0);
            *metric = metric.saturating_add(row.total);
        }
    }

    let mut points = Vec::with_capacity(range.len() as usize * tracked.len());
    for date in range.days() {
        for agent in tracked {
            points.push(DailyQuartilePoint {
                date,
                agent_key: agent.clone(),
                quartile: quartiles
                    .get(&(date, agent))
                    .copied()
                    .unwrap_or(Quartile::Fourth),
                metric_value: metrics.get(&(date, agent)).copied().unwrap_or(0),
            });
        }
    }
    points
}

/// Count days per quartile for every agent present in `points`.
pub fn occupancy_stats(points: &[DailyQuartilePoint]) -> BTreeMap<AgentKey, OccupancyStats> {
    let mut counts: BTreeMap<&AgentKey, [u32; 4]> = BTreeMap::new();
    for point in points {
        counts.entry(&point.agent_key).or_insert([0; 4])[point.quartile.index()] += 1;
    }
    counts
        .into_iter()
        .map(|(agent, days)| {
            let observed: u32 = days.iter().sum();
            let pct = |count: u32| -> u8 {
                if observed == 0 {
                    return 0;
                }
                let rounded = (u64::from(count) * 100 + u64::from(observed) / 2) / u64::from(observed);
                u8::try_from(rounded).unwrap_or(100)
            };
            (
                agent.clone(),
                OccupancyStats {
                    agent_key: agent.clone(),
                    pct_quartile1: pct(days[0]),
                    pct_quartile2: pct(days[1]),
                    pct_quartile3: pct(days[2]),
                    pct_quartile4: pct(days[3]),
                    total_days_observed: observed,
                },
            )
        })
        .collect()
}
