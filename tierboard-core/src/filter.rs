//! Query filters shared by the backend contract and the engine.

use crate::identity::AgentKey;
use crate::timeseries::DateRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Filter for the quartile query.
///
/// Dates are optional on the wire: with no range the backend ranks over all
/// recorded history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub fixed_roster_only: bool,
    /// Optional agent subset; empty means the whole population.
    #[serde(default)]
    pub agents: Vec<AgentKey>,
}

impl QueryFilter {
    /// The known-good default view: today, fixed roster only.
    pub fn today(day: NaiveDate) -> Self {
        Self {
            start_date: Some(day),
            end_date: Some(day),
            fixed_roster_only: true,
            agents: Vec::new(),
        }
    }

    pub fn set_range(&mut self, range: DateRange) {
        self.start_date = Some(range.start());
        self.end_date = Some(range.end());
    }

    /// Restrict the query to `agents`; an empty list means everyone.
    pub fn set_agents(&mut self, agents: &[AgentKey]) {
        let mut agents: Vec<AgentKey> = agents.iter().filter(|k| !k.is_empty()).cloned().collect();
        agents.sort();
        agents.dedup();
        self.agents = agents;
    }

    /// Concrete range, when both bounds are set and ordered.
    pub fn range(&self) -> Option<DateRange> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => DateRange::new(start, end).ok(),
            _ => None,
        }
    }
}

/// Filter for the two daily queries, which always need a concrete range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuery {
    pub range: DateRange,
    pub fixed_roster_only: bool,
    pub agents: Vec<AgentKey>,
}
