//! Tierboard Test Utilities
//!
//! Shared test infrastructure for the tierboard workspace:
//! - A scripted [`QueryBackend`] with queued responses and delays
//! - Proptest generators for agent refs, rows and snapshots
//! - Fixtures for common dashboard scenarios

pub use tierboard_core::{
    AgentKey, ClassificationSnapshot, DailyQuery, FetchError, LabeledRecord, MetricRecord,
    Quartile, QuartileResponse, QueryBackend, QueryFilter, RawDailyMetricRow,
    RawDailyQuartileRow, RawMetricRow, Timestamp,
};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// SCRIPTED BACKEND
// ============================================================================

struct Step<T> {
    result: Result<T, FetchError>,
    delay: Duration,
}

struct Script<T> {
    queue: Mutex<VecDeque<Step<T>>>,
    fallback: Mutex<Option<Result<T, FetchError>>>,
    calls: AtomicUsize,
}

impl<T: Clone + Default> Script<T> {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    fn push(&self, result: Result<T, FetchError>, delay: Duration) {
        self.queue.lock().unwrap().push_back(Step { result, delay });
    }

    /// Next queued step, else the fallback, else `T::default()`.
    fn next(&self) -> Step<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(step) = self.queue.lock().unwrap().pop_front() {
            return step;
        }
        let result = self
            .fallback
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(T::default()));
        Step {
            result,
            delay: Duration::ZERO,
        }
    }
}

struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, high_water: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        high_water.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory backend that replays queued responses.
///
/// Each endpoint has its own queue. An empty queue falls back to the value set
/// with `set_*_fallback`, or to an empty response. Every call is counted and
/// concurrent calls are tracked so tests can assert on overlap.
pub struct ScriptedBackend {
    quartiles: Script<QuartileResponse>,
    daily_metric: Script<Vec<RawDailyMetricRow>>,
    daily_quartile: Script<Vec<RawDailyQuartileRow>>,
    filters: Mutex<Vec<QueryFilter>>,
    daily_queries: Mutex<Vec<DailyQuery>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            quartiles: Script::new(),
            daily_metric: Script::new(),
            daily_quartile: Script::new(),
            filters: Mutex::new(Vec::new()),
            daily_queries: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn push_quartiles(&self, result: Result<QuartileResponse, FetchError>) {
        self.quartiles.push(result, Duration::ZERO);
    }

    pub fn push_quartiles_delayed(
        &self,
        result: Result<QuartileResponse, FetchError>,
        delay: Duration,
    ) {
        self.quartiles.push(result, delay);
    }

    pub fn set_quartiles_fallback(&self, result: Result<QuartileResponse, FetchError>) {
        *self.quartiles.fallback.lock().unwrap() = Some(result);
    }

    pub fn push_daily_metric(&self, result: Result<Vec<RawDailyMetricRow>, FetchError>) {
        self.daily_metric.push(result, Duration::ZERO);
    }

    pub fn push_daily_metric_delayed(
        &self,
        result: Result<Vec<RawDailyMetricRow>, FetchError>,
        delay: Duration,
    ) {
        self.daily_metric.push(result, delay);
    }

    pub fn set_daily_metric_fallback(&self, result: Result<Vec<RawDailyMetricRow>, FetchError>) {
        *self.daily_metric.fallback.lock().unwrap() = Some(result);
    }

    pub fn push_daily_quartile_position(
        &self,
        result: Result<Vec<RawDailyQuartileRow>, FetchError>,
    ) {
        self.daily_quartile.push(result, Duration::ZERO);
    }

    pub fn set_daily_quartile_position_fallback(
        &self,
        result: Result<Vec<RawDailyQuartileRow>, FetchError>,
    ) {
        *self.daily_quartile.fallback.lock().unwrap() = Some(result);
    }

    pub fn quartile_calls(&self) -> usize {
        self.quartiles.calls.load(Ordering::SeqCst)
    }

    pub fn daily_metric_calls(&self) -> usize {
        self.daily_metric.calls.load(Ordering::SeqCst)
    }

    pub fn daily_quartile_position_calls(&self) -> usize {
        self.daily_quartile.calls.load(Ordering::SeqCst)
    }

    /// Filters received by `fetch_quartiles`, in call order.
    pub fn filters(&self) -> Vec<QueryFilter> {
        self.filters.lock().unwrap().clone()
    }

    pub fn last_filter(&self) -> Option<QueryFilter> {
        self.filters.lock().unwrap().last().cloned()
    }

    pub fn daily_queries(&self) -> Vec<DailyQuery> {
        self.daily_queries.lock().unwrap().clone()
    }

    /// Highest number of requests observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn run<T>(&self, step: Step<T>) -> Result<T, FetchError> {
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.result
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryBackend for ScriptedBackend {
    async fn fetch_quartiles(&self, filter: &QueryFilter) -> Result<QuartileResponse, FetchError> {
        self.filters.lock().unwrap().push(filter.clone());
        let step = self.quartiles.next();
        self.run(step).await
    }

    async fn fetch_daily_metric(
        &self,
        query: &DailyQuery,
    ) -> Result<Vec<RawDailyMetricRow>, FetchError> {
        self.daily_queries.lock().unwrap().push(query.clone());
        let step = self.daily_metric.next();
        self.run(step).await
    }

    async fn fetch_daily_quartile_position(
        &self,
        query: &DailyQuery,
    ) -> Result<Vec<RawDailyQuartileRow>, FetchError> {
        let step = self.daily_quartile.next();
        self.run(step).await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for tierboard types.

    use super::*;
    use proptest::prelude::*;

    /// Agent id with an optional display suffix, e.g. `"42"` or `"42 - Ana"`.
    pub fn arb_agent_ref() -> impl Strategy<Value = String> {
        (1u32..500, proptest::option::of("[A-Z][a-z]{2,8}")).prop_map(|(id, name)| match name {
            Some(name) => format!("{} - {}", id, name),
            None => id.to_string(),
        })
    }

    pub fn arb_quartile() -> impl Strategy<Value = Quartile> {
        prop_oneof![
            Just(Quartile::First),
            Just(Quartile::Second),
            Just(Quartile::Third),
            Just(Quartile::Fourth),
        ]
    }

    pub fn arb_metric() -> impl Strategy<Value = u64> {
        prop_oneof![1 => Just(0u64), 4 => 0u64..10_000]
    }

    pub fn arb_labeled_record() -> impl Strategy<Value = LabeledRecord> {
        (arb_agent_ref(), arb_metric(), arb_quartile())
            .prop_map(|(agent, metric, q)| LabeledRecord::new(&agent, metric, q))
    }

    /// Labeled rows with unique agent ids.
    pub fn arb_population(max: usize) -> impl Strategy<Value = Vec<LabeledRecord>> {
        proptest::collection::btree_map(1u32..500, (arb_metric(), arb_quartile()), 0..max)
            .prop_map(|rows| {
                rows.into_iter()
                    .map(|(id, (metric, q))| LabeledRecord::new(&id.to_string(), metric, q))
                    .collect()
            })
    }

    pub fn arb_snapshot(max: usize) -> impl Strategy<Value = ClassificationSnapshot> {
        arb_population(max).prop_map(|rows| tierboard_core::classify(rows, fixtures::epoch()))
    }

    /// A backend response with the given population split into its buckets.
    pub fn arb_quartile_response(max: usize) -> impl Strategy<Value = QuartileResponse> {
        arb_population(max).prop_map(|rows| fixtures::response_from(&rows))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built responses and snapshots.

    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    pub fn epoch() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn day(value: &str) -> NaiveDate {
        tierboard_core::parse_date(value).unwrap()
    }

    /// Rebuild a backend response from labeled rows.
    pub fn response_from(rows: &[LabeledRecord]) -> QuartileResponse {
        let mut response = QuartileResponse::default();
        for row in rows {
            let raw = RawMetricRow::new(&row.record.agent_display, row.record.metric_value);
            match row.quartile {
                Quartile::First => response.quartile1.push(raw),
                Quartile::Second => response.quartile2.push(raw),
                Quartile::Third => response.quartile3.push(raw),
                Quartile::Fourth => response.quartile4.push(raw),
            }
        }
        response
    }

    /// Fixed-roster view for 2025-06-10: two agents in Q1 (100 and 80) and one
    /// idle agent in Q4.
    pub fn june_tenth_response() -> QuartileResponse {
        QuartileResponse {
            quartile1: vec![
                RawMetricRow::new("10 - Ana", 100),
                RawMetricRow::new("11 - Bia", 80),
            ],
            quartile4: vec![RawMetricRow::new("12 - Caio", 0)],
            ..QuartileResponse::default()
        }
    }

    /// Build a response from `(agent_ref, metric, quartile ordinal)` triples.
    pub fn response(rows: &[(&str, u64, u8)]) -> QuartileResponse {
        let labeled: Vec<LabeledRecord> = rows
            .iter()
            .map(|(agent, metric, q)| {
                let quartile = Quartile::from_ordinal(i64::from(*q)).unwrap();
                LabeledRecord::new(agent, *metric, quartile)
            })
            .collect();
        response_from(&labeled)
    }

    pub fn snapshot(rows: &[(&str, u64, u8)]) -> ClassificationSnapshot {
        let labeled: Vec<LabeledRecord> = rows
            .iter()
            .map(|(agent, metric, q)| {
                LabeledRecord::new(agent, *metric, Quartile::from_ordinal(i64::from(*q)).unwrap())
            })
            .collect();
        tierboard_core::classify(labeled, epoch())
    }

    pub fn daily_metric_row(date: &str, agent: Option<&str>, total: u64) -> RawDailyMetricRow {
        RawDailyMetricRow {
            date: Some(date.to_string()),
            agent: agent.map(str::to_string),
            total: Some(serde_json::Value::from(total)),
        }
    }

    pub fn daily_quartile_row(date: &str, agent: &str, quartile: u8) -> RawDailyQuartileRow {
        RawDailyQuartileRow {
            date: Some(date.to_string()),
            agent: Some(agent.to_string()),
            quartile: Some(serde_json::Value::from(quartile)),
        }
    }
}
