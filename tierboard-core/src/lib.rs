//! Tierboard Core
//!
//! Quartile ranking and movement reconciliation for agent performance
//! dashboards. This crate is synchronous and I/O free apart from the
//! [`QueryBackend`] trait, which the client crate implements.

pub mod backend;
pub mod classifier;
pub mod differ;
pub mod error;
pub mod filter;
pub mod identity;
pub mod ingest;
pub mod quartile;
pub mod record;
pub mod signal;
pub mod snapshot;
pub mod timeseries;

pub use backend::{
    QuartileResponse, QueryBackend, RawDailyMetricRow, RawDailyQuartileRow, RawMetricRow,
};
pub use classifier::{classify, classify_with_roster, label_by_cumulative_share, rank_order};
pub use differ::{diff, MovementDescriptor, MovementMap, MovementSummary};
pub use error::{DateRangeError, FetchError, IngestWarning, RowSource};
pub use filter::{DailyQuery, QueryFilter};
pub use identity::{display_name, new_snapshot_id, normalize, AgentKey, SnapshotId, Timestamp};
pub use ingest::Ingested;
pub use quartile::{Quartile, QuartileParseError};
pub use record::{LabeledRecord, MetricRecord};
pub use signal::{AnimationSignal, HighlightKey};
pub use snapshot::{ClassificationSnapshot, QuartileStats};
pub use timeseries::{
    aggregate, daily_metric_series, occupancy_stats, parse_date, quartile_position_series,
    DailyMetricRow, DailyQuartilePoint, DailyQuartileRow, DailyTotal, DateRange,
    OccupancyStats, TimeSeriesView, TrackedSelection,
};
