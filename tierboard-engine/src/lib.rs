//! Tierboard Engine
//!
//! Owns the dashboard state: the refresh scheduler, the classification
//! pipeline, and the read-only [`DashboardView`](state::DashboardView)
//! published to observers.

pub mod clock;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod notifications;
pub mod pipeline;
pub mod render;
pub mod scheduler;
pub mod state;
pub mod telemetry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, EngineConfig, LabelingMode};
pub use error::{EngineError, PipelineError};
pub use pipeline::{Pipeline, PipelineSettings, RunReport};
pub use scheduler::{scheduler_task, SchedulerConfig, SchedulerMetrics, SchedulerSnapshot};
pub use state::{DashboardView, FilterChange, RunId, Trigger, TriggerKind};
