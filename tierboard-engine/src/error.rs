//! Error types for the engine.

use crate::config::ConfigError;
use crate::state::RunId;
use tierboard_client::ClientError;
use tierboard_core::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("Telemetry error: {0}")]
    Telemetry(String),
    #[error("Scheduler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a pipeline run did not commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Run {run_id} superseded by run {latest}")]
    Stale { run_id: RunId, latest: RunId },
}
