//! Query backend contract
//!
//! The backend returns pre-aggregated rows. Row shapes are loose on purpose:
//! agents may come as `"id"` or `"id - name"`, metrics as numbers or numeric
//! strings, and fields may be missing. [`crate::ingest`] turns these rows into
//! typed records and reports what it had to skip.

use crate::error::FetchError;
use crate::filter::{DailyQuery, QueryFilter};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One agent row inside a quartile bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetricRow {
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default, alias = "total")]
    pub metric: Option<serde_json::Value>,
}

impl RawMetricRow {
    pub fn new(agent: &str, metric: u64) -> Self {
        Self {
            agent: Some(agent.to_string()),
            metric: Some(metric.into()),
        }
    }
}

/// Quartile query response: four labeled buckets plus backend totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuartileResponse {
    #[serde(default)]
    pub quartile1: Vec<RawMetricRow>,
    #[serde(default)]
    pub quartile2: Vec<RawMetricRow>,
    #[serde(default)]
    pub quartile3: Vec<RawMetricRow>,
    #[serde(default)]
    pub quartile4: Vec<RawMetricRow>,
    /// Backend-side totals, passed through for display only. Totals shown by
    /// the dashboard are always recomputed from the rows.
    #[serde(default)]
    pub totals: Option<serde_json::Value>,
}

impl QuartileResponse {
    pub fn buckets(&self) -> [&[RawMetricRow]; 4] {
        [
            &self.quartile1,
            &self.quartile2,
            &self.quartile3,
            &self.quartile4,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDailyMetricRow {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub total: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDailyQuartileRow {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub quartile: Option<serde_json::Value>,
}

/// Read-only, idempotent access to the reporting backend.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn fetch_quartiles(&self, filter: &QueryFilter) -> Result<QuartileResponse, FetchError>;

    async fn fetch_daily_metric(
        &self,
        query: &DailyQuery,
    ) -> Result<Vec<RawDailyMetricRow>, FetchError>;

    async fn fetch_daily_quartile_position(
        &self,
        query: &DailyQuery,
    ) -> Result<Vec<RawDailyQuartileRow>, FetchError>;
}

#[async_trait]
impl<B: QueryBackend + ?Sized> QueryBackend for Arc<B> {
    async fn fetch_quartiles(&self, filter: &QueryFilter) -> Result<QuartileResponse, FetchError> {
        (**self).fetch_quartiles(filter).await
    }

    async fn fetch_daily_metric(
        &self,
        query: &DailyQuery,
    ) -> Result<Vec<RawDailyMetricRow>, FetchError> {
        (**self).fetch_daily_metric(query).await
    }

    async fn fetch_daily_quartile_position(
        &self,
        query: &DailyQuery,
    ) -> Result<Vec<RawDailyQuartileRow>, FetchError> {
        (**self).fetch_daily_quartile_position(query).await
    }
}
