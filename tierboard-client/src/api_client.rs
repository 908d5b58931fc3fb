//! REST client for the reporting backend.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tierboard_core::timeseries::DATE_FORMAT;
use tierboard_core::{
    AgentKey, DailyQuery, FetchError, QuartileResponse, QueryBackend, QueryFilter,
    RawDailyMetricRow, RawDailyQuartileRow,
};

pub const QUARTILES_PATH: &str = "/api/v1/quartiles";
pub const DAILY_METRIC_PATH: &str = "/api/v1/daily-metric";
pub const DAILY_QUARTILE_POSITION_PATH: &str = "/api/v1/daily-quartile-position";

/// Connection settings for the reporting backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Response is not JSON (content-type: {0})")]
    NotJson(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) if e.is_timeout() => FetchError::Timeout,
            ClientError::Http(e) if e.is_decode() => FetchError::Decode {
                reason: e.to_string(),
            },
            ClientError::Http(e) => FetchError::Transport {
                reason: e.to_string(),
            },
            ClientError::Serde(e) => FetchError::Decode {
                reason: e.to_string(),
            },
            ClientError::Status { status, message } => FetchError::Http {
                status,
                body: message,
            },
            ClientError::NotJson(content_type) => FetchError::NotJson { content_type },
            ClientError::Config(reason) => FetchError::Transport { reason },
        }
    }
}

/// Error body shape returned by the backend on failures.
#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    message: String,
    #[serde(default)]
    error: Option<String>,
}

/// Query string shared by the three endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub fixed_roster_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<String>,
}

fn join_agents(agents: &[AgentKey]) -> Option<String> {
    if agents.is_empty() {
        return None;
    }
    Some(
        agents
            .iter()
            .map(AgentKey::as_str)
            .collect::<Vec<_>>()
            .join(","),
    )
}

impl From<&QueryFilter> for QueryParams {
    fn from(filter: &QueryFilter) -> Self {
        Self {
            start_date: filter.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
            end_date: filter.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
            fixed_roster_only: filter.fixed_roster_only,
            agents: join_agents(&filter.agents),
        }
    }
}

impl From<&DailyQuery> for QueryParams {
    fn from(query: &DailyQuery) -> Self {
        Self {
            start_date: Some(query.range.start().format(DATE_FORMAT).to_string()),
            end_date: Some(query.range.end().format(DATE_FORMAT).to_string()),
            fixed_roster_only: query.fixed_roster_only,
            agents: join_agents(&query.agents),
        }
    }
}

#[derive(Clone)]
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        if config.api_base_url.trim().is_empty() {
            return Err(ClientError::Config("api_base_url must not be empty".to_string()));
        }
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T>(&self, path: &str, params: &QueryParams) -> Result<T, ClientError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();
        let response = self.client.get(url).query(params).send().await?;
        tracing::debug!(
            path,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Backend request completed"
        );
        self.parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let is_json = content_type.contains("application/json");

        if status.is_success() {
            if !is_json {
                return Err(ClientError::NotJson(content_type));
            }
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let text = response.text().await?;
        let message = match serde_json::from_str::<BackendErrorBody>(&text) {
            Ok(body) => match body.error {
                Some(detail) => format!("{}: {}", body.message, detail),
                None => body.message,
            },
            Err(_) => text,
        };
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl QueryBackend for RestBackend {
    async fn fetch_quartiles(&self, filter: &QueryFilter) -> Result<QuartileResponse, FetchError> {
        Ok(self.get_json(QUARTILES_PATH, &QueryParams::from(filter)).await?)
    }

    async fn fetch_daily_metric(
        &self,
        query: &DailyQuery,
    ) -> Result<Vec<RawDailyMetricRow>, FetchError> {
        Ok(self
            .get_json(DAILY_METRIC_PATH, &QueryParams::from(query))
            .await?)
    }

    async fn fetch_daily_quartile_position(
        &self,
        query: &DailyQuery,
    ) -> Result<Vec<RawDailyQuartileRow>, FetchError> {
        Ok(self
            .get_json(DAILY_QUARTILE_POSITION_PATH, &QueryParams::from(query))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierboard_core::{parse_date, DateRange};

    #[test]
    fn test_params_from_filter() {
        let filter = QueryFilter {
            agents: vec![AgentKey::from("10 - Ana"), AgentKey::from("12")],
            ..QueryFilter::today(parse_date("2025-06-10").unwrap())
        };
        let params = QueryParams::from(&filter);
        assert_eq!(params.start_date.as_deref(), Some("2025-06-10"));
        assert_eq!(params.end_date.as_deref(), Some("2025-06-10"));
        assert!(params.fixed_roster_only);
        assert_eq!(params.agents.as_deref(), Some("10,12"));
    }

    #[test]
    fn test_params_skip_open_range() {
        let params = QueryParams::from(&QueryFilter::default());
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({ "fixedRosterOnly": false }));
    }

    #[test]
    fn test_params_from_daily_query() {
        let query = DailyQuery {
            range: DateRange::parse("2025-06-01", "2025-06-10").unwrap(),
            fixed_roster_only: false,
            agents: Vec::new(),
        };
        let params = QueryParams::from(&query);
        assert_eq!(params.start_date.as_deref(), Some("2025-06-01"));
        assert_eq!(params.end_date.as_deref(), Some("2025-06-10"));
        assert_eq!(params.agents, None);
    }

    #[test]
    fn test_status_maps_to_http_fetch_error() {
        let err: FetchError = ClientError::Status {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(
            err,
            FetchError::Http {
                status: 500,
                body: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_empty_base_url() {
        let config = BackendConfig {
            api_base_url: "  ".to_string(),
            request_timeout_ms: 1_000,
        };
        assert!(matches!(RestBackend::new(&config), Err(ClientError::Config(_))));
    }
}
