//! Tierboard Client
//!
//! [`QueryBackend`](tierboard_core::QueryBackend) implementations: a REST
//! client for the reporting API and an optional TTL cache wrapper.

pub mod api_client;
pub mod cache;

pub use api_client::{BackendConfig, ClientError, QueryParams, RestBackend};
pub use cache::{CacheStats, CachedBackend};
