//! Engine defaults.

// ============================================================================
// SCHEDULER
// ============================================================================

/// Default polling interval (2 minutes).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 120_000;

/// Default interval of the forced reset to today (30 minutes).
pub const DEFAULT_RESET_INTERVAL_MS: u64 = 1_800_000;

/// Capacity of the trigger channel feeding the scheduler.
pub const TRIGGER_CHANNEL_CAPACITY: usize = 32;

// ============================================================================
// DASHBOARD VIEW
// ============================================================================

/// Oldest notifications are dropped past this many.
pub const MAX_NOTIFICATIONS: usize = 20;

// ============================================================================
// CACHE
// ============================================================================

/// How often expired response-cache entries are swept.
pub const CACHE_PURGE_INTERVAL_MS: u64 = 300_000;

// ============================================================================
// LOGGING
// ============================================================================

pub const DEFAULT_LOG_FILTER: &str = "tierboard=info,tierboard_engine=info,tierboard_client=info";

/// Largest accepted UTC offset, in minutes (UTC+14).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;
