//! Cached, coalescing log retrieval for logtrail
//!
//! This crate provides the TTL cache, the fetch coordinator with retry and
//! fallback behavior, and the embedded fallback dataset.

mod cache;
mod client;
mod config;
mod fallback;

pub use cache::CacheService;
pub use client::{HttpTransport, LogClient, Transport};
pub use config::{
    DEFAULT_CACHE_TTL, DEFAULT_RETRIES, DEFAULT_RETRY_BASE_DELAY, DEFAULT_SWEEP_INTERVAL,
    DEFAULT_TIMEOUT, FetchConfig,
};
pub use fallback::fallback_records;

// Re-export types used in our public API
pub use logtrail_types::{DegradeReason, FetchError, LogsOutcome, QueryParams};
