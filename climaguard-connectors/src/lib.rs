//! Reading Store Connectors
//!
//! ## Overview
//!
//! The scoring pipeline never owns readings. It asks a store for history and
//! scores against whatever comes back. This crate defines that contract and
//! ships three implementations:
//!
//! | Store                | Use                                              |
//! |----------------------|--------------------------------------------------|
//! | `MemoryStore`        | tests, demos, single-process deployments          |
//! | `CachedReadingStore` | rolling newest-N cache in front of another store  |
//! | `HttpReadingStore`   | the upstream measurements REST API (`http`)       |
//!
//! ## Store Contract
//!
//! - `fetch_ordered(limit, direction)`: at most `limit` readings, ordered by
//!   timestamp in `direction`
//! - `fetch_range(start, end)`: every reading with `start <= ts <= end`,
//!   ascending
//! - `fetch_latest(n)`: the newest `n`, newest first
//!
//! Every call is a suspension point. Failures are reported as `StoreError`;
//! the detector decides whether to degrade or propagate.
//!
//! ## Retry Logic
//!
//! Network-backed stores retry transient failures with exponential backoff:
//! ```text
//! retry_delay = base * 2^attempt
//! ```
//! Client errors (4xx except 429) are never retried.
//!
//! ## Example Usage
//!
//! ```rust
//! use climaguard_connectors::{MemoryStore, ReadingSink, ReadingStore};
//! use climaguard_core::Reading;
//! use chrono::Utc;
//!
//! # async fn example() -> Result<(), climaguard_connectors::StoreError> {
//! let store = MemoryStore::new();
//! store.insert(Reading::new(21.5, 48.0, Utc::now())).await?;
//!
//! let latest = store.fetch_latest(1).await?;
//! assert_eq!(latest.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod cached;
pub mod memory;
pub mod query;

#[cfg(feature = "http")]
pub mod http;

// Re-export common types
pub use cached::CachedReadingStore;
pub use memory::MemoryStore;
pub use query::{list_measurements, MeasurementPage, MeasurementQuery};

#[cfg(feature = "http")]
pub use http::{HttpReadingStore, HttpStoreConfig};

use climaguard_core::{Reading, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Common store errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store request timed out")]
    Timeout,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Timestamp ordering of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Oldest first
    Ascending,
    /// Newest first
    Descending,
}

/// Read side of a reading store
#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    /// At most `limit` readings ordered by timestamp
    async fn fetch_ordered(&self, limit: usize, direction: Direction) -> StoreResult<Vec<Reading>>;

    /// All readings with `start <= timestamp <= end`, ascending
    async fn fetch_range(&self, start: Timestamp, end: Timestamp) -> StoreResult<Vec<Reading>>;

    /// The newest `n` readings, newest first
    async fn fetch_latest(&self, n: usize) -> StoreResult<Vec<Reading>> {
        self.fetch_ordered(n, Direction::Descending).await
    }

    /// Number of stored readings
    async fn count(&self) -> StoreResult<usize>;
}

/// Write side of a reading store
#[async_trait::async_trait]
pub trait ReadingSink: Send + Sync {
    /// Persist one reading
    async fn insert(&self, reading: Reading) -> StoreResult<()>;
}

#[async_trait::async_trait]
impl<S: ReadingStore + ?Sized> ReadingStore for std::sync::Arc<S> {
    async fn fetch_ordered(&self, limit: usize, direction: Direction) -> StoreResult<Vec<Reading>> {
        (**self).fetch_ordered(limit, direction).await
    }

    async fn fetch_range(&self, start: Timestamp, end: Timestamp) -> StoreResult<Vec<Reading>> {
        (**self).fetch_range(start, end).await
    }

    async fn fetch_latest(&self, n: usize) -> StoreResult<Vec<Reading>> {
        (**self).fetch_latest(n).await
    }

    async fn count(&self) -> StoreResult<usize> {
        (**self).count().await
    }
}

#[async_trait::async_trait]
impl<S: ReadingSink + ?Sized> ReadingSink for std::sync::Arc<S> {
    async fn insert(&self, reading: Reading) -> StoreResult<()> {
        (**self).insert(reading).await
    }
}

/// Reject an inverted range before it reaches a backend
pub(crate) fn check_range(start: Timestamp, end: Timestamp) -> StoreResult<()> {
    if start > end {
        return Err(StoreError::InvalidQuery(format!("start {start} is after end {end}")));
    }
    Ok(())
}
