//! Rolling Recent-Reading Cache
//!
//! ## Overview
//!
//! Wraps another store and keeps its newest `capacity` readings in a ring
//! buffer, so repeated "latest N" fetches during scoring skip the round-trip.
//!
//! ## Concurrency
//!
//! The cache is shared mutable state. A single async mutex guards the ring
//! buffer and its refresh time, and it is held across the whole
//! read-modify-write:
//!
//! - a refresh (fetch from the inner store, refill the buffer)
//! - an insert (write through to the inner store, then push)
//!
//! Two concurrent callers therefore never see a half-refilled buffer, and
//! inserts reach the buffer in the same order they reached the store.
//!
//! ## Staleness Bound
//!
//! Cached contents are served for at most `max_staleness` after the last
//! refresh. Writes made through this wrapper keep the buffer current; writes
//! made directly to the inner store become visible after the bound expires.
//!
//! Ascending and range fetches always go to the inner store, as does any
//! request for more readings than the buffer holds.

use chrono::Duration;
use climaguard_core::time::elapsed;
use climaguard_core::{Reading, ReadingBuffer, SystemClock, TimeSource, Timestamp};
use tokio::sync::Mutex;

use crate::{Direction, ReadingSink, ReadingStore, StoreResult};

#[derive(Debug)]
struct CacheState {
    buffer: ReadingBuffer,
    refreshed_at: Option<Timestamp>,
}

/// Single-writer newest-N cache in front of a reading store
pub struct CachedReadingStore<S, T = SystemClock> {
    inner: S,
    clock: T,
    max_staleness: Duration,
    state: Mutex<CacheState>,
}

impl<S: ReadingStore> CachedReadingStore<S, SystemClock> {
    pub fn new(inner: S, capacity: usize, max_staleness: Duration) -> Self {
        Self::with_clock(inner, capacity, max_staleness, SystemClock)
    }
}

impl<S: ReadingStore, T: TimeSource> CachedReadingStore<S, T> {
    pub fn with_clock(inner: S, capacity: usize, max_staleness: Duration, clock: T) -> Self {
        Self {
            inner,
            clock,
            max_staleness,
            state: Mutex::new(CacheState {
                buffer: ReadingBuffer::with_capacity(capacity),
                refreshed_at: None,
            }),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Force the next fetch to go to the inner store
    pub async fn invalidate(&self) {
        self.state.lock().await.refreshed_at = None;
    }

    /// Readings currently held, oldest first
    pub async fn cached(&self) -> Vec<Reading> {
        self.state.lock().await.buffer.iter().copied().collect()
    }

    fn is_fresh(&self, state: &CacheState) -> bool {
        match state.refreshed_at {
            Some(at) => elapsed(at, self.clock.now()) <= self.max_staleness,
            None => false,
        }
    }

    async fn newest(&self, n: usize) -> StoreResult<Vec<Reading>> {
        let mut state = self.state.lock().await;
        let capacity = state.buffer.capacity();

        if n > capacity {
            drop(state);
            log::debug!("Cache bypass: {n} readings requested, capacity {capacity}");
            return self.inner.fetch_latest(n).await;
        }

        if !self.is_fresh(&state) {
            let newest_first = self.inner.fetch_latest(capacity).await?;
            state.buffer.refill(newest_first.into_iter().rev());
            state.refreshed_at = Some(self.clock.now());
            log::debug!("Cache refreshed with {} readings", state.buffer.len());
        }

        Ok(state.buffer.newest(n))
    }
}

#[async_trait::async_trait]
impl<S, T> ReadingStore for CachedReadingStore<S, T>
where
    S: ReadingStore,
    T: TimeSource,
{
    async fn fetch_ordered(&self, limit: usize, direction: Direction) -> StoreResult<Vec<Reading>> {
        match direction {
            Direction::Descending => self.newest(limit).await,
            Direction::Ascending => self.inner.fetch_ordered(limit, direction).await,
        }
    }

    async fn fetch_range(&self, start: Timestamp, end: Timestamp) -> StoreResult<Vec<Reading>> {
        self.inner.fetch_range(start, end).await
    }

    async fn fetch_latest(&self, n: usize) -> StoreResult<Vec<Reading>> {
        self.newest(n).await
    }

    async fn count(&self) -> StoreResult<usize> {
        self.inner.count().await
    }
}

#[async_trait::async_trait]
impl<S, T> ReadingSink for CachedReadingStore<S, T>
where
    S: ReadingStore + ReadingSink,
    T: TimeSource,
{
    async fn insert(&self, reading: Reading) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        self.inner.insert(reading).await?;

        let in_order = state
            .buffer
            .last()
            .map_or(true, |last| reading.timestamp >= last.timestamp);

        if in_order {
            state.buffer.push(reading);
        } else {
            // Late arrival: position unknown without a refetch
            state.refreshed_at = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use chrono::{TimeZone, Utc};
    use climaguard_core::time::FixedTime;
    use std::sync::Arc;

    fn at(minutes: i64, temperature: f64) -> Reading {
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Reading::new(temperature, 50.0, base + Duration::minutes(minutes))
    }

    fn cache(
        inner: Arc<MemoryStore>,
        capacity: usize,
    ) -> (CachedReadingStore<Arc<MemoryStore>, Arc<FixedTime>>, Arc<FixedTime>) {
        let clock = Arc::new(FixedTime::new(at(0, 0.0).timestamp));
        let store = CachedReadingStore::with_clock(inner, capacity, Duration::minutes(5), clock.clone());
        (store, clock)
    }

    fn temps(readings: &[Reading]) -> Vec<f64> {
        readings.iter().map(|r| r.temperature).collect()
    }

    #[tokio::test]
    async fn serves_newest_first_from_buffer() {
        let inner = Arc::new(MemoryStore::with_readings((0..10).map(|i| at(i, i as f64))));
        let (store, _) = cache(inner, 4);

        assert_eq!(temps(&store.fetch_latest(3).await.unwrap()), vec![9.0, 8.0, 7.0]);
        assert_eq!(temps(&store.cached().await), vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[tokio::test]
    async fn direct_writes_visible_after_staleness_bound() {
        let inner = Arc::new(MemoryStore::with_readings((0..3).map(|i| at(i, i as f64))));
        let (store, clock) = cache(inner.clone(), 4);

        assert_eq!(store.fetch_latest(1).await.unwrap()[0].temperature, 2.0);

        // Bypasses the wrapper
        inner.insert(at(3, 3.0)).await.unwrap();
        assert_eq!(store.fetch_latest(1).await.unwrap()[0].temperature, 2.0);

        clock.advance(Duration::minutes(6));
        assert_eq!(store.fetch_latest(1).await.unwrap()[0].temperature, 3.0);
    }

    #[tokio::test]
    async fn writes_through_wrapper_are_immediate() {
        let inner = Arc::new(MemoryStore::with_readings((0..3).map(|i| at(i, i as f64))));
        let (store, _) = cache(inner.clone(), 4);
        store.fetch_latest(1).await.unwrap();

        store.insert(at(3, 3.0)).await.unwrap();
        assert_eq!(store.fetch_latest(1).await.unwrap()[0].temperature, 3.0);
        assert_eq!(inner.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn late_insert_invalidates() {
        let inner = Arc::new(MemoryStore::with_readings([at(0, 0.0), at(10, 10.0)]));
        let (store, _) = cache(inner, 4);
        store.fetch_latest(2).await.unwrap();

        store.insert(at(5, 5.0)).await.unwrap();
        assert_eq!(temps(&store.fetch_latest(3).await.unwrap()), vec![10.0, 5.0, 0.0]);
    }

    #[tokio::test]
    async fn oversized_request_bypasses_cache() {
        let inner = Arc::new(MemoryStore::with_readings((0..10).map(|i| at(i, i as f64))));
        let (store, _) = cache(inner, 2);
        assert_eq!(store.fetch_latest(5).await.unwrap().len(), 5);
        assert!(store.cached().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_inserts_keep_store_order() {
        let inner = Arc::new(MemoryStore::new());
        let (store, _) = cache(inner.clone(), 64);
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(at(i, i as f64)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        store.invalidate().await;
        let fresh = store.fetch_latest(32).await.unwrap();
        assert_eq!(fresh.len(), 32);
        assert!(fresh.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
    }
}
