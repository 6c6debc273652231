//! In-memory reading store
//!
//! Keeps readings sorted by timestamp in a `Vec` behind an async `RwLock`.
//! Equal timestamps keep insertion order.

use climaguard_core::{Reading, Timestamp};
use tokio::sync::RwLock;

use crate::{check_range, Direction, ReadingSink, ReadingStore, StoreResult};

/// Process-local store for tests, demos and single-node deployments
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<Reading>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `readings` in any order
    pub fn with_readings<I>(readings: I) -> Self
    where
        I: IntoIterator<Item = Reading>,
    {
        let mut all: Vec<Reading> = readings.into_iter().collect();
        all.sort_by_key(|r| r.timestamp);
        Self {
            readings: RwLock::new(all),
        }
    }

    /// Remove every reading
    pub async fn clear(&self) {
        self.readings.write().await.clear();
    }
}

#[async_trait::async_trait]
impl ReadingStore for MemoryStore {
    async fn fetch_ordered(&self, limit: usize, direction: Direction) -> StoreResult<Vec<Reading>> {
        let readings = self.readings.read().await;
        let out = match direction {
            Direction::Ascending => readings.iter().take(limit).copied().collect(),
            Direction::Descending => readings.iter().rev().take(limit).copied().collect(),
        };
        Ok(out)
    }

    async fn fetch_range(&self, start: Timestamp, end: Timestamp) -> StoreResult<Vec<Reading>> {
        check_range(start, end)?;
        let readings = self.readings.read().await;
        let from = readings.partition_point(|r| r.timestamp < start);
        let to = readings.partition_point(|r| r.timestamp <= end);
        Ok(readings[from..to].to_vec())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.readings.read().await.len())
    }
}

#[async_trait::async_trait]
impl ReadingSink for MemoryStore {
    async fn insert(&self, reading: Reading) -> StoreResult<()> {
        let mut readings = self.readings.write().await;
        let at = readings.partition_point(|r| r.timestamp <= reading.timestamp);
        readings.insert(at, reading);
        Ok(())
    }
}
