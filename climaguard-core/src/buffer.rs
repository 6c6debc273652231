//! Circular Buffer for Recent-Reading History
//!
//! ## Overview
//!
//! A ring buffer holding the most recent readings in chronological order. It
//! backs the optional rolling cache in front of the reading store: the newest
//! `capacity` readings stay in memory so a scoring call can assemble its window
//! without a store round-trip.
//!
//! ## Design Rationale
//!
//! ### Why a Circular Buffer?
//!
//! Window assembly needs the last `L - 1` readings, newest last. A ring buffer
//! gives that with fixed memory:
//! - O(1) insertion (overwrites oldest when full)
//! - O(1) access to the most recent reading
//! - O(n) iteration from oldest to newest
//!
//! The capacity is chosen at runtime because `L` is a configuration value,
//! unlike a sensor history whose depth can be fixed at compile time.
//!
//! ### Memory Layout
//!
//! ```text
//! ReadingBuffer with capacity 5, after 7 pushes:
//! ┌─────┬─────┬─────┬─────┬─────┐
//! │  F  │  G  │  C  │  D  │  E  │  ← physical slots
//! └─────┴─────┴─────┴─────┴─────┘
//!             ↑
//!             └── write_pos = 2 (oldest reading lives here)
//!
//! Logical view: [C, D, E, F, G]
//! ```
//!
//! ## Thread Safety
//!
//! This type is not thread-safe. The rolling cache owns one behind a mutex and
//! is the only writer.

use crate::reading::Reading;

/// Fixed-capacity circular buffer for time-ordered readings
///
/// ## Internal Invariants
///
/// - `write_pos < capacity`
/// - `len <= capacity`
/// - Iteration yields readings in insertion order, oldest first
#[derive(Debug, Clone)]
pub struct ReadingBuffer {
    /// Storage; `None` marks a slot never written
    data: Vec<Option<Reading>>,

    /// Index where the next write will occur
    write_pos: usize,

    /// Current number of valid readings
    len: usize,
}

impl ReadingBuffer {
    /// Creates a new empty buffer; capacity is at least one slot
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: vec![None; capacity],
            write_pos: 0,
            len: 0,
        }
    }

    /// Adds a reading, overwriting the oldest when full
    pub fn push(&mut self, reading: Reading) {
        let capacity = self.capacity();
        self.data[self.write_pos] = Some(reading);
        self.write_pos = (self.write_pos + 1) % capacity;

        if self.len < capacity {
            self.len += 1;
        }
    }

    /// Replace the contents with `readings` (oldest first)
    ///
    /// Only the newest `capacity` readings are retained.
    pub fn refill<I>(&mut self, readings: I)
    where
        I: IntoIterator<Item = Reading>,
    {
        self.clear();
        for reading in readings {
            self.push(reading);
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Get the most recent reading
    pub fn last(&self) -> Option<&Reading> {
        if self.is_empty() {
            return None;
        }

        let capacity = self.capacity();
        let idx = if self.write_pos == 0 { capacity - 1 } else { self.write_pos - 1 };
        self.data[idx].as_ref()
    }

    /// Get the oldest retained reading
    pub fn first(&self) -> Option<&Reading> {
        self.get(0)
    }

    /// Iterate over readings from oldest to newest
    pub fn iter(&self) -> ReadingBufferIter<'_> {
        ReadingBufferIter {
            buffer: self,
            index: 0,
        }
    }

    /// The newest `n` readings, newest first
    pub fn newest(&self, n: usize) -> Vec<Reading> {
        let take = n.min(self.len);
        (0..take)
            .filter_map(|offset| self.get(self.len - 1 - offset).copied())
            .collect()
    }

    /// Clear all readings
    pub fn clear(&mut self) {
        for slot in self.data.iter_mut() {
            *slot = None;
        }
        self.write_pos = 0;
        self.len = 0;
    }

    /// Gets a reading by logical index (0 = oldest, len-1 = newest)
    fn get(&self, index: usize) -> Option<&Reading> {
        if index >= self.len {
            return None;
        }

        let capacity = self.capacity();
        let actual_index = if self.len < capacity {
            index
        } else {
            // Buffer is full, oldest data is at write_pos
            (self.write_pos + index) % capacity
        };

        self.data[actual_index].as_ref()
    }
}

/// Iterator over buffer contents, oldest first
pub struct ReadingBufferIter<'a> {
    buffer: &'a ReadingBuffer,
    index: usize,
}

impl<'a> Iterator for ReadingBufferIter<'a> {
    type Item = &'a Reading;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.buffer.get(self.index)?;
        self.index += 1;
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(i: i64) -> Reading {
        Reading::new(i as f64, 50.0, Utc.timestamp_opt(1_700_000_000 + i * 300, 0).unwrap())
    }

    #[test]
    fn empty_buffer() {
        let buffer = ReadingBuffer::with_capacity(5);
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert!(buffer.last().is_none());
        assert!(buffer.first().is_none());
    }

    #[test]
    fn zero_capacity_is_promoted() {
        let mut buffer = ReadingBuffer::with_capacity(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(reading(1));
        buffer.push(reading(2));
        assert_eq!(buffer.last().unwrap().temperature, 2.0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn circular_overwrite() {
        let mut buffer = ReadingBuffer::with_capacity(3);
        for i in 0..5 {
            buffer.push(reading(i));
        }

        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_full());

        let values: Vec<f64> = buffer.iter().map(|r| r.temperature).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(buffer.first().unwrap().temperature, 2.0);
        assert_eq!(buffer.last().unwrap().temperature, 4.0);
    }

    #[test]
    fn newest_first_slice() {
        let mut buffer = ReadingBuffer::with_capacity(4);
        for i in 0..6 {
            buffer.push(reading(i));
        }

        let newest: Vec<f64> = buffer.newest(3).iter().map(|r| r.temperature).collect();
        assert_eq!(newest, vec![5.0, 4.0, 3.0]);

        // Asking for more than retained returns everything
        assert_eq!(buffer.newest(10).len(), 4);
    }

    #[test]
    fn refill_keeps_newest() {
        let mut buffer = ReadingBuffer::with_capacity(2);
        buffer.refill((0..5).map(reading));
        let values: Vec<f64> = buffer.iter().map(|r| r.temperature).collect();
        assert_eq!(values, vec![3.0, 4.0]);
    }
}
