//! Interval Resampling of Irregular Reading Sequences
//!
//! ## Overview
//!
//! Sensors report on an irregular cadence: retries, clock jitter and manual
//! uploads produce bursts of readings seconds apart. The reconstruction model
//! was trained on a sequence with a fixed minimum spacing, so history must be
//! thinned the same way before it is windowed.
//!
//! ## Algorithm
//!
//! Greedy, single pass, earliest-wins:
//!
//! ```text
//! keep r[0]
//! for each following r:
//!     if |r.timestamp - last_kept.timestamp| >= m: keep r
//! ```
//!
//! Ties at exactly `m` are kept. The scan is O(n), allocation is one output
//! vector, and the output is always a subsequence of the input.
//!
//! ### Newest-first input
//!
//! When history arrives newest-first (a "latest N" fetch) the same greedy rule
//! runs in that order and the kept readings are reversed afterwards. This
//! anchors the selection at the newest reading rather than the oldest, so the
//! context right before the reading being scored is as fresh as possible. The
//! two directions can select different subsets from the same data.

use chrono::Duration;

use crate::reading::Reading;

/// Thin chronologically ordered readings to a minimum spacing
///
/// Readings that are not at least `min_interval` after the last kept reading
/// are dropped. Out-of-order readings are therefore dropped as well.
pub fn resample(readings: &[Reading], min_interval: Duration) -> Vec<Reading> {
    let mut kept: Vec<Reading> = Vec::with_capacity(readings.len());

    for reading in readings {
        match kept.last() {
            None => kept.push(*reading),
            Some(last) if reading.timestamp - last.timestamp >= min_interval => kept.push(*reading),
            Some(_) => {}
        }
    }

    kept
}

/// Thin newest-first readings, returning them oldest-first
///
/// Anchored at `readings[0]`, the newest reading.
pub fn resample_newest_first(readings: &[Reading], min_interval: Duration) -> Vec<Reading> {
    let mut kept: Vec<Reading> = Vec::with_capacity(readings.len());

    for reading in readings {
        match kept.last() {
            None => kept.push(*reading),
            Some(last) if last.timestamp - reading.timestamp >= min_interval => kept.push(*reading),
            Some(_) => {}
        }
    }

    kept.reverse();
    kept
}

/// Check the spacing invariant on an oldest-first sequence
pub fn is_spaced(readings: &[Reading], min_interval: Duration) -> bool {
    readings
        .windows(2)
        .all(|pair| pair[1].timestamp - pair[0].timestamp >= min_interval)
}
