//! Shared reading generators for integration tests
//!
//! Produces indoor-climate series with a diurnal cycle, humidity inversely
//! correlated with temperature, and irregular reporting jitter.

#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use climaguard_core::{Reading, Timestamp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed epoch used by all generated series
pub fn epoch() -> Timestamp {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// Seeded generator for realistic reading series
pub struct ClimateGenerator {
    rng: StdRng,
    base_temperature: f64,
    base_humidity: f64,
}

impl ClimateGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_temperature: 22.0,
            base_humidity: 50.0,
        }
    }

    /// `count` readings starting at `start`, nominally `interval_secs` apart
    ///
    /// With `jitter_secs > 0` every gap is perturbed by up to that amount and
    /// roughly one reading in ten is duplicated a few seconds later.
    pub fn series(&mut self, start: Timestamp, count: usize, interval_secs: i64, jitter_secs: i64) -> Vec<Reading> {
        let mut out = Vec::with_capacity(count);
        let mut ts = start;

        for i in 0..count {
            let hours = i as f64 * interval_secs as f64 / 3600.0;
            let diurnal = 2.0 * (2.0 * std::f64::consts::PI * hours / 24.0).sin();
            let temperature = self.base_temperature + diurnal + self.rng.gen_range(-0.3..0.3);
            let humidity = (self.base_humidity - 2.0 * diurnal + self.rng.gen_range(-1.0..1.0)).clamp(0.0, 100.0);

            out.push(Reading::new(temperature, humidity, ts));

            if jitter_secs > 0 && self.rng.gen_bool(0.1) {
                let dup = ts + Duration::seconds(self.rng.gen_range(1..=jitter_secs));
                out.push(Reading::new(temperature, humidity, dup));
            }

            let jitter = if jitter_secs > 0 {
                self.rng.gen_range(-jitter_secs..=jitter_secs)
            } else {
                0
            };
            ts = ts + Duration::seconds(interval_secs + jitter);
        }

        out
    }
}
