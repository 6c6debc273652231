//! Sequence Assembly
//!
//! ## Overview
//!
//! The reconstruction model has a fixed input shape `L × F`. The assembler
//! turns "the current reading plus whatever history the store returned" into
//! exactly that shape, newest row last.
//!
//! ## Padding Policy
//!
//! ```text
//! history >= L-1:  [h(n-L+1) .. h(n-1), current]
//! history <  L-1:  [h0 × (L-1-n), h0 .. h(n-1), current]
//! no history:      [current × L]
//! ```
//!
//! Padding repeats the oldest available normalized reading rather than zeros.
//! Zeros would be far outside the training distribution and inflate the
//! reconstruction error. Repetition biases the error low instead, so a padded
//! window is reported through `HistoryCoverage` and callers can discount it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};
use crate::reading::{NormalizedReading, Reading};
use crate::scaler::FeatureScaler;

/// Exactly `L` normalized rows, the current reading last
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    rows: Vec<NormalizedReading>,
}

impl Window {
    /// Wrap rows, failing if there are not exactly `expected_len` of them
    pub fn new(rows: Vec<NormalizedReading>, expected_len: usize) -> CoreResult<Self> {
        if rows.len() != expected_len || expected_len == 0 {
            return Err(CoreError::WindowLength {
                expected: expected_len,
                actual: rows.len(),
            });
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always false for a constructed window; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[NormalizedReading] {
        &self.rows
    }

    /// The current reading's normalized row
    pub fn last(&self) -> Option<&NormalizedReading> {
        self.rows.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NormalizedReading> {
        self.rows.iter()
    }

    /// Row-major `L * F` values, the layout most inference runtimes take
    pub fn flatten(&self) -> Vec<f64> {
        self.rows.iter().flat_map(|row| row.features()).collect()
    }
}

impl<'a> IntoIterator for &'a Window {
    type Item = &'a NormalizedReading;
    type IntoIter = std::slice::Iter<'a, NormalizedReading>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// How much real history went into a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCoverage {
    /// Historical readings used (at most `required`)
    pub available: usize,
    /// Historical readings a full window needs (`L - 1`)
    pub required: usize,
    /// Rows filled by repetition
    pub padded: usize,
}

impl HistoryCoverage {
    pub fn is_padded(&self) -> bool {
        self.padded > 0
    }

    /// Non-fatal warning when the window had to be padded
    pub fn insufficient(&self) -> Option<InsufficientHistory> {
        self.is_padded().then_some(InsufficientHistory {
            available: self.available,
            required: self.required,
        })
    }
}

/// Warning: window built with padding, score is biased toward normal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientHistory {
    pub available: usize,
    pub required: usize,
}

impl fmt::Display for InsufficientHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insufficient history: {} of {} readings, window padded",
            self.available, self.required
        )
    }
}

/// A window together with its history coverage
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledWindow {
    pub window: Window,
    pub coverage: HistoryCoverage,
}

/// Builds fixed-length windows for a configured `L`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceAssembler {
    length: usize,
}

impl SequenceAssembler {
    /// `length` is `L`; zero is rejected
    pub fn new(length: usize) -> CoreResult<Self> {
        if length == 0 {
            return Err(CoreError::Config {
                reason: "window length must be at least 1".into(),
            });
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Historical readings a full window consumes
    pub fn history_needed(&self) -> usize {
        self.length - 1
    }

    /// Assemble the window ending at `current`
    ///
    /// `historical` must be ordered oldest to newest and already resampled.
    /// Only the newest `L - 1` entries are used.
    pub fn assemble(
        &self,
        scaler: &FeatureScaler,
        current: &Reading,
        historical: &[Reading],
    ) -> CoreResult<AssembledWindow> {
        let needed = self.history_needed();
        let current_row = scaler.scale(current)?;

        let used = &historical[historical.len().saturating_sub(needed)..];
        let history_rows = used
            .iter()
            .map(|reading| scaler.scale(reading))
            .collect::<CoreResult<Vec<_>>>()?;

        let padded = needed - history_rows.len();
        let pad_row = history_rows.first().copied().unwrap_or(current_row);

        let mut rows = Vec::with_capacity(self.length);
        rows.extend(std::iter::repeat(pad_row).take(padded));
        rows.extend(history_rows);
        rows.push(current_row);

        let window = Window::new(rows, self.length)?;
        let coverage = HistoryCoverage {
            available: used.len(),
            required: needed,
            padded,
        };

        if let Some(warning) = coverage.insufficient() {
            log::warn!("{warning}");
        }

        Ok(AssembledWindow { window, coverage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaler::ScalerParams;
    use chrono::{Duration, TimeZone, Utc};

    fn scaler() -> FeatureScaler {
        FeatureScaler::new(ScalerParams::new([0.0, 0.0], [40.0, 100.0]))
    }

    fn reading(i: i64, t: f64, h: f64) -> Reading {
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Reading::new(t, h, base + Duration::minutes(5 * i))
    }

    fn close(a: &NormalizedReading, b: (f64, f64)) -> bool {
        (a.feature_0 - b.0).abs() < 1e-6 && (a.feature_1 - b.1).abs() < 1e-6
    }

    #[test]
    fn no_history_repeats_current() {
        let assembler = SequenceAssembler::new(4).unwrap();
        let out = assembler.assemble(&scaler(), &reading(0, 20.0, 50.0), &[]).unwrap();

        assert_eq!(out.window.len(), 4);
        assert!(out.window.iter().all(|row| close(row, (0.5, 0.5))));
        assert_eq!(out.coverage, HistoryCoverage { available: 0, required: 3, padded: 3 });
    }

    #[test]
    fn cold_start_pads_with_oldest_history() {
        let assembler = SequenceAssembler::new(4).unwrap();
        let history = [reading(0, 10.0, 20.0)];
        let out = assembler
            .assemble(&scaler(), &reading(1, 20.0, 50.0), &history)
            .unwrap();

        let rows = out.window.rows();
        assert!(close(&rows[0], (0.25, 0.2)));
        assert!(close(&rows[1], (0.25, 0.2)));
        assert!(close(&rows[2], (0.25, 0.2)));
        assert!(close(&rows[3], (0.5, 0.5)));
        assert_eq!(out.coverage.padded, 2);
        assert!(out.coverage.insufficient().is_some());
    }

    #[test]
    fn full_history_uses_newest_entries() {
        let assembler = SequenceAssembler::new(3).unwrap();
        let history: Vec<Reading> = (0..5).map(|i| reading(i, i as f64 * 4.0, 50.0)).collect();
        let out = assembler
            .assemble(&scaler(), &reading(5, 20.0, 50.0), &history)
            .unwrap();

        let rows = out.window.rows();
        assert!(close(&rows[0], (0.3, 0.5)));
        assert!(close(&rows[1], (0.4, 0.5)));
        assert!(close(&rows[2], (0.5, 0.5)));
        assert!(!out.coverage.is_padded());
        assert_eq!(out.coverage.available, 2);
    }

    #[test]
    fn length_invariant_at_boundaries() {
        let length = 6;
        let assembler = SequenceAssembler::new(length).unwrap();
        for n in [0, length - 2, length - 1, length + 3] {
            let history: Vec<Reading> = (0..n as i64).map(|i| reading(i, 20.0, 50.0)).collect();
            let out = assembler
                .assemble(&scaler(), &reading(100, 21.0, 49.0), &history)
                .unwrap();
            assert_eq!(out.window.len(), length, "history of {n}");
            assert_eq!(out.coverage.padded + out.coverage.available, length - 1);
        }
    }

    #[test]
    fn single_row_window_is_current_only() {
        let assembler = SequenceAssembler::new(1).unwrap();
        let history = [reading(0, 0.0, 0.0)];
        let out = assembler
            .assemble(&scaler(), &reading(1, 20.0, 50.0), &history)
            .unwrap();
        assert_eq!(out.window.len(), 1);
        assert!(close(out.window.last().unwrap(), (0.5, 0.5)));
        assert!(!out.coverage.is_padded());
    }

    #[test]
    fn zero_length_rejected() {
        assert!(matches!(SequenceAssembler::new(0), Err(CoreError::Config { .. })));
    }

    #[test]
    fn window_length_checked() {
        let rows = vec![NormalizedReading::default(); 3];
        assert_eq!(
            Window::new(rows, 4),
            Err(CoreError::WindowLength { expected: 4, actual: 3 })
        );
    }

    #[test]
    fn unloaded_scaler_fails_fast() {
        let assembler = SequenceAssembler::new(4).unwrap();
        let result = assembler.assemble(&FeatureScaler::unloaded(), &reading(0, 20.0, 50.0), &[]);
        assert!(matches!(result, Err(CoreError::ModelNotReady { .. })));
    }

    #[test]
    fn flatten_is_row_major() {
        let rows = vec![NormalizedReading::new(0.1, 0.2), NormalizedReading::new(0.3, 0.4)];
        let window = Window::new(rows, 2).unwrap();
        assert_eq!(window.flatten(), vec![0.1, 0.2, 0.3, 0.4]);
    }
}
