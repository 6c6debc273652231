//! Reconstruction scoring
//!
//! The anomaly score is the mean squared error between a window and the
//! model's reconstruction of it, over all `L * F` entries. A window is
//! anomalous when the error is strictly greater than the threshold.
//!
//! The threshold is fixed at load time. `percentile_threshold` reproduces the
//! offline rule that produced it (a high percentile of reconstruction errors
//! on held-out normal data) for tooling and tests.

use std::time::Duration;

use climaguard_core::stats::quantile;
use climaguard_core::{NormalizedReading, Window};
use serde::{Deserialize, Serialize};

use crate::error::{DetectorError, DetectorResult};
use crate::model::{ModelError, ModelHandle};

/// Score of one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    /// Mean squared reconstruction error, always `>= 0`
    pub error: f64,
    pub threshold: f64,
    /// `error > threshold`
    pub is_anomalous: bool,
}

impl ScoreOutcome {
    pub fn new(error: f64, threshold: f64) -> Self {
        Self {
            error,
            threshold,
            is_anomalous: error > threshold,
        }
    }
}

/// Scores windows against a fixed threshold
#[derive(Debug, Clone)]
pub struct ReconstructionScorer {
    model: ModelHandle,
    threshold: f64,
    timeout: Option<Duration>,
}

impl ReconstructionScorer {
    pub fn new(model: ModelHandle, threshold: f64) -> DetectorResult<Self> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(DetectorError::Config(format!(
                "threshold must be a positive number, got {threshold}"
            )));
        }
        Ok(Self {
            model,
            threshold,
            timeout: None,
        })
    }

    /// Bound each model call
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Reconstruction error of `window`; never retried
    pub async fn score(&self, window: &Window) -> Result<f64, ModelError> {
        let reconstruction = self.model.reconstruct(window.clone(), self.timeout).await?;
        mean_squared_error(window.rows(), &reconstruction)
    }

    /// Score and compare against the threshold
    pub async fn evaluate(&self, window: &Window) -> Result<ScoreOutcome, ModelError> {
        let error = self.score(window).await?;
        log::debug!("Reconstruction error {error:.6} (threshold {:.6})", self.threshold);
        Ok(ScoreOutcome::new(error, self.threshold))
    }

    /// Synchronous variant for callers already off the async runtime
    pub fn evaluate_blocking(&self, window: &Window) -> Result<ScoreOutcome, ModelError> {
        let reconstruction = self.model.reconstruct_blocking(window)?;
        let error = mean_squared_error(window.rows(), &reconstruction)?;
        Ok(ScoreOutcome::new(error, self.threshold))
    }
}

/// Element-wise MSE over every feature of every row
pub fn mean_squared_error(
    original: &[NormalizedReading],
    reconstruction: &[NormalizedReading],
) -> Result<f64, ModelError> {
    if original.len() != reconstruction.len() {
        return Err(ModelError::Shape {
            expected: original.len(),
            actual: reconstruction.len(),
        });
    }
    if original.is_empty() {
        return Ok(0.0);
    }

    let sum: f64 = original
        .iter()
        .zip(reconstruction)
        .map(|(a, b)| a.squared_distance(b))
        .sum();
    let entries = original.len() * climaguard_core::constants::FEATURE_COUNT;

    Ok(sum / entries as f64)
}

/// `p`-th percentile (0..=100) of `errors`, linear interpolation
///
/// Returns `None` for an empty input.
pub fn percentile_threshold(errors: &[f64], p: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = errors.iter().copied().filter(|e| e.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(quantile(&sorted, p / 100.0))
}
