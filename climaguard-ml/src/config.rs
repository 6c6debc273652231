//! Detector configuration
//!
//! Loaded from JSON; every field has a default so a partial file works:
//!
//! ```json
//! {
//!   "window_length": 576,
//!   "min_interval_secs": 300,
//!   "scaler_path": "models/scaler_params.json",
//!   "threshold_path": "models/threshold.json",
//!   "stats_path": "analysis/dataset_analysis.json",
//!   "store_timeout_ms": 2000
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use climaguard_core::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_MIN_INTERVAL_SECS, DEFAULT_SIGNIFICANCE_MULTIPLIER, DEFAULT_THRESHOLD,
    DEFAULT_WINDOW_LENGTH,
};
use climaguard_core::ClassifierConfig;
use serde::{Deserialize, Serialize};

use crate::error::{DetectorError, DetectorResult};

// chrono::Duration::seconds panics beyond i64::MAX milliseconds
const MAX_SPAN_SECS: u64 = i64::MAX as u64 / 1000;

/// Detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Window length `L`
    pub window_length: usize,
    /// Minimum spacing between history readings, in seconds
    pub min_interval_secs: u64,
    /// History is read from the time range `(L - 1) * min_interval *
    /// multiplier` before the scored reading; the slack absorbs gaps
    pub history_fetch_multiplier: usize,
    pub scaler_path: Option<PathBuf>,
    pub threshold_path: Option<PathBuf>,
    pub stats_path: Option<PathBuf>,
    /// Used when no threshold file is configured or it cannot be read
    pub threshold: f64,
    pub significance_multiplier: f64,
    pub classifier: ClassifierConfig,
    pub store_timeout_ms: Option<u64>,
    pub model_timeout_ms: Option<u64>,
    /// Readings scored by `detect_recent` when no count is given
    pub batch_size: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_length: DEFAULT_WINDOW_LENGTH,
            min_interval_secs: DEFAULT_MIN_INTERVAL_SECS as u64,
            history_fetch_multiplier: 2,
            scaler_path: None,
            threshold_path: None,
            stats_path: None,
            threshold: DEFAULT_THRESHOLD,
            significance_multiplier: DEFAULT_SIGNIFICANCE_MULTIPLIER,
            classifier: ClassifierConfig::default(),
            store_timeout_ms: None,
            model_timeout_ms: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> DetectorResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DetectorError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| DetectorError::Json {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        log::info!("Loaded detector config from {}", path.display());
        Ok(config)
    }

    pub fn window_length(mut self, length: usize) -> Self {
        self.window_length = length;
        self
    }

    pub fn min_interval_secs(mut self, secs: u64) -> Self {
        self.min_interval_secs = secs;
        self
    }

    pub fn history_fetch_multiplier(mut self, multiplier: usize) -> Self {
        self.history_fetch_multiplier = multiplier;
        self
    }

    pub fn scaler_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.scaler_path = Some(path.into());
        self
    }

    pub fn threshold_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.threshold_path = Some(path.into());
        self
    }

    pub fn stats_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.stats_path = Some(path.into());
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn significance_multiplier(mut self, multiplier: f64) -> Self {
        self.significance_multiplier = multiplier;
        self
    }

    pub fn classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn store_timeout_ms(mut self, ms: u64) -> Self {
        self.store_timeout_ms = Some(ms);
        self
    }

    pub fn model_timeout_ms(mut self, ms: u64) -> Self {
        self.model_timeout_ms = Some(ms);
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn min_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_interval_secs as i64)
    }

    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_ms.map(Duration::from_millis)
    }

    pub fn model_timeout(&self) -> Option<Duration> {
        self.model_timeout_ms.map(Duration::from_millis)
    }

    /// How far before a reading its history is looked up
    pub fn history_span(&self) -> chrono::Duration {
        let steps = self
            .window_length
            .saturating_sub(1)
            .saturating_mul(self.history_fetch_multiplier.max(1)) as u64;
        let secs = steps.saturating_mul(self.min_interval_secs).min(MAX_SPAN_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    pub fn validate(&self) -> DetectorResult<()> {
        if self.window_length == 0 {
            return Err(DetectorError::Config("window_length must be at least 1".into()));
        }
        if self.min_interval_secs == 0 {
            return Err(DetectorError::Config("min_interval_secs must be positive".into()));
        }
        if self.min_interval_secs > MAX_SPAN_SECS {
            return Err(DetectorError::Config("min_interval_secs is out of range".into()));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(DetectorError::Config(format!(
                "threshold must be a positive number, got {}",
                self.threshold
            )));
        }
        if !self.significance_multiplier.is_finite() || self.significance_multiplier <= 0.0 {
            return Err(DetectorError::Config("significance_multiplier must be positive".into()));
        }
        let divisors = [
            self.classifier.single_feature_divisor,
            self.classifier.combination_divisor,
        ];
        if divisors.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(DetectorError::Config("classifier divisors must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(DetectorError::Config("batch_size must be at least 1".into()));
        }
        Ok(())
    }
}
