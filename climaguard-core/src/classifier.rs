//! Statistical Anomaly Classification
//!
//! ## Overview
//!
//! Independent of the reconstruction model, this classifier labels a raw
//! reading by comparing each feature to population statistics. It answers
//! "what kind of anomaly" once the model has answered "is it anomalous", and
//! it is the only classifier on the interval-analysis path.
//!
//! ## Rules
//!
//! For feature `f` with mean `μ`, std `σ` and normal range `[lo, hi]`:
//!
//! ```text
//! deviation_f = |value_f - μ_f| / (σ_f + ε)
//! ```
//!
//! Checked in fixed precedence, first match wins:
//!
//! | Order | Condition            | Type                 | Confidence            |
//! |-------|----------------------|----------------------|-----------------------|
//! | 1     | `t > hi_t`           | `high_temperature`   | `dev_t / 2`           |
//! | 2     | `t < lo_t`           | `low_temperature`    | `dev_t / 2`           |
//! | 3     | `h > hi_h`           | `high_humidity`      | `dev_h / 2`           |
//! | 4     | `h < lo_h`           | `low_humidity`       | `dev_h / 2`           |
//! | 5     | opposite inner bands | `unusual_combination`| `(dev_t + dev_h) / 4` |
//! | 6     | otherwise            | `normal`             | `0`                   |
//!
//! Confidence is clamped to 1. All comparisons are strict: a value exactly on
//! a bound is inside the range.
//!
//! ### Unusual combination
//!
//! Once rules 1-4 have failed, both features are inside their normal ranges,
//! so "above normal while the other is below normal" can never hold against
//! the same bounds. The check therefore uses the inner band `μ ± 1σ`:
//! temperature above `μ_t + σ_t` while humidity is below `μ_h - σ_h`, or
//! the reverse. Hot-and-dry and cold-and-damp pairs are physically unusual
//! for an indoor climate even when each value alone is unremarkable.
//!
//! This departs from a literal reading of the rule against `[lo, hi]`. A
//! pair with both values inside their normal ranges, which the per-feature
//! checks alone would label `normal`, becomes `unusual_combination` once it
//! straddles the inner bands. `ClassifierConfig::combination_band_sigmas`
//! sets the band width; the edges are exclusive.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    COMBINATION_BAND_SIGMAS, COMBINATION_CONFIDENCE_DIVISOR, EPSILON, SINGLE_FEATURE_CONFIDENCE_DIVISOR,
};
use crate::stats::{DatasetStats, FeatureStats};

/// Kind of anomaly a reading represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    HighTemperature,
    LowTemperature,
    HighHumidity,
    LowHumidity,
    UnusualCombination,
    Normal,
    Unknown,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighTemperature => "high_temperature",
            Self::LowTemperature => "low_temperature",
            Self::HighHumidity => "high_humidity",
            Self::LowHumidity => "low_humidity",
            Self::UnusualCombination => "unusual_combination",
            Self::Normal => "normal",
            Self::Unknown => "unknown",
        }
    }

    /// True for every concrete anomaly label
    pub fn is_anomaly(&self) -> bool {
        !matches!(self, Self::Normal | Self::Unknown)
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-feature evidence behind a classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureDetail {
    pub value: f64,
    pub normal_min: f64,
    pub normal_max: f64,
    /// `|value - mean| / (std + ε)`
    pub deviation_from_mean: f64,
}

/// Output of the statistical classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    /// In `[0, 1]`
    pub confidence: f64,
    /// Keyed by `temperature` / `humidity`; empty when no stats are loaded
    pub details: BTreeMap<String, FeatureDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Classification {
    fn unknown(note: &str) -> Self {
        Self {
            anomaly_type: AnomalyType::Unknown,
            confidence: 0.0,
            details: BTreeMap::new(),
            note: Some(note.to_string()),
        }
    }
}

/// Tunable constants of the rule set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub single_feature_divisor: f64,
    pub combination_divisor: f64,
    /// Inner band width for the unusual-combination rule, in σ
    pub combination_band_sigmas: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            single_feature_divisor: SINGLE_FEATURE_CONFIDENCE_DIVISOR,
            combination_divisor: COMBINATION_CONFIDENCE_DIVISOR,
            combination_band_sigmas: COMBINATION_BAND_SIGMAS,
        }
    }
}

/// Rule-based classifier over optional dataset statistics
#[derive(Debug, Clone, Default)]
pub struct StatisticalClassifier {
    stats: Option<DatasetStats>,
    config: ClassifierConfig,
}

impl StatisticalClassifier {
    pub fn new(stats: Option<DatasetStats>) -> Self {
        Self {
            stats,
            config: ClassifierConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn stats(&self) -> Option<&DatasetStats> {
        self.stats.as_ref()
    }

    pub fn has_stats(&self) -> bool {
        self.stats.is_some()
    }

    /// Classify a raw reading; never fails
    pub fn classify(&self, temperature: f64, humidity: f64) -> Classification {
        let Some(stats) = &self.stats else {
            return Classification::unknown("dataset statistics not loaded");
        };
        if !temperature.is_finite() || !humidity.is_finite() {
            return Classification::unknown("reading contains a non-finite value");
        }

        let t = detail(temperature, &stats.temperature);
        let h = detail(humidity, &stats.humidity);

        let single = |deviation: f64| (deviation / self.config.single_feature_divisor).min(1.0);

        let (anomaly_type, confidence) = if temperature > t.normal_max {
            (AnomalyType::HighTemperature, single(t.deviation_from_mean))
        } else if temperature < t.normal_min {
            (AnomalyType::LowTemperature, single(t.deviation_from_mean))
        } else if humidity > h.normal_max {
            (AnomalyType::HighHumidity, single(h.deviation_from_mean))
        } else if humidity < h.normal_min {
            (AnomalyType::LowHumidity, single(h.deviation_from_mean))
        } else if self.opposite_bands(temperature, humidity, stats) {
            let combined = (t.deviation_from_mean + h.deviation_from_mean) / self.config.combination_divisor;
            (AnomalyType::UnusualCombination, combined.min(1.0))
        } else {
            (AnomalyType::Normal, 0.0)
        };

        let mut details = BTreeMap::new();
        details.insert("temperature".to_string(), t);
        details.insert("humidity".to_string(), h);

        Classification {
            anomaly_type,
            confidence,
            details,
            note: None,
        }
    }

    fn opposite_bands(&self, temperature: f64, humidity: f64, stats: &DatasetStats) -> bool {
        let k = self.config.combination_band_sigmas;
        let band = |s: &FeatureStats| (s.mean - k * s.std, s.mean + k * s.std);
        let (t_lo, t_hi) = band(&stats.temperature);
        let (h_lo, h_hi) = band(&stats.humidity);

        (temperature > t_hi && humidity < h_lo) || (temperature < t_lo && humidity > h_hi)
    }
}

fn detail(value: f64, stats: &FeatureStats) -> FeatureDetail {
    FeatureDetail {
        value,
        normal_min: stats.normal_min,
        normal_max: stats.normal_max,
        deviation_from_mean: (value - stats.mean).abs() / (stats.std + EPSILON),
    }
}
