//! Population Statistics for Rule-Based Classification
//!
//! ## Overview
//!
//! The statistical classifier compares a raw reading against per-feature
//! population statistics computed offline from a representative dataset:
//! mean, sample standard deviation and an empirical normal range.
//!
//! ## Analysis Procedure
//!
//! `DatasetStats::analyze` reproduces the offline analysis:
//!
//! 1. Drop readings with non-finite values
//! 2. Drop rows outside the Tukey fences `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]` of
//!    *either* feature (sensor glitches, not climate)
//! 3. On the remaining rows compute mean, sample std (n - 1), min, max and
//!    quartiles per feature
//! 4. Normal range is `mean ± 2·std`
//!
//! Quantiles use linear interpolation between closest ranks.
//!
//! ## File Formats
//!
//! Two JSON documents are accepted:
//!
//! ```text
//! { "temperature": {"mean":..,"std":..}, "humidity": {..} }
//! { "normal_ranges": { "temperature": {..}, "humidity": {..} },
//!   "statistics":    { "temperature": {"min":..,"max":..}, .. } }
//! ```
//!
//! The second is the full analysis report. `normal_min`/`normal_max` default
//! to `mean ± 2·std` when missing; `min`/`max` are optional everywhere.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{IQR_FENCE, NORMAL_RANGE_SIGMAS};
use crate::errors::{CoreError, CoreResult};
use crate::reading::Reading;

/// Statistics of one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub std: f64,
    pub normal_min: f64,
    pub normal_max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl FeatureStats {
    /// Stats with the default `mean ± 2·std` normal range
    pub fn from_moments(mean: f64, std: f64) -> Self {
        Self {
            mean,
            std,
            normal_min: mean - NORMAL_RANGE_SIGMAS * std,
            normal_max: mean + NORMAL_RANGE_SIGMAS * std,
            min: None,
            max: None,
        }
    }

    /// Override the normal range
    pub fn with_normal_range(mut self, normal_min: f64, normal_max: f64) -> Self {
        self.normal_min = normal_min;
        self.normal_max = normal_max;
        self
    }

    /// Attach observed extremes
    pub fn with_extremes(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    fn validate(&self, feature: &str) -> CoreResult<()> {
        let finite = [self.mean, self.std, self.normal_min, self.normal_max]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(CoreError::malformed_stats(format!("{feature}: non-finite value")));
        }
        if self.std < 0.0 {
            return Err(CoreError::malformed_stats(format!("{feature}: negative std")));
        }
        if self.normal_min > self.normal_max {
            return Err(CoreError::malformed_stats(format!(
                "{feature}: normal_min {} exceeds normal_max {}",
                self.normal_min, self.normal_max
            )));
        }
        Ok(())
    }
}

/// Per-feature population statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub temperature: FeatureStats,
    pub humidity: FeatureStats,
}

impl DatasetStats {
    pub fn new(temperature: FeatureStats, humidity: FeatureStats) -> CoreResult<Self> {
        temperature.validate("temperature")?;
        humidity.validate("humidity")?;
        Ok(Self { temperature, humidity })
    }

    /// Parse either accepted JSON document
    pub fn parse(content: &str) -> CoreResult<Self> {
        let document: StatsDocument = serde_json::from_str(content)
            .map_err(|e| CoreError::malformed_stats(e.to_string()))?;

        let (ranges, summary) = match document {
            StatsDocument::Report { normal_ranges, statistics } => (normal_ranges, statistics),
            StatsDocument::Bare(ranges) => (ranges, None),
        };

        let (t_extremes, h_extremes) = match summary {
            Some(s) => (s.temperature, s.humidity),
            None => (RawExtremes::default(), RawExtremes::default()),
        };

        Self::new(
            ranges.temperature.resolve(t_extremes),
            ranges.humidity.resolve(h_extremes),
        )
    }

    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let stats = Self::parse(&content)?;
        log::info!(
            "Loaded dataset stats from {}: temperature {:.2}±{:.2}, humidity {:.2}±{:.2}",
            path.display(),
            stats.temperature.mean,
            stats.temperature.std,
            stats.humidity.mean,
            stats.humidity.std
        );
        Ok(stats)
    }

    /// Run the offline analysis and keep only the classifier statistics
    pub fn from_readings(readings: &[Reading]) -> CoreResult<Self> {
        DatasetAnalysis::run(readings).map(|analysis| analysis.stats)
    }
}

// ===== FILE FORMAT =====

#[derive(Deserialize)]
#[serde(untagged)]
enum StatsDocument {
    Report {
        normal_ranges: RawPair,
        #[serde(default)]
        statistics: Option<RawSummaryPair>,
    },
    Bare(RawPair),
}

#[derive(Deserialize)]
struct RawPair {
    temperature: RawFeature,
    humidity: RawFeature,
}

#[derive(Deserialize)]
struct RawFeature {
    mean: f64,
    std: f64,
    normal_min: Option<f64>,
    normal_max: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

#[derive(Deserialize, Default)]
struct RawExtremes {
    min: Option<f64>,
    max: Option<f64>,
}

#[derive(Deserialize)]
struct RawSummaryPair {
    #[serde(default)]
    temperature: RawExtremes,
    #[serde(default)]
    humidity: RawExtremes,
}

impl RawFeature {
    fn resolve(self, extremes: RawExtremes) -> FeatureStats {
        let base = FeatureStats::from_moments(self.mean, self.std);
        FeatureStats {
            normal_min: self.normal_min.unwrap_or(base.normal_min),
            normal_max: self.normal_max.unwrap_or(base.normal_max),
            min: self.min.or(extremes.min),
            max: self.max.or(extremes.max),
            ..base
        }
    }
}

// ===== OFFLINE ANALYSIS =====

/// Quartiles of one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
}

impl Quartiles {
    fn of(sorted: &[f64]) -> Self {
        Self {
            q25: quantile(sorted, 0.25),
            median: quantile(sorted, 0.5),
            q75: quantile(sorted, 0.75),
        }
    }

    pub fn iqr(&self) -> f64 {
        self.q75 - self.q25
    }

    /// Tukey fences `[Q1 - k·IQR, Q3 + k·IQR]`
    pub fn fences(&self, k: f64) -> (f64, f64) {
        (self.q25 - k * self.iqr(), self.q75 + k * self.iqr())
    }
}

/// Descriptive statistics of one feature after outlier filtering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    #[serde(flatten)]
    pub quartiles: Quartiles,
}

/// Result of `DatasetStats` analysis over a reading set
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetAnalysis {
    /// Readings kept after filtering
    pub total: usize,
    /// Readings dropped as non-finite or outside the fences
    pub outliers_removed: usize,
    pub temperature: FeatureSummary,
    pub humidity: FeatureSummary,
    /// Classifier statistics derived from the summaries
    pub stats: DatasetStats,
}

impl DatasetAnalysis {
    /// Needs at least two finite readings surviving the filter
    pub fn run(readings: &[Reading]) -> CoreResult<Self> {
        let finite: Vec<Reading> = readings
            .iter()
            .filter(|r| r.check_finite().is_ok())
            .copied()
            .collect();
        if finite.len() < 2 {
            return Err(CoreError::InsufficientData {
                required: 2,
                available: finite.len(),
            });
        }

        let t_fences = Quartiles::of(&sorted(finite.iter().map(|r| r.temperature))).fences(IQR_FENCE);
        let h_fences = Quartiles::of(&sorted(finite.iter().map(|r| r.humidity))).fences(IQR_FENCE);

        let kept: Vec<Reading> = finite
            .into_iter()
            .filter(|r| {
                (t_fences.0..=t_fences.1).contains(&r.temperature)
                    && (h_fences.0..=h_fences.1).contains(&r.humidity)
            })
            .collect();
        if kept.len() < 2 {
            return Err(CoreError::InsufficientData {
                required: 2,
                available: kept.len(),
            });
        }

        let outliers_removed = readings.len() - kept.len();
        if outliers_removed > 0 {
            log::warn!("Dataset analysis dropped {outliers_removed} outlier readings");
        }

        let temperature = summarize(kept.iter().map(|r| r.temperature));
        let humidity = summarize(kept.iter().map(|r| r.humidity));
        let stats = DatasetStats::new(summary_stats(&temperature), summary_stats(&humidity))?;

        Ok(Self {
            total: kept.len(),
            outliers_removed,
            temperature,
            humidity,
            stats,
        })
    }

    /// Analysis report in the document format `DatasetStats::parse` reads
    pub fn to_report_json(&self) -> serde_json::Value {
        serde_json::json!({
            "dataset_info": {
                "total_measurements": self.total,
                "outliers_removed": self.outliers_removed,
            },
            "statistics": {
                "temperature": self.temperature,
                "humidity": self.humidity,
            },
            "normal_ranges": self.stats,
        })
    }
}

fn sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

fn summarize(values: impl Iterator<Item = f64>) -> FeatureSummary {
    let sorted = sorted(values);
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);

    FeatureSummary {
        mean,
        std: variance.sqrt(),
        min: sorted.first().copied().unwrap_or(mean),
        max: sorted.last().copied().unwrap_or(mean),
        quartiles: Quartiles::of(&sorted),
    }
}

fn summary_stats(summary: &FeatureSummary) -> FeatureStats {
    FeatureStats::from_moments(summary.mean, summary.std).with_extremes(summary.min, summary.max)
}

/// Quantile `q ∈ [0, 1]` of ascending `sorted`, linear interpolation
///
/// Returns NaN for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
