//! Diagnosis composition and result types
//!
//! These are the structures callers (an HTTP layer, a CLI, a notifier)
//! serialize. Field names are part of the external contract:
//!
//! ```json
//! {
//!   "is_anomalous": true,
//!   "reconstruction_error": 0.0061,
//!   "threshold": 0.0020,
//!   "diagnosis": {
//!     "classification": {"type": "high_temperature", "confidence": 0.8, "details": {..}},
//!     "error_analysis": {
//!       "reconstruction_error": 0.0061, "threshold": 0.0020,
//!       "error_ratio": 3.0, "is_significantly_anomalous": true
//!     }
//!   }
//! }
//! ```
//!
//! Older payloads that spell the ratio `error_ratio_to_threshold` still
//! deserialize.

use climaguard_core::constants::{DEFAULT_SIGNIFICANCE_MULTIPLIER, EPSILON};
use climaguard_core::{Classification, HistoryCoverage};
use serde::{Deserialize, Serialize};

/// Magnitude of the reconstruction error relative to the threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub reconstruction_error: f64,
    pub threshold: f64,
    /// `error / (threshold + ε)`
    #[serde(alias = "error_ratio_to_threshold")]
    pub error_ratio: f64,
    /// `error > multiplier * threshold`
    pub is_significantly_anomalous: bool,
}

/// Classification plus error analysis for one anomalous reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub classification: Classification,
    pub error_analysis: ErrorAnalysis,
}

/// Pure aggregation of scorer and classifier output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosisComposer {
    significance_multiplier: f64,
}

impl Default for DiagnosisComposer {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNIFICANCE_MULTIPLIER)
    }
}

impl DiagnosisComposer {
    pub fn new(significance_multiplier: f64) -> Self {
        Self { significance_multiplier }
    }

    pub fn significance_multiplier(&self) -> f64 {
        self.significance_multiplier
    }

    pub fn analyze_error(&self, error: f64, threshold: f64) -> ErrorAnalysis {
        ErrorAnalysis {
            reconstruction_error: error,
            threshold,
            error_ratio: error / (threshold + EPSILON),
            is_significantly_anomalous: error > self.significance_multiplier * threshold,
        }
    }

    pub fn compose(&self, error: f64, threshold: f64, classification: Classification) -> Diagnosis {
        Diagnosis {
            classification,
            error_analysis: self.analyze_error(error, threshold),
        }
    }
}

/// Outcome of scoring one reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub is_anomalous: bool,
    pub reconstruction_error: f64,
    pub threshold: f64,
    /// Present only when `is_anomalous`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Diagnosis>,
    /// How much real history the window contained
    pub history: HistoryCoverage,
}

impl AnomalyResult {
    /// True when the window was padded and the score is biased low
    pub fn is_low_confidence(&self) -> bool {
        self.history.is_padded()
    }
}

/// Per-item envelope for batch scoring
///
/// Failures become entries with `is_anomalous = false` and a message instead
/// of aborting the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub is_anomalous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconstruction_error: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Diagnosis>,
}

impl DetectionResponse {
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            is_anomalous: false,
            reconstruction_error: None,
            threshold: None,
            message: format!("Error processing measurement: {reason}"),
            diagnosis: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.reconstruction_error.is_none()
    }
}

impl From<AnomalyResult> for DetectionResponse {
    fn from(result: AnomalyResult) -> Self {
        let message = if result.is_anomalous { "Anomalous" } else { "Normal" };
        Self {
            is_anomalous: result.is_anomalous,
            reconstruction_error: Some(result.reconstruction_error),
            threshold: Some(result.threshold),
            message: message.to_string(),
            diagnosis: result.diagnosis,
        }
    }
}
