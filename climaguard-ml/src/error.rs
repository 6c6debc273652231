//! Detector error taxonomy
//!
//! | Variant         | Policy                                            |
//! |-----------------|---------------------------------------------------|
//! | `ModelNotReady` | fail fast; caller must (re)load artifacts          |
//! | `Scoring`       | propagate; batch callers record it per item        |
//! | `Core`          | window/scaler consistency failures                 |
//! | `Store`         | only surfaced where history is the request itself |
//! | `NoReadings`    | store is empty when the latest reading was asked   |
//! | `Config`, `Io`, `Json` | configuration and artifact loading          |
//!
//! A failed history fetch during scoring is *not* an error: the detector
//! degrades to an empty history and logs a warning.

use climaguard_connectors::StoreError;
use climaguard_core::CoreError;
use thiserror::Error;

use crate::model::ModelError;

/// Result type for detector operations
pub type DetectorResult<T> = Result<T, DetectorError>;

/// Anomaly detector errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    #[error("Model not ready: {component} has not been loaded")]
    ModelNotReady { component: &'static str },

    #[error("Scoring failed: {0}")]
    Scoring(#[from] ModelError),

    #[error(transparent)]
    Core(CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No measurements found")]
    NoReadings,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid JSON in {path}: {reason}")]
    Json { path: String, reason: String },
}

impl From<CoreError> for DetectorError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ModelNotReady { component } => Self::ModelNotReady { component },
            other => Self::Core(other),
        }
    }
}
