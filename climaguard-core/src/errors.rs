//! Error Types for the Scoring Pipeline Core
//!
//! ## Design Philosophy
//!
//! Errors in the core crate describe one of two things: a parameter artifact
//! that is missing or unreadable, or an internal consistency violation inside
//! the window assembly. Both are surfaced to the caller unchanged; the core
//! never retries and never swallows an error.
//!
//! Errors are `Clone + PartialEq` so tests can match on them directly and the
//! detector can copy them into per-item batch results.
//!
//! ## Error Categories
//!
//! ### Artifact problems
//! - `ModelNotReady`: scaler (or another component) was never loaded
//! - `MalformedScalerFile`: persisted scaler matches neither accepted layout
//! - `MalformedStats`: dataset statistics document cannot be read
//! - `Io`: the artifact file could not be read or written
//!
//! ### Consistency violations
//! - `WindowLength`: an assembled window does not have exactly `L` rows
//! - `InvalidValue`: NaN or infinite input
//! - `InsufficientData`: an offline computation was given too few readings
//! - `Config`: a parameter is outside its valid domain (e.g. `L == 0`)
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use climaguard_core::{CoreError, FeatureScaler, Reading};
//! use chrono::Utc;
//!
//! let scaler = FeatureScaler::unloaded();
//! match scaler.scale(&Reading::new(21.0, 48.0, Utc::now())) {
//!     Ok(_normalized) => {}
//!     Err(CoreError::ModelNotReady { component }) => {
//!         // Fail fast - caller must load the scaler explicitly
//!         assert_eq!(component, "feature scaler");
//!     }
//!     Err(_) => {}
//! }
//! ```

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Core pipeline errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A required component has not been loaded
    #[error("Model not ready: {component} has not been loaded")]
    ModelNotReady {
        /// Human-readable name of the missing component
        component: &'static str,
    },

    /// Persisted scaler content matches neither accepted layout
    #[error("Malformed scaler file: {reason}")]
    MalformedScalerFile {
        reason: String,
    },

    /// Dataset statistics document could not be interpreted
    #[error("Malformed dataset statistics: {reason}")]
    MalformedStats {
        reason: String,
    },

    /// Assembled window has the wrong number of rows
    #[error("Window length mismatch: expected {expected}, got {actual}")]
    WindowLength {
        /// Configured window length `L`
        expected: usize,
        /// Rows actually produced
        actual: usize,
    },

    /// Not enough readings for an offline computation
    #[error("Insufficient data: need {required}, have {available}")]
    InsufficientData {
        /// Minimum number of readings needed
        required: usize,
        /// Readings actually supplied
        available: usize,
    },

    /// Value makes no numeric sense (NaN, infinity)
    #[error("Invalid value: {field} is not a finite number")]
    InvalidValue {
        field: &'static str,
    },

    /// Parameter outside its valid domain
    #[error("Invalid configuration: {reason}")]
    Config {
        reason: String,
    },

    /// Artifact could not be read or written
    #[error("I/O error on {path}: {reason}")]
    Io {
        path: String,
        kind: std::io::ErrorKind,
        reason: String,
    },
}

impl CoreError {
    pub(crate) fn malformed_scaler(reason: impl Into<String>) -> Self {
        Self::MalformedScalerFile { reason: reason.into() }
    }

    pub(crate) fn malformed_stats(reason: impl Into<String>) -> Self {
        Self::MalformedStats { reason: reason.into() }
    }

    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    /// True when the underlying cause is a missing file
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { kind: std::io::ErrorKind::NotFound, .. })
    }
}
