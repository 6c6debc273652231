//! Core scoring pipeline for ClimaGuard
//!
//! Everything between "a reading arrived" and "a window is ready for the
//! model", plus the rule-based classifier that labels anomalies.
//!
//! Pieces, leaf-first:
//! - `resample`: minimum-spacing deduplication of irregular history
//! - `scaler`: offline-fit min/max normalization and its file codec
//! - `window`: fixed-length window assembly with cold-start padding
//! - `stats` + `classifier`: population statistics and anomaly typing
//!
//! ```no_run
//! use climaguard_core::{FeatureScaler, Reading, ScalerParams, SequenceAssembler};
//! use chrono::Utc;
//!
//! let scaler = FeatureScaler::new(ScalerParams::load("scaler_params.json")?);
//! let assembler = SequenceAssembler::new(576)?;
//!
//! let current = Reading::new(21.4, 47.0, Utc::now());
//! let assembled = assembler.assemble(&scaler, &current, &[])?;
//! assert_eq!(assembled.window.len(), 576);
//! # Ok::<(), climaguard_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod classifier;
pub mod constants;
pub mod errors;
pub mod reading;
pub mod resample;
pub mod scaler;
pub mod stats;
pub mod time;
pub mod window;

// Public API
pub use buffer::ReadingBuffer;
pub use classifier::{AnomalyType, Classification, ClassifierConfig, FeatureDetail, StatisticalClassifier};
pub use errors::{CoreError, CoreResult};
pub use reading::{NormalizedReading, Reading};
pub use resample::{resample, resample_newest_first};
pub use scaler::{FeatureScaler, ScalerParams};
pub use stats::{DatasetAnalysis, DatasetStats, FeatureStats};
pub use time::{SystemClock, TimeSource, Timestamp};
pub use window::{AssembledWindow, HistoryCoverage, InsufficientHistory, SequenceAssembler, Window};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
