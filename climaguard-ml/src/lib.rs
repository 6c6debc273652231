//! Reconstruction-Based Anomaly Detection for Climate Readings
//!
//! ## Overview
//!
//! A reading is judged against the day or two of history that precedes it.
//! The detector builds a fixed-length window ending at the reading, asks a
//! reconstruction model to reproduce that window, and treats a large
//! reconstruction error as "this does not look like the data the model was
//! trained on".
//!
//! ```text
//! store ──► resample ──► scale ──► window (L × 2) ──► model ──► MSE
//!                                                                │
//!                                      error > threshold? ◄──────┘
//!                                              │ yes
//!                                  classify + compose diagnosis
//! ```
//!
//! ## Why Reconstruction Error?
//!
//! 1. **Unsupervised**: trained on normal data only, no labeled anomalies
//! 2. **Context-aware**: a reading is scored with its history, so 30 °C at
//!    noon and 30 °C at 3 am score differently
//! 3. **Model-agnostic**: anything implementing `ReconstructionModel` plugs in
//!
//! ## Explaining a Detection
//!
//! The error says *that* something is off, not *what*. Anomalous readings are
//! labeled by `StatisticalClassifier` against dataset statistics:
//!
//! | Rule (first match wins)       | Label                 | Confidence           |
//! |-------------------------------|-----------------------|----------------------|
//! | temperature outside normal    | `high/low_temperature`| `min(1, dev / 2)`    |
//! | humidity outside normal       | `high/low_humidity`   | `min(1, dev / 2)`    |
//! | opposite 1σ bands             | `unusual_combination` | `min(1, Σdev / 4)`   |
//! | otherwise                     | `normal`              | 0                    |
//!
//! ## Cold Start
//!
//! With less than `L - 1` readings of history the window is padded by
//! repeating the oldest available row. Padded windows reconstruct easily, so
//! early scores are biased toward normal. `AnomalyResult::history` reports how
//! much real history was used.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use climaguard_connectors::MemoryStore;
//! use climaguard_ml::{AnomalyDetector, DetectorConfig, ModelHandle, MovingAverageModel};
//!
//! # async fn run() -> climaguard_ml::DetectorResult<()> {
//! let config = DetectorConfig::load("detector.json")?;
//! let store = Arc::new(MemoryStore::new());
//! let detector = AnomalyDetector::from_config(store, ModelHandle::new(MovingAverageModel::default()), config)?;
//!
//! let result = detector.detect_latest().await?;
//! if let Some(diagnosis) = &result.diagnosis {
//!     println!("{}", diagnosis.classification.anomaly_type);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod artifacts;
pub mod config;
pub mod detector;
pub mod diagnosis;
pub mod error;
pub mod model;
pub mod scoring;

pub use artifacts::{load_threshold, parse_threshold, ModelArtifacts};
pub use config::DetectorConfig;
pub use detector::{AnomalyDetector, IntervalAnalysis, IntervalFinding};
pub use diagnosis::{AnomalyResult, DetectionResponse, Diagnosis, DiagnosisComposer, ErrorAnalysis};
pub use error::{DetectorError, DetectorResult};
pub use model::{IdentityModel, ModelError, ModelHandle, MovingAverageModel, ReconstructionModel};
pub use scoring::{mean_squared_error, percentile_threshold, ReconstructionScorer, ScoreOutcome};
