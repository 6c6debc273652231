//! Constants for the Scoring Pipeline
//!
//! Centralized numeric defaults with their provenance. Everything that the
//! offline tooling fixed when the reconstruction model was trained lives here,
//! so the online pipeline cannot drift from it by accident.

// ===== WINDOW SHAPE =====

/// Readings per day at the nominal 5-minute reporting interval.
pub const SAMPLES_PER_DAY: usize = 288;

/// Default window length `L` (two days of 5-minute readings).
///
/// Must match the input shape the reconstruction model was trained with.
pub const DEFAULT_WINDOW_LENGTH: usize = SAMPLES_PER_DAY * 2;

/// Feature width `F`: temperature and relative humidity, in that order.
pub const FEATURE_COUNT: usize = 2;

/// Feature index of temperature within a normalized row.
pub const TEMPERATURE_FEATURE: usize = 0;

/// Feature index of relative humidity within a normalized row.
pub const HUMIDITY_FEATURE: usize = 1;

// ===== RESAMPLING =====

/// Minimum spacing between consecutive readings in a window (seconds).
///
/// Same interval the training data was resampled with.
pub const DEFAULT_MIN_INTERVAL_SECS: i64 = 5 * 60;

// ===== NUMERICS =====

/// Guard added to divisors (scaler range, standard deviation, threshold).
pub const EPSILON: f64 = 1e-8;

/// Reconstruction-error threshold from the reference training run
/// (95th percentile of held-out reconstruction errors).
pub const DEFAULT_THRESHOLD: f64 = 0.002044273081033603;

/// Percentile of held-out reconstruction errors used as the threshold.
pub const DEFAULT_THRESHOLD_PERCENTILE: f64 = 95.0;

/// `error > multiplier * threshold` marks a result as significantly anomalous.
pub const DEFAULT_SIGNIFICANCE_MULTIPLIER: f64 = 2.0;

// ===== STATISTICAL CLASSIFICATION =====

/// Width of the empirical normal range in standard deviations (`μ ± 2σ`).
pub const NORMAL_RANGE_SIGMAS: f64 = 2.0;

/// Width of the inner band used by the unusual-combination check (`μ ± 1σ`).
pub const COMBINATION_BAND_SIGMAS: f64 = 1.0;

/// Single-feature confidence is `deviation / divisor`, clamped to 1.
pub const SINGLE_FEATURE_CONFIDENCE_DIVISOR: f64 = 2.0;

/// Combination confidence is `(dev_t + dev_h) / divisor`, clamped to 1.
pub const COMBINATION_CONFIDENCE_DIVISOR: f64 = 4.0;

/// Tukey fence multiplier for the IQR outlier filter used by dataset analysis.
pub const IQR_FENCE: f64 = 1.5;

// ===== BATCH =====

/// Number of newest readings scored by a default batch request.
pub const DEFAULT_BATCH_SIZE: usize = 5;
