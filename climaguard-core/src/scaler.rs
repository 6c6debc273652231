//! Min-Max Feature Scaling Consistent with the Offline Fit
//!
//! ## Overview
//!
//! The reconstruction model only ever saw readings normalized with the scaler
//! fit during training. The online pipeline has to reproduce that affine map
//! exactly:
//!
//! ```text
//! scale[f]  = 1 / (data_range[f] + ε)
//! offset[f] = -data_min[f] * scale[f]
//! out[f]    = raw[f] * scale[f] + offset[f]
//! ```
//!
//! No clipping is applied. A live value outside the fitting range produces a
//! normalized value outside `[0, 1]`, which is legal output.
//!
//! ## Persisted Format
//!
//! The scaler is stored as two numeric arrays, `data_range` then `data_min`.
//! Two layouts exist in the wild:
//!
//! ```text
//! [40.0,100.0][0.0,0.0]        two arrays written back to back
//! [[40.0,100.0],[0.0,0.0]]     one nested array
//! ```
//!
//! The first comes from an older writer that serialized each array separately
//! into the same file. Both are read; only the nested layout is ever written.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{EPSILON, FEATURE_COUNT};
use crate::errors::{CoreError, CoreResult};
use crate::reading::{NormalizedReading, Reading};

/// Offline-fit normalization parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// Per-feature minimum seen during fitting
    pub data_min: [f64; FEATURE_COUNT],
    /// Per-feature `max - min` seen during fitting
    pub data_range: [f64; FEATURE_COUNT],
}

impl ScalerParams {
    pub fn new(data_min: [f64; FEATURE_COUNT], data_range: [f64; FEATURE_COUNT]) -> Self {
        Self { data_min, data_range }
    }

    /// Fit parameters over a dataset (per-feature min and range)
    pub fn fit(readings: &[Reading]) -> CoreResult<Self> {
        if readings.is_empty() {
            return Err(CoreError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let mut min = [f64::INFINITY; FEATURE_COUNT];
        let mut max = [f64::NEG_INFINITY; FEATURE_COUNT];
        for reading in readings {
            reading.check_finite()?;
            for (f, value) in reading.features().iter().enumerate() {
                min[f] = min[f].min(*value);
                max[f] = max[f].max(*value);
            }
        }

        let mut range = [0.0; FEATURE_COUNT];
        for f in 0..FEATURE_COUNT {
            range[f] = max[f] - min[f];
        }

        Ok(Self::new(min, range))
    }

    /// Multiplicative term per feature
    pub fn scale(&self) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (f, range) in self.data_range.iter().enumerate() {
            out[f] = 1.0 / (range + EPSILON);
        }
        out
    }

    /// Additive term per feature
    pub fn offset(&self) -> [f64; FEATURE_COUNT] {
        let scale = self.scale();
        let mut out = [0.0; FEATURE_COUNT];
        for (f, min) in self.data_min.iter().enumerate() {
            out[f] = -min * scale[f];
        }
        out
    }

    /// Parse persisted scaler content in either accepted layout
    ///
    /// If the content contains `"]["` it is split there: the first half is
    /// `data_range`, the second `data_min`. Otherwise it must be a single
    /// two-element array `[data_range, data_min]`.
    pub fn parse(content: &str) -> CoreResult<Self> {
        let content = content.trim();

        let (data_range, data_min) = match content.split_once("][") {
            Some((range_part, min_part)) => {
                let range_str = format!("{range_part}]");
                let min_str = format!("[{min_part}");
                (parse_feature_array(&range_str)?, parse_feature_array(&min_str)?)
            }
            None => {
                let arrays: Vec<Vec<f64>> = serde_json::from_str(content)
                    .map_err(|e| CoreError::malformed_scaler(format!("expected [[range],[min]]: {e}")))?;
                if arrays.len() != 2 {
                    return Err(CoreError::malformed_scaler(format!(
                        "expected 2 arrays, found {}",
                        arrays.len()
                    )));
                }
                (to_feature_array(&arrays[0])?, to_feature_array(&arrays[1])?)
            }
        };

        Ok(Self::new(data_min, data_range))
    }

    /// Read and parse a scaler file
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let params = Self::parse(&content)?;
        log::info!(
            "Loaded scaler from {}: min={:?} range={:?}",
            path.display(),
            params.data_min,
            params.data_range
        );
        Ok(params)
    }

    /// Serialize in the nested layout `[[range],[min]]`
    pub fn to_json(&self) -> String {
        serde_json::json!([self.data_range, self.data_min]).to_string()
    }

    /// Write the nested layout to disk
    pub fn save(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()).map_err(|e| CoreError::io(path, e))
    }
}

fn parse_feature_array(s: &str) -> CoreResult<[f64; FEATURE_COUNT]> {
    let values: Vec<f64> = serde_json::from_str(s)
        .map_err(|e| CoreError::malformed_scaler(format!("array {s:?}: {e}")))?;
    to_feature_array(&values)
}

fn to_feature_array(values: &[f64]) -> CoreResult<[f64; FEATURE_COUNT]> {
    if values.len() != FEATURE_COUNT {
        return Err(CoreError::malformed_scaler(format!(
            "expected {FEATURE_COUNT} values per array, found {}",
            values.len()
        )));
    }
    let mut out = [0.0; FEATURE_COUNT];
    out.copy_from_slice(values);
    Ok(out)
}

/// Applies `ScalerParams` to readings
///
/// Holds `None` until parameters are loaded; every transform then fails with
/// `ModelNotReady` instead of producing unscaled values.
#[derive(Debug, Clone, Default)]
pub struct FeatureScaler {
    params: Option<ScalerParams>,
    scale: [f64; FEATURE_COUNT],
    offset: [f64; FEATURE_COUNT],
}

impl FeatureScaler {
    /// Scaler with no parameters loaded
    pub fn unloaded() -> Self {
        Self::default()
    }

    pub fn new(params: ScalerParams) -> Self {
        Self {
            scale: params.scale(),
            offset: params.offset(),
            params: Some(params),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.params.is_some()
    }

    pub fn params(&self) -> Option<&ScalerParams> {
        self.params.as_ref()
    }

    fn ensure_ready(&self) -> CoreResult<()> {
        if self.params.is_none() {
            return Err(CoreError::ModelNotReady {
                component: "feature scaler",
            });
        }
        Ok(())
    }

    /// Normalize a raw reading
    pub fn scale(&self, reading: &Reading) -> CoreResult<NormalizedReading> {
        self.ensure_ready()?;
        reading.check_finite()?;

        let raw = reading.features();
        let mut out = [0.0; FEATURE_COUNT];
        for f in 0..FEATURE_COUNT {
            out[f] = raw[f] * self.scale[f] + self.offset[f];
        }
        Ok(NormalizedReading::from_features(out))
    }

    /// Map a normalized row back to raw `[temperature, humidity]`
    pub fn unscale(&self, normalized: &NormalizedReading) -> CoreResult<[f64; FEATURE_COUNT]> {
        self.ensure_ready()?;

        let values = normalized.features();
        let mut out = [0.0; FEATURE_COUNT];
        for f in 0..FEATURE_COUNT {
            out[f] = (values[f] - self.offset[f]) / self.scale[f];
        }
        Ok(out)
    }
}

impl From<ScalerParams> for FeatureScaler {
    fn from(params: ScalerParams) -> Self {
        Self::new(params)
    }
}
