//! Reading types
//!
//! `Reading` is the raw tuple owned by the reading store. `NormalizedReading`
//! is its scaled two-feature form, derived per request and never persisted.

use serde::{Deserialize, Serialize};

use crate::constants::{FEATURE_COUNT, HUMIDITY_FEATURE, TEMPERATURE_FEATURE};
use crate::errors::{CoreError, CoreResult};
use crate::time::Timestamp;

/// Single temperature/humidity measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Air temperature in °C
    pub temperature: f64,
    /// Relative humidity in %
    pub humidity: f64,
    /// Capture time (UTC)
    pub timestamp: Timestamp,
}

impl Reading {
    /// Create a new reading
    pub fn new(temperature: f64, humidity: f64, timestamp: Timestamp) -> Self {
        Self {
            temperature,
            humidity,
            timestamp,
        }
    }

    /// Raw feature vector in model order
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        out[TEMPERATURE_FEATURE] = self.temperature;
        out[HUMIDITY_FEATURE] = self.humidity;
        out
    }

    /// Reject NaN and infinite values before they reach the scaler
    pub fn check_finite(&self) -> CoreResult<()> {
        if !self.temperature.is_finite() {
            return Err(CoreError::InvalidValue { field: "temperature" });
        }
        if !self.humidity.is_finite() {
            return Err(CoreError::InvalidValue { field: "humidity" });
        }
        Ok(())
    }
}

/// Scaled feature vector; ideally within `[0, 1]` but never clipped
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedReading {
    /// Scaled temperature
    pub feature_0: f64,
    /// Scaled humidity
    pub feature_1: f64,
}

impl NormalizedReading {
    pub fn new(feature_0: f64, feature_1: f64) -> Self {
        Self { feature_0, feature_1 }
    }

    pub fn from_features(features: [f64; FEATURE_COUNT]) -> Self {
        Self {
            feature_0: features[TEMPERATURE_FEATURE],
            feature_1: features[HUMIDITY_FEATURE],
        }
    }

    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        out[TEMPERATURE_FEATURE] = self.feature_0;
        out[HUMIDITY_FEATURE] = self.feature_1;
        out
    }

    /// True when every feature lies inside the offline-fit range
    pub fn within_unit_range(&self) -> bool {
        self.features().iter().all(|v| (0.0..=1.0).contains(v))
    }

    /// Squared euclidean distance to another row
    pub fn squared_distance(&self, other: &NormalizedReading) -> f64 {
        self.features()
            .iter()
            .zip(other.features().iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn features_follow_model_order() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let reading = Reading::new(21.5, 40.0, ts);
        assert_eq!(reading.features(), [21.5, 40.0]);
    }

    #[test]
    fn non_finite_values_rejected() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(Reading::new(21.5, 40.0, ts).check_finite().is_ok());
        assert_eq!(
            Reading::new(f64::NAN, 40.0, ts).check_finite(),
            Err(CoreError::InvalidValue { field: "temperature" })
        );
        assert_eq!(
            Reading::new(20.0, f64::INFINITY, ts).check_finite(),
            Err(CoreError::InvalidValue { field: "humidity" })
        );
    }

    #[test]
    fn unit_range_check() {
        assert!(NormalizedReading::new(0.0, 1.0).within_unit_range());
        assert!(!NormalizedReading::new(1.2, 0.5).within_unit_range());
        assert!(!NormalizedReading::new(0.5, -0.01).within_unit_range());
    }

    #[test]
    fn distance_between_rows() {
        let a = NormalizedReading::new(0.5, 0.5);
        let b = NormalizedReading::new(1.0, 0.0);
        assert!((a.squared_distance(&b) - 0.5).abs() < 1e-12);
    }
}
