//! Offline-produced artifacts the detector loads once at startup
//!
//! | Artifact  | Missing                         | Malformed          |
//! |-----------|---------------------------------|--------------------|
//! | scaler    | unloaded; requests get `ModelNotReady` | fatal       |
//! | threshold | config fallback, `warn!`        | config fallback, `warn!` |
//! | stats     | classifier answers `unknown`, `warn!` | same, `warn!` |

use std::path::Path;

use climaguard_core::{DatasetStats, FeatureScaler, ScalerParams};
use serde::Deserialize;

use crate::config::DetectorConfig;
use crate::error::{DetectorError, DetectorResult};

/// Scaler, threshold and optional dataset statistics
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub scaler: FeatureScaler,
    pub threshold: f64,
    pub stats: Option<DatasetStats>,
}

impl ModelArtifacts {
    /// Assemble artifacts already in memory
    pub fn new(scaler: FeatureScaler, threshold: f64, stats: Option<DatasetStats>) -> Self {
        Self { scaler, threshold, stats }
    }

    /// Load every artifact named in `config`
    pub fn load(config: &DetectorConfig) -> DetectorResult<Self> {
        let scaler = match &config.scaler_path {
            Some(path) => load_scaler(path)?,
            None => {
                log::warn!("No scaler configured; scoring requests will fail until one is loaded");
                FeatureScaler::unloaded()
            }
        };

        let threshold = match &config.threshold_path {
            Some(path) => match load_threshold(path) {
                Ok(threshold) => threshold,
                Err(err) => {
                    log::warn!("{err}; using configured threshold {}", config.threshold);
                    config.threshold
                }
            },
            None => config.threshold,
        };

        let stats = config.stats_path.as_ref().and_then(|path| match DatasetStats::load(path) {
            Ok(stats) => Some(stats),
            Err(err) => {
                log::warn!("Dataset statistics unavailable ({err}); anomalies will be classified as unknown");
                None
            }
        });

        Ok(Self { scaler, threshold, stats })
    }
}

fn load_scaler(path: &Path) -> DetectorResult<FeatureScaler> {
    match ScalerParams::load(path) {
        Ok(params) => Ok(FeatureScaler::new(params)),
        Err(err) if err.is_not_found() => {
            log::warn!("Scaler file {} not found; detector starts unloaded", path.display());
            Ok(FeatureScaler::unloaded())
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ThresholdDocument {
    Bare(f64),
    Wrapped { threshold: f64 },
}

/// Parse a threshold artifact: a JSON number or `{"threshold": x}`
pub fn parse_threshold(content: &str) -> Result<f64, String> {
    let document: ThresholdDocument =
        serde_json::from_str(content.trim()).map_err(|e| format!("expected a number: {e}"))?;
    let threshold = match document {
        ThresholdDocument::Bare(value) | ThresholdDocument::Wrapped { threshold: value } => value,
    };
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(format!("threshold must be positive, got {threshold}"));
    }
    Ok(threshold)
}

/// Read a threshold artifact
pub fn load_threshold(path: impl AsRef<Path>) -> DetectorResult<f64> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| DetectorError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let threshold = parse_threshold(&content).map_err(|reason| DetectorError::Json {
        path: path.display().to_string(),
        reason,
    })?;
    log::info!("Loaded threshold {threshold} from {}", path.display());
    Ok(threshold)
}

impl From<ScalerParams> for ModelArtifacts {
    fn from(params: ScalerParams) -> Self {
        Self::new(FeatureScaler::new(params), climaguard_core::constants::DEFAULT_THRESHOLD, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_formats() {
        assert_eq!(parse_threshold("0.0025"), Ok(0.0025));
        assert_eq!(parse_threshold(r#"{"threshold": 0.5}"#), Ok(0.5));
        assert!(parse_threshold("-1").is_err());
        assert!(parse_threshold("\"high\"").is_err());
    }
}
