//! Anomaly Detector
//!
//! ## Pipeline
//!
//! ```text
//! reading ──► store.fetch_range ──► drop ts >= current ──► resample
//!                                                             │
//!   result ◄── compose ◄── classify ◄── (anomalous?) ◄── score ◄── assemble
//! ```
//!
//! History is looked up by time, `(L - 1) * min_interval * multiplier`
//! back from the scored reading, so a reading older than the newest stored
//! data still sees its own predecessors, and a dense store still fills the
//! window after thinning.
//!
//! The store fetch is the only suspension point besides inference. A store
//! failure or timeout does not fail the request: the detector scores against
//! an empty history (a fully padded window) and logs a warning.
//!
//! ## Sharing
//!
//! Every field is read-only after construction and cheap to clone, so one
//! detector can serve many concurrent tasks. Access to the model instance is
//! serialized inside `ModelHandle`.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use climaguard_connectors::{ReadingStore, StoreError, StoreResult};
use climaguard_core::{
    resample, resample_newest_first, AnomalyType, Classification, FeatureScaler, Reading, SequenceAssembler,
    StatisticalClassifier, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::artifacts::ModelArtifacts;
use crate::config::DetectorConfig;
use crate::diagnosis::{AnomalyResult, DetectionResponse, DiagnosisComposer};
use crate::error::{DetectorError, DetectorResult};
use crate::model::ModelHandle;
use crate::scoring::ReconstructionScorer;

/// Statistical label for one reading of an interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalFinding {
    pub reading: Reading,
    pub classification: Classification,
}

/// Statistical-only analysis of a time range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalAnalysis {
    pub start: Timestamp,
    pub end: Timestamp,
    /// Readings left after resampling
    pub readings_analyzed: usize,
    /// Count per label, `normal` included
    pub counts: BTreeMap<AnomalyType, usize>,
    /// Readings whose label is an anomaly, oldest first
    pub findings: Vec<IntervalFinding>,
}

impl IntervalAnalysis {
    pub fn anomaly_count(&self) -> usize {
        self.findings.len()
    }
}

/// End-to-end scorer for single readings
#[derive(Clone)]
pub struct AnomalyDetector {
    store: Arc<dyn ReadingStore>,
    scaler: Arc<FeatureScaler>,
    assembler: SequenceAssembler,
    scorer: ReconstructionScorer,
    classifier: Arc<StatisticalClassifier>,
    composer: DiagnosisComposer,
    config: Arc<DetectorConfig>,
}

impl std::fmt::Debug for AnomalyDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnomalyDetector")
            .field("window_length", &self.assembler.length())
            .field("threshold", &self.scorer.threshold())
            .field("model", &self.scorer.model().name())
            .field("scaler_ready", &self.scaler.is_ready())
            .field("stats_loaded", &self.classifier.has_stats())
            .finish()
    }
}

impl AnomalyDetector {
    /// Build from artifacts already in memory
    pub fn new(
        store: Arc<dyn ReadingStore>,
        model: ModelHandle,
        artifacts: ModelArtifacts,
        config: DetectorConfig,
    ) -> DetectorResult<Self> {
        config.validate()?;

        let assembler = SequenceAssembler::new(config.window_length)?;
        let scorer = ReconstructionScorer::new(model, artifacts.threshold)?.with_timeout(config.model_timeout());
        let classifier = StatisticalClassifier::new(artifacts.stats).with_config(config.classifier);
        let composer = DiagnosisComposer::new(config.significance_multiplier);

        log::info!(
            "Anomaly detector ready: L={}, threshold={}, model={}, stats={}",
            config.window_length,
            artifacts.threshold,
            scorer.model().name(),
            classifier.has_stats()
        );

        Ok(Self {
            store,
            scaler: Arc::new(artifacts.scaler),
            assembler,
            scorer,
            classifier: Arc::new(classifier),
            composer,
            config: Arc::new(config),
        })
    }

    /// Load artifacts from the paths in `config`, then build
    pub fn from_config(
        store: Arc<dyn ReadingStore>,
        model: ModelHandle,
        config: DetectorConfig,
    ) -> DetectorResult<Self> {
        let artifacts = ModelArtifacts::load(&config)?;
        Self::new(store, model, artifacts, config)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn threshold(&self) -> f64 {
        self.scorer.threshold()
    }

    /// True once a scaler has been loaded
    pub fn is_ready(&self) -> bool {
        self.scaler.is_ready()
    }

    /// Score one reading against the history that precedes it
    pub async fn detect(&self, current: &Reading) -> DetectorResult<AnomalyResult> {
        if !self.scaler.is_ready() {
            return Err(DetectorError::ModelNotReady {
                component: "feature scaler",
            });
        }
        current.check_finite()?;

        let history = self.history_before(current).await;
        let assembled = self.assembler.assemble(&self.scaler, current, &history)?;
        let outcome = self.scorer.evaluate(&assembled.window).await?;

        let diagnosis = outcome.is_anomalous.then(|| {
            let classification = self.classifier.classify(current.temperature, current.humidity);
            self.composer.compose(outcome.error, outcome.threshold, classification)
        });

        log::debug!(
            "Scored reading at {}: error={:.6} anomalous={} history={}/{}",
            current.timestamp,
            outcome.error,
            outcome.is_anomalous,
            assembled.coverage.available,
            assembled.coverage.required
        );

        Ok(AnomalyResult {
            is_anomalous: outcome.is_anomalous,
            reconstruction_error: outcome.error,
            threshold: outcome.threshold,
            diagnosis,
            history: assembled.coverage,
        })
    }

    /// Score the newest stored reading
    pub async fn detect_latest(&self) -> DetectorResult<AnomalyResult> {
        let latest = self.store.fetch_latest(1).await?;
        let current = latest.first().ok_or(DetectorError::NoReadings)?;
        self.detect(current).await
    }

    /// Score each reading independently
    ///
    /// One response per input, in input order. A failing item is logged and
    /// encoded in its response; it never aborts the rest.
    pub async fn detect_batch(&self, readings: &[Reading]) -> Vec<DetectionResponse> {
        let mut responses = Vec::with_capacity(readings.len());
        for reading in readings {
            let response = match self.detect(reading).await {
                Ok(result) => DetectionResponse::from(result),
                Err(err) => {
                    log::error!("Failed to score reading at {}: {err}", reading.timestamp);
                    DetectionResponse::failed(err)
                }
            };
            responses.push(response);
        }
        responses
    }

    /// Score the newest `count` stored readings, newest first
    ///
    /// `None` uses the configured batch size.
    pub async fn detect_recent(&self, count: Option<usize>) -> DetectorResult<Vec<DetectionResponse>> {
        let count = count.unwrap_or(self.config.batch_size);
        let recent = self.store.fetch_latest(count).await?;
        if recent.is_empty() {
            return Err(DetectorError::NoReadings);
        }
        Ok(self.detect_batch(&recent).await)
    }

    /// Label every reading in `[start, end]` with the statistical rules only
    ///
    /// The range is resampled first. No reconstruction scoring is done.
    pub async fn analyze_interval(&self, start: Timestamp, end: Timestamp) -> DetectorResult<IntervalAnalysis> {
        if start > end {
            return Err(StoreError::InvalidQuery(format!("start {start} is after end {end}")).into());
        }
        let readings = self.store.fetch_range(start, end).await?;
        let readings = resample(&readings, self.config.min_interval());

        let mut counts = BTreeMap::new();
        let mut findings = Vec::new();
        for reading in &readings {
            let classification = self.classifier.classify(reading.temperature, reading.humidity);
            *counts.entry(classification.anomaly_type).or_insert(0) += 1;
            if classification.anomaly_type.is_anomaly() {
                findings.push(IntervalFinding {
                    reading: *reading,
                    classification,
                });
            }
        }

        log::info!(
            "Interval {start}..{end}: {} readings, {} anomalies",
            readings.len(),
            findings.len()
        );

        Ok(IntervalAnalysis {
            start,
            end,
            readings_analyzed: readings.len(),
            counts,
            findings,
        })
    }

    /// Statistical classification without scoring
    pub fn classify(&self, temperature: f64, humidity: f64) -> Classification {
        self.classifier.classify(temperature, humidity)
    }

    /// Resampled history strictly before `current`, oldest first
    ///
    /// Never fails: store errors and timeouts yield an empty history.
    async fn history_before(&self, current: &Reading) -> Vec<Reading> {
        let span = self.config.history_span();
        if span <= chrono::Duration::zero() {
            return Vec::new();
        }
        let start = current
            .timestamp
            .checked_sub_signed(span)
            .unwrap_or(Timestamp::MIN_UTC);

        let fetch = self.store.fetch_range(start, current.timestamp);
        let fetched = match self.with_store_timeout(fetch).await {
            Ok(readings) => readings,
            Err(err) => {
                log::warn!("History fetch failed ({err}); scoring without history");
                return Vec::new();
            }
        };

        let mut earlier: Vec<Reading> = fetched
            .into_iter()
            .filter(|r| r.timestamp < current.timestamp)
            .collect();
        earlier.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        resample_newest_first(&earlier, self.config.min_interval())
    }

    async fn with_store_timeout<T>(&self, fetch: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match self.config.store_timeout() {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| StoreError::Timeout)?,
            None => fetch.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IdentityModel;
    use chrono::{Duration, TimeZone, Utc};
    use climaguard_connectors::MemoryStore;
    use climaguard_core::{DatasetStats, FeatureStats, ScalerParams};

    fn detector(store: MemoryStore, stats: Option<DatasetStats>) -> AnomalyDetector {
        let scaler = FeatureScaler::new(ScalerParams::new([0.0, 0.0], [40.0, 100.0]));
        let artifacts = ModelArtifacts::new(scaler, 0.002, stats);
        let config = DetectorConfig::new().window_length(4);
        AnomalyDetector::new(Arc::new(store), ModelHandle::new(IdentityModel), artifacts, config).unwrap()
    }

    fn stats() -> DatasetStats {
        DatasetStats::new(FeatureStats::from_moments(20.0, 2.0), FeatureStats::from_moments(50.0, 5.0)).unwrap()
    }

    fn at(minutes: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    #[tokio::test]
    async fn future_readings_are_not_history() {
        let store = MemoryStore::with_readings(vec![
            Reading::new(20.0, 50.0, at(0)),
            Reading::new(20.0, 50.0, at(10)),
            Reading::new(20.0, 50.0, at(20)),
        ]);
        let result = detector(store, None).detect(&Reading::new(20.0, 50.0, at(10))).await.unwrap();
        assert_eq!(result.history.available, 1);
        assert!(result.is_low_confidence());
    }

    #[tokio::test]
    async fn older_reading_sees_its_own_predecessors() {
        let readings: Vec<Reading> = (0..=20).map(|i| Reading::new(20.0, 50.0, at(i * 5))).collect();
        let store = MemoryStore::with_readings(readings);

        let result = detector(store, None).detect(&Reading::new(20.0, 50.0, at(15))).await.unwrap();
        assert_eq!(result.history.available, 3);
        assert_eq!(result.history.padded, 0);
    }

    #[tokio::test]
    async fn latest_on_empty_store() {
        let err = detector(MemoryStore::new(), None).detect_latest().await.unwrap_err();
        assert_eq!(err, DetectorError::NoReadings);
    }

    #[tokio::test]
    async fn non_finite_reading_is_rejected() {
        let err = detector(MemoryStore::new(), None)
            .detect(&Reading::new(f64::NAN, 50.0, at(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::Core(_)));
    }

    #[tokio::test]
    async fn interval_counts_labels() {
        let store = MemoryStore::with_readings(vec![
            Reading::new(20.0, 50.0, at(0)),
            Reading::new(30.0, 50.0, at(1)),
            Reading::new(30.0, 50.0, at(10)),
            Reading::new(20.0, 70.0, at(20)),
        ]);
        let analysis = detector(store, Some(stats())).analyze_interval(at(0), at(20)).await.unwrap();

        // The reading at minute 1 is thinned away
        assert_eq!(analysis.readings_analyzed, 3);
        assert_eq!(analysis.counts.get(&AnomalyType::Normal), Some(&1));
        assert_eq!(analysis.counts.get(&AnomalyType::HighTemperature), Some(&1));
        assert_eq!(analysis.counts.get(&AnomalyType::HighHumidity), Some(&1));
        assert_eq!(analysis.anomaly_count(), 2);
        assert_eq!(analysis.findings[0].reading.timestamp, at(10));
    }

    #[tokio::test]
    async fn interval_rejects_inverted_range() {
        let err = detector(MemoryStore::new(), None).analyze_interval(at(10), at(0)).await.unwrap_err();
        assert!(matches!(err, DetectorError::Store(StoreError::InvalidQuery(_))));
    }

    #[test]
    fn classify_passthrough() {
        let d = detector(MemoryStore::new(), Some(stats()));
        assert_eq!(d.classify(30.0, 50.0).anomaly_type, AnomalyType::HighTemperature);
        assert_eq!(d.classify(20.0, 50.0).anomaly_type, AnomalyType::Normal);
    }
}
