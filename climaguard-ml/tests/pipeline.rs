//! End-to-end detection through store, assembler, model and classifier

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use climaguard_connectors::{CachedReadingStore, Direction, MemoryStore, ReadingStore, StoreError, StoreResult};
use climaguard_core::{
    AnomalyType, DatasetStats, FeatureScaler, FeatureStats, NormalizedReading, Reading, ScalerParams, Timestamp,
    Window,
};
use climaguard_ml::{
    AnomalyDetector, DetectorConfig, DetectorError, IdentityModel, ModelArtifacts, ModelError, ModelHandle,
    ReconstructionModel,
};

fn at(minutes: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
}

fn scaler() -> FeatureScaler {
    FeatureScaler::new(ScalerParams::new([0.0, 0.0], [40.0, 100.0]))
}

fn stats() -> DatasetStats {
    DatasetStats::new(FeatureStats::from_moments(20.0, 2.0), FeatureStats::from_moments(50.0, 5.0)).unwrap()
}

fn detector_with(
    store: Arc<dyn ReadingStore>,
    model: ModelHandle,
    threshold: f64,
    config: DetectorConfig,
) -> AnomalyDetector {
    let artifacts = ModelArtifacts::new(scaler(), threshold, Some(stats()));
    AnomalyDetector::new(store, model, artifacts, config).unwrap()
}

fn small_config() -> DetectorConfig {
    DetectorConfig::new().window_length(4)
}

/// Records the last window it was asked to reconstruct
#[derive(Clone, Default)]
struct RecordingModel {
    seen: Arc<Mutex<Option<Window>>>,
}

impl ReconstructionModel for RecordingModel {
    fn reconstruct(&mut self, window: &Window) -> Result<Vec<NormalizedReading>, ModelError> {
        *self.seen.lock().unwrap() = Some(window.clone());
        Ok(window.rows().to_vec())
    }
}

/// Shifts every feature by a constant
struct OffsetModel(f64);

impl ReconstructionModel for OffsetModel {
    fn reconstruct(&mut self, window: &Window) -> Result<Vec<NormalizedReading>, ModelError> {
        Ok(window
            .iter()
            .map(|r| NormalizedReading::new(r.feature_0 + self.0, r.feature_1 + self.0))
            .collect())
    }
}

struct SlowModel(StdDuration);

impl ReconstructionModel for SlowModel {
    fn reconstruct(&mut self, window: &Window) -> Result<Vec<NormalizedReading>, ModelError> {
        std::thread::sleep(self.0);
        Ok(window.rows().to_vec())
    }
}

struct FailingStore;

#[async_trait]
impl ReadingStore for FailingStore {
    async fn fetch_ordered(&self, _limit: usize, _direction: Direction) -> StoreResult<Vec<Reading>> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn fetch_range(&self, _start: Timestamp, _end: Timestamp) -> StoreResult<Vec<Reading>> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn count(&self) -> StoreResult<usize> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

struct SlowStore(MemoryStore);

#[async_trait]
impl ReadingStore for SlowStore {
    async fn fetch_ordered(&self, limit: usize, direction: Direction) -> StoreResult<Vec<Reading>> {
        tokio::time::sleep(StdDuration::from_millis(500)).await;
        self.0.fetch_ordered(limit, direction).await
    }

    async fn fetch_range(&self, start: Timestamp, end: Timestamp) -> StoreResult<Vec<Reading>> {
        tokio::time::sleep(StdDuration::from_millis(500)).await;
        self.0.fetch_range(start, end).await
    }

    async fn count(&self) -> StoreResult<usize> {
        self.0.count().await
    }
}

#[tokio::test]
async fn cold_start_with_identity_model_is_normal() {
    let model = RecordingModel::default();
    let seen = model.seen.clone();
    let detector = detector_with(Arc::new(MemoryStore::new()), ModelHandle::new(model), 0.002, small_config());

    let result = detector.detect(&Reading::new(20.0, 50.0, at(0))).await.unwrap();

    assert_eq!(result.reconstruction_error, 0.0);
    assert!(!result.is_anomalous);
    assert!(result.diagnosis.is_none());
    assert_eq!(result.history.padded, 3);

    let window = seen.lock().unwrap().clone().unwrap();
    assert_eq!(window.len(), 4);
    for row in window.iter() {
        assert!((row.feature_0 - 0.5).abs() < 1e-6);
        assert!((row.feature_1 - 0.5).abs() < 1e-6);
    }
}

#[tokio::test]
async fn single_historical_reading_pads_the_front() {
    let store = MemoryStore::with_readings(vec![Reading::new(10.0, 30.0, at(0))]);
    let model = RecordingModel::default();
    let seen = model.seen.clone();
    let detector = detector_with(Arc::new(store), ModelHandle::new(model), 0.002, small_config());

    let result = detector.detect(&Reading::new(20.0, 50.0, at(5))).await.unwrap();
    assert_eq!(result.history.available, 1);
    assert_eq!(result.history.padded, 2);

    let window = seen.lock().unwrap().clone().unwrap();
    let rows = window.rows();
    assert_eq!(rows[0], rows[2]);
    assert_eq!(rows[1], rows[2]);
    assert!((rows[2].feature_0 - 0.25).abs() < 1e-6);
    assert!((rows[3].feature_0 - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn dense_history_is_resampled_before_windowing() {
    // One reading per minute, the scored one included; only every fifth
    // survives resampling
    let readings: Vec<Reading> = (0..=30).map(|i| Reading::new(10.0 + i as f64 * 0.4, 50.0, at(i))).collect();
    let store = MemoryStore::with_readings(readings);
    let model = RecordingModel::default();
    let seen = model.seen.clone();
    let detector = detector_with(Arc::new(store), ModelHandle::new(model), 0.002, small_config());

    let result = detector.detect(&Reading::new(22.0, 50.0, at(30))).await.unwrap();

    // Minutes 0..=29 are looked up, thinned from 29 down to 29, 24, 19, ..
    assert_eq!(result.history.available, 3);
    assert_eq!(result.history.padded, 0);

    let window = seen.lock().unwrap().clone().unwrap();
    let temperatures: Vec<f64> = window.iter().map(|r| r.feature_0 * 40.0).collect();
    for (got, minute) in temperatures.iter().zip([19.0, 24.0, 29.0, 30.0]) {
        assert!((got - (10.0 + minute * 0.4)).abs() < 1e-6, "{temperatures:?}");
    }
}

#[tokio::test]
async fn older_reading_is_scored_against_its_predecessors() {
    let readings: Vec<Reading> = (0..=20).map(|i| Reading::new(10.0 + i as f64, 50.0, at(i * 5))).collect();
    let store = MemoryStore::with_readings(readings);
    let model = RecordingModel::default();
    let seen = model.seen.clone();
    let detector = detector_with(Arc::new(store), ModelHandle::new(model), 0.002, small_config());

    // Re-score the stored reading at minute 15 after later data arrived
    let result = detector.detect(&Reading::new(13.0, 50.0, at(15))).await.unwrap();
    assert_eq!(result.history.available, 3);
    assert_eq!(result.history.padded, 0);

    // Minutes 0, 5 and 10, then the reading itself
    let window = seen.lock().unwrap().clone().unwrap();
    let temperatures: Vec<f64> = window.iter().map(|r| r.feature_0 * 40.0).collect();
    for (got, want) in temperatures.iter().zip([10.0, 11.0, 12.0, 13.0]) {
        assert!((got - want).abs() < 1e-6, "{temperatures:?}");
    }
}

#[tokio::test]
async fn unavailable_store_degrades_to_empty_history() {
    let detector = detector_with(Arc::new(FailingStore), ModelHandle::new(IdentityModel), 0.002, small_config());

    let result = detector.detect(&Reading::new(20.0, 50.0, at(0))).await.unwrap();
    assert_eq!(result.history.available, 0);
    assert!(result.is_low_confidence());
}

#[tokio::test]
async fn slow_store_times_out_to_empty_history() {
    let store = SlowStore(MemoryStore::with_readings(vec![Reading::new(20.0, 50.0, at(0))]));
    let config = small_config().store_timeout_ms(20);
    let detector = detector_with(Arc::new(store), ModelHandle::new(IdentityModel), 0.002, config);

    let result = detector.detect(&Reading::new(20.0, 50.0, at(5))).await.unwrap();
    assert_eq!(result.history.available, 0);
}

#[tokio::test]
async fn unavailable_store_fails_latest_detection() {
    let detector = detector_with(Arc::new(FailingStore), ModelHandle::new(IdentityModel), 0.002, small_config());
    let err = detector.detect_latest().await.unwrap_err();
    assert!(matches!(err, DetectorError::Store(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn threshold_boundaries_are_strict() {
    let reading = Reading::new(20.0, 50.0, at(0));
    let store: Arc<dyn ReadingStore> = Arc::new(MemoryStore::new());

    let baseline = detector_with(store.clone(), ModelHandle::new(OffsetModel(0.5)), 0.002, small_config());
    let error = baseline.detect(&reading).await.unwrap().reconstruction_error;
    assert!((error - 0.25).abs() < 1e-9);

    // error == threshold: normal
    let at_threshold = detector_with(store.clone(), ModelHandle::new(OffsetModel(0.5)), error, small_config());
    assert!(!at_threshold.detect(&reading).await.unwrap().is_anomalous);

    // error == 2 * threshold: anomalous but not significant
    let half = detector_with(store, ModelHandle::new(OffsetModel(0.5)), error / 2.0, small_config());
    let result = half.detect(&reading).await.unwrap();
    assert!(result.is_anomalous);
    let analysis = result.diagnosis.unwrap().error_analysis;
    assert!(!analysis.is_significantly_anomalous);
    assert!((analysis.error_ratio - 2.0).abs() < 1e-6);
}

#[tokio::test]
async fn anomalous_reading_is_classified() {
    let detector = detector_with(
        Arc::new(MemoryStore::new()),
        ModelHandle::new(OffsetModel(0.5)),
        0.002,
        small_config(),
    );

    let result = detector.detect(&Reading::new(30.0, 80.0, at(0))).await.unwrap();
    let diagnosis = result.diagnosis.as_ref().unwrap();

    // Temperature rules take precedence over humidity
    assert_eq!(diagnosis.classification.anomaly_type, AnomalyType::HighTemperature);
    assert_eq!(diagnosis.classification.confidence, 1.0);
    assert!(diagnosis.error_analysis.is_significantly_anomalous);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["diagnosis"]["classification"]["type"], "high_temperature");
    assert_eq!(json["diagnosis"]["classification"]["details"]["temperature"]["value"], 30.0);
}

#[tokio::test]
async fn unloaded_scaler_is_not_ready() {
    let artifacts = ModelArtifacts::new(FeatureScaler::unloaded(), 0.002, None);
    let detector = AnomalyDetector::new(
        Arc::new(MemoryStore::new()),
        ModelHandle::new(IdentityModel),
        artifacts,
        small_config(),
    )
    .unwrap();

    assert!(!detector.is_ready());
    let err = detector.detect(&Reading::new(20.0, 50.0, at(0))).await.unwrap_err();
    assert!(matches!(err, DetectorError::ModelNotReady { .. }));
}

#[tokio::test]
async fn slow_model_is_a_scoring_error() {
    let config = small_config().model_timeout_ms(20);
    let detector = detector_with(
        Arc::new(MemoryStore::new()),
        ModelHandle::new(SlowModel(StdDuration::from_millis(300))),
        0.002,
        config,
    );

    let err = detector.detect(&Reading::new(20.0, 50.0, at(0))).await.unwrap_err();
    assert!(matches!(err, DetectorError::Scoring(ModelError::Timeout(_))));
}

#[tokio::test]
async fn batch_reports_partial_failures() {
    let detector = detector_with(Arc::new(MemoryStore::new()), ModelHandle::new(IdentityModel), 0.002, small_config());
    let readings = [
        Reading::new(20.0, 50.0, at(0)),
        Reading::new(f64::NAN, 50.0, at(5)),
        Reading::new(21.0, 49.0, at(10)),
    ];

    let responses = detector.detect_batch(&readings).await;

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0].message, "Normal");
    assert!(responses[1].message.starts_with("Error processing measurement:"));
    assert!(!responses[1].is_anomalous);
    assert!(responses[1].reconstruction_error.is_none());
    assert_eq!(responses[2].message, "Normal");
}

#[tokio::test]
async fn recent_batch_is_newest_first() {
    let readings: Vec<Reading> = (0..8).map(|i| Reading::new(20.0, 50.0, at(i * 5))).collect();
    let store = MemoryStore::with_readings(readings);
    let detector = detector_with(Arc::new(store), ModelHandle::new(IdentityModel), 0.002, small_config());

    let responses = detector.detect_recent(None).await.unwrap();
    assert_eq!(responses.len(), 5);
    assert!(responses.iter().all(|r| r.message == "Normal"));

    let two = detector.detect_recent(Some(2)).await.unwrap();
    assert_eq!(two.len(), 2);
}

#[tokio::test]
async fn recent_batch_on_empty_store() {
    let detector = detector_with(Arc::new(MemoryStore::new()), ModelHandle::new(IdentityModel), 0.002, small_config());
    assert_eq!(detector.detect_recent(None).await.unwrap_err(), DetectorError::NoReadings);
}

#[tokio::test]
async fn detector_runs_over_cached_store() {
    let readings: Vec<Reading> = (0..20).map(|i| Reading::new(20.0, 50.0, at(i * 5))).collect();
    let inner = Arc::new(MemoryStore::with_readings(readings));
    let cached = CachedReadingStore::new(inner, 16, Duration::minutes(5));
    let detector = detector_with(Arc::new(cached), ModelHandle::new(IdentityModel), 0.002, small_config());

    let first = detector.detect_latest().await.unwrap();
    let second = detector.detect_latest().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.history.available, 3);
    assert!(!first.is_low_confidence());
}

#[tokio::test]
async fn concurrent_requests_share_one_detector() {
    let readings: Vec<Reading> = (0..20).map(|i| Reading::new(20.0, 50.0, at(i * 5))).collect();
    let store = Arc::new(MemoryStore::with_readings(readings));
    let detector = detector_with(store, ModelHandle::new(OffsetModel(0.01)), 0.002, small_config());

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let detector = detector.clone();
            tokio::spawn(async move { detector.detect(&Reading::new(20.0, 50.0, at(100 + i))).await })
        })
        .collect();

    for task in tasks {
        let result = task.await.unwrap().unwrap();
        assert!(!result.is_anomalous);
        assert_eq!(result.history.available, 3);
    }
}
