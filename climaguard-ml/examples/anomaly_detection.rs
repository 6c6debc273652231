//! ClimaGuard Anomaly Detection Example
//!
//! Simulates two days of indoor climate readings, fits the offline
//! artifacts (scaler, statistics, threshold) from the first day, then scores
//! a few incoming readings against the stored history:
//! - an ordinary reading that follows the daily cycle
//! - a heat spike (radiator stuck on)
//! - a humid cold snap (window left open in the rain)
//!
//! Run with `RUST_LOG=debug` to see each pipeline step.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use climaguard_connectors::{MemoryStore, ReadingSink};
use climaguard_core::{DatasetAnalysis, FeatureScaler, Reading, ScalerParams, SequenceAssembler, Timestamp};
use climaguard_ml::{
    percentile_threshold, AnomalyDetector, DetectorConfig, ModelArtifacts, ModelHandle, MovingAverageModel,
    ReconstructionScorer,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WINDOW_LENGTH: usize = 48;

/// Indoor climate with a daily cycle and sensor noise
struct ClimateSimulator {
    rng: StdRng,
    time: Timestamp,
}

impl ClimateSimulator {
    fn new(start: Timestamp) -> Self {
        Self {
            rng: StdRng::seed_from_u64(7),
            time: start,
        }
    }

    fn next(&mut self) -> Reading {
        let hours = (self.time.timestamp() % 86_400) as f64 / 3600.0;
        let cycle = (hours / 24.0 * std::f64::consts::TAU).sin();

        let temperature = 21.5 + 2.0 * cycle + self.rng.gen_range(-0.2..0.2);
        let humidity = 48.0 - 4.0 * cycle + self.rng.gen_range(-0.8..0.8);
        let reading = Reading::new(temperature, humidity, self.time);

        // Irregular reporting, 4 to 6 minutes apart
        self.time = self.time + Duration::seconds(self.rng.gen_range(240..=360));
        reading
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let start = Utc.timestamp_opt(1_700_000_000, 0).single().ok_or("invalid start time")?;
    let mut simulator = ClimateSimulator::new(start);

    // Day one: the "training" data the artifacts are fit on
    let training: Vec<Reading> = (0..288).map(|_| simulator.next()).collect();
    let params = ScalerParams::fit(&training)?;
    let analysis = DatasetAnalysis::run(&training)?;
    println!(
        "Fitted on {} readings ({} outliers removed): temperature {:.1}±{:.1}, humidity {:.1}±{:.1}",
        analysis.total,
        analysis.outliers_removed,
        analysis.stats.temperature.mean,
        analysis.stats.temperature.std,
        analysis.stats.humidity.mean,
        analysis.stats.humidity.std,
    );

    // Threshold: 95th percentile of reconstruction errors over day one
    let scaler = FeatureScaler::new(params);
    let assembler = SequenceAssembler::new(WINDOW_LENGTH)?;
    let model = ModelHandle::new(MovingAverageModel::new(3));
    let calibration = ReconstructionScorer::new(model.clone(), 1.0)?;
    let mut errors = Vec::new();
    for end in WINDOW_LENGTH..training.len() {
        let assembled = assembler.assemble(&scaler, &training[end], &training[end - WINDOW_LENGTH + 1..end])?;
        errors.push(calibration.evaluate_blocking(&assembled.window)?.error);
    }
    let threshold = percentile_threshold(&errors, 95.0).ok_or("no calibration windows")?;
    println!("Calibrated threshold: {threshold:.6}");

    // Day two goes into the store as live history
    let store = Arc::new(MemoryStore::with_readings(training));
    for _ in 0..144 {
        store.insert(simulator.next()).await?;
    }

    let config = DetectorConfig::new().window_length(WINDOW_LENGTH).store_timeout_ms(1_000);
    let artifacts = ModelArtifacts::new(scaler, threshold, Some(analysis.stats));
    let detector = AnomalyDetector::new(store.clone(), model, artifacts, config)?;

    let ordinary = simulator.next();
    let mut spike = simulator.next();
    spike.temperature += 9.0;
    let mut cold_snap = simulator.next();
    cold_snap.temperature -= 3.0;
    cold_snap.humidity += 30.0;

    for (label, reading) in [("ordinary", ordinary), ("heat spike", spike), ("cold snap", cold_snap)] {
        let result = detector.detect(&reading).await?;
        print!(
            "{label:>10}: {:5.1}°C {:5.1}% error={:.6} ",
            reading.temperature, reading.humidity, result.reconstruction_error
        );
        match &result.diagnosis {
            Some(diagnosis) => println!(
                "ANOMALY {} (confidence {:.2}, {:.1}x threshold)",
                diagnosis.classification.anomaly_type,
                diagnosis.classification.confidence,
                diagnosis.error_analysis.error_ratio
            ),
            None => println!("normal"),
        }
        store.insert(reading).await?;
    }

    println!("\nLatest five, newest first:");
    for response in detector.detect_recent(None).await? {
        println!("  {}", serde_json::to_string(&response)?);
    }

    let day_two = detector
        .analyze_interval(start + Duration::hours(24), start + Duration::hours(48))
        .await?;
    println!("\nDay two statistical summary: {}", serde_json::to_string(&day_two.counts)?);

    Ok(())
}
