//! Reconstruction Model Contract
//!
//! ## Overview
//!
//! The detector treats the reconstruction model as a black box:
//!
//! ```text
//! reconstruct(window: L × F) -> window': L × F
//! ```
//!
//! Training, architecture and weights live elsewhere. Anything that maps a
//! window to a same-shaped window can be plugged in through
//! `ReconstructionModel`.
//!
//! ## Concurrency
//!
//! Inference is CPU-bound and most runtimes are not safe to call concurrently
//! on one instance. `ModelHandle` owns the single instance behind a mutex and
//! runs each call on tokio's blocking pool, so async callers never block the
//! runtime and never overlap on the model.
//!
//! ## Bundled Models
//!
//! - `IdentityModel`: returns its input; reconstruction error is always 0
//! - `MovingAverageModel`: centered moving average per feature; a smoother
//!   that reconstructs slow climate drift well and sharp spikes poorly

use std::sync::{Arc, Mutex};
use std::time::Duration;

use climaguard_core::{NormalizedReading, Window};
use thiserror::Error;

/// Failures of a single model invocation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model failed to load: {0}")]
    Load(String),

    #[error("model returned {actual} rows for a window of {expected}")]
    Shape { expected: usize, actual: usize },

    #[error("model returned a non-finite value at row {row}")]
    NonFinite { row: usize },

    #[error("model runtime error: {0}")]
    Runtime(String),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

/// Capability `reconstruct(window) -> window'`
pub trait ReconstructionModel: Send {
    /// Reconstruct `window`; the output must have `window.len()` rows
    fn reconstruct(&mut self, window: &Window) -> Result<Vec<NormalizedReading>, ModelError>;

    /// Short name for logs
    fn name(&self) -> &str {
        "reconstruction model"
    }
}

/// Returns the window unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityModel;

impl ReconstructionModel for IdentityModel {
    fn reconstruct(&mut self, window: &Window) -> Result<Vec<NormalizedReading>, ModelError> {
        Ok(window.rows().to_vec())
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// Centered moving average over `2 * radius + 1` rows, truncated at the edges
#[derive(Debug, Clone, Copy)]
pub struct MovingAverageModel {
    radius: usize,
}

impl MovingAverageModel {
    pub fn new(radius: usize) -> Self {
        Self { radius }
    }
}

impl Default for MovingAverageModel {
    fn default() -> Self {
        // One hour either side at 5-minute spacing
        Self::new(12)
    }
}

impl ReconstructionModel for MovingAverageModel {
    fn reconstruct(&mut self, window: &Window) -> Result<Vec<NormalizedReading>, ModelError> {
        let rows = window.rows();
        let n = rows.len();

        // Prefix sums keep this O(L) regardless of radius
        let mut prefix = Vec::with_capacity(n + 1);
        prefix.push([0.0f64; 2]);
        for row in rows {
            let [a, b] = row.features();
            let [pa, pb] = prefix[prefix.len() - 1];
            prefix.push([pa + a, pb + b]);
        }

        let out = (0..n)
            .map(|i| {
                let lo = i.saturating_sub(self.radius);
                let hi = (i + self.radius + 1).min(n);
                let count = (hi - lo) as f64;
                NormalizedReading::new(
                    (prefix[hi][0] - prefix[lo][0]) / count,
                    (prefix[hi][1] - prefix[lo][1]) / count,
                )
            })
            .collect();

        Ok(out)
    }

    fn name(&self) -> &str {
        "moving average"
    }
}

/// Shared, serialized access to one model instance
#[derive(Clone)]
pub struct ModelHandle {
    model: Arc<Mutex<Box<dyn ReconstructionModel>>>,
    name: Arc<str>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle").field("name", &self.name).finish()
    }
}

impl ModelHandle {
    pub fn new<M: ReconstructionModel + 'static>(model: M) -> Self {
        let name: Arc<str> = Arc::from(model.name());
        Self {
            model: Arc::new(Mutex::new(Box::new(model))),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the model synchronously on the calling thread
    ///
    /// Validates the output shape and finiteness.
    pub fn reconstruct_blocking(&self, window: &Window) -> Result<Vec<NormalizedReading>, ModelError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| ModelError::Runtime("model mutex poisoned by an earlier panic".into()))?;
        let output = model.reconstruct(window)?;
        drop(model);

        if output.len() != window.len() {
            return Err(ModelError::Shape {
                expected: window.len(),
                actual: output.len(),
            });
        }
        if let Some(row) = output
            .iter()
            .position(|r| !r.feature_0.is_finite() || !r.feature_1.is_finite())
        {
            return Err(ModelError::NonFinite { row });
        }

        Ok(output)
    }

    /// Run the model on the blocking pool, optionally bounded by `timeout`
    ///
    /// On timeout the in-flight call finishes in the background and its
    /// result is discarded.
    pub async fn reconstruct(
        &self,
        window: Window,
        timeout: Option<Duration>,
    ) -> Result<Vec<NormalizedReading>, ModelError> {
        let handle = self.clone();
        let task = tokio::task::spawn_blocking(move || handle.reconstruct_blocking(&window));

        let joined = match timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| ModelError::Timeout(limit))?,
            None => task.await,
        };

        joined.map_err(|e| ModelError::Runtime(format!("inference task failed: {e}")))?
    }
}
