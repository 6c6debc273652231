//! Paginated measurement listing
//!
//! Range filter, optional minimum-interval thinning, then pagination:
//!
//! ```text
//! readings in [start, end] (ascending)
//!   -> resample(min_interval)       if requested
//!   -> total = len
//!   -> slice [(page-1)*size, page*size)
//! ```
//!
//! Thinning runs before counting, so `total` and `total_pages` describe the
//! thinned sequence.

use chrono::{DateTime, Duration, Utc};
use climaguard_core::{resample, Reading, Timestamp};
use serde::{Deserialize, Serialize};

use crate::{ReadingStore, StoreError, StoreResult};

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size when none is given
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Listing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementQuery {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    /// Minimum spacing between listed readings
    pub min_interval: Option<Duration>,
    /// 1-based
    pub page: usize,
    pub page_size: usize,
}

impl Default for MeasurementQuery {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            min_interval: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MeasurementQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, start: Timestamp) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: Timestamp) -> Self {
        self.end = Some(end);
        self
    }

    /// Thin to at least `minutes` between readings
    pub fn min_interval_minutes(mut self, minutes: i64) -> Self {
        self.min_interval = Some(Duration::minutes(minutes));
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.page == 0 {
            return Err(StoreError::InvalidQuery("page must be at least 1".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(StoreError::InvalidQuery(format!(
                "page_size must be within 1..={MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if let Some(interval) = self.min_interval {
            if interval < Duration::minutes(1) {
                return Err(StoreError::InvalidQuery("min_interval must be at least one minute".into()));
            }
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(StoreError::InvalidQuery(format!("start {start} is after end {end}")));
            }
        }
        Ok(())
    }
}

/// One page of listed readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPage {
    pub measurements: Vec<Reading>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl MeasurementPage {
    /// Slice an already filtered sequence
    pub fn paginate(readings: Vec<Reading>, page: usize, page_size: usize) -> Self {
        let total = readings.len();
        let page_size = page_size.max(1);
        let offset = page.saturating_sub(1).saturating_mul(page_size);

        let measurements = readings.into_iter().skip(offset).take(page_size).collect();

        Self {
            measurements,
            total,
            page,
            page_size,
            total_pages: total.div_ceil(page_size),
        }
    }
}

/// List readings from any store with range, interval and pagination
pub async fn list_measurements(
    store: &(impl ReadingStore + ?Sized),
    query: &MeasurementQuery,
) -> StoreResult<MeasurementPage> {
    query.validate()?;

    let start = query.start.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = query.end.unwrap_or(DateTime::<Utc>::MAX_UTC);
    let mut readings = store.fetch_range(start, end).await?;

    if let Some(interval) = query.min_interval {
        let before = readings.len();
        readings = resample(&readings, interval);
        log::debug!("Interval filter kept {} of {} readings", readings.len(), before);
    }

    Ok(MeasurementPage::paginate(readings, query.page, query.page_size))
}
