//! HTTP Reading Store - Upstream Measurements API Client
//!
//! ## Overview
//!
//! Reads history from the measurements service that the sensor gateways post
//! to. The service exposes one paginated listing endpoint:
//!
//! ```text
//! GET /measurements/?start_time=..&end_time=..&page=N&page_size=100
//! -> { "measurements": [{id, temperature, humidity, timestamp}, ..],
//!      "total": .., "page": .., "page_size": .., "total_pages": .. }
//! ```
//!
//! Listings are always ascending, so the store contract is mapped onto page
//! walks:
//!
//! | Operation          | Pages requested                        |
//! |--------------------|----------------------------------------|
//! | `fetch_range`      | 1..=total_pages with range filter      |
//! | ascending limit N  | from page 1 until N collected          |
//! | descending limit N | from the last page backwards           |
//! | `count`            | page 1 with `page_size=1`              |
//!
//! ## Implementation Choices
//!
//! - `ureq` is a blocking client; every request runs on tokio's blocking pool
//!   via `spawn_blocking`, so an async caller is never stalled
//! - Transport failures, 5xx and 429 are retried with exponential backoff;
//!   other statuses fail immediately
//! - The service emits naive ISO timestamps (no offset); those are read as UTC
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use climaguard_connectors::http::{HttpReadingStore, HttpStoreConfig};
//! use climaguard_connectors::ReadingStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpStoreConfig::new("https://pi3.local:8000")
//!     .bearer_token("your-api-token")
//!     .timeout_secs(10)
//!     .max_retries(2);
//!
//! let store = HttpReadingStore::new(config)?;
//! let latest = store.fetch_latest(576).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use climaguard_core::{Reading, Timestamp};
use serde::{Deserialize, Serialize};

use crate::query::MAX_PAGE_SIZE;
use crate::{check_range, Direction, ReadingSink, ReadingStore, StoreError, StoreResult};

/// Authentication methods
#[derive(Clone)]
pub enum AuthMethod {
    /// No authentication
    None,
    /// Bearer token
    Bearer(String),
    /// Basic authentication
    Basic { username: String, password: String },
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials stay out of logs
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::Basic { username, .. } => write!(f, "Basic({username}:***)"),
        }
    }
}

/// HTTP store configuration
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the measurements service
    pub base_url: String,
    /// Path of the listing endpoint
    pub measurements_path: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Authentication method
    pub auth: AuthMethod,
    /// Custom headers
    pub headers: HashMap<String, String>,
    /// Page size used for page walks (at most 100)
    pub page_size: usize,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt
    pub retry_base: Duration,
    /// User agent string
    pub user_agent: String,
}

impl HttpStoreConfig {
    /// Create new configuration with base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            measurements_path: "/measurements/".into(),
            timeout: Duration::from_secs(30),
            auth: AuthMethod::None,
            headers: HashMap::new(),
            page_size: MAX_PAGE_SIZE,
            max_retries: 3,
            retry_base: Duration::from_millis(100),
            user_agent: format!("ClimaGuard/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set bearer token authentication
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthMethod::Bearer(token.into());
        self
    }

    /// Set basic authentication
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn measurements_path(mut self, path: impl Into<String>) -> Self {
        self.measurements_path = path.into();
        self
    }

    /// Add custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn validate(&self) -> StoreResult<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(StoreError::Config("Base URL must start with http:// or https://".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(StoreError::Config(format!(
                "page_size must be within 1..={MAX_PAGE_SIZE}"
            )));
        }
        if self.timeout.is_zero() {
            return Err(StoreError::Config("timeout must be positive".into()));
        }
        Ok(())
    }

    fn listing_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.measurements_path)
    }
}

// ===== WIRE FORMAT =====

#[derive(Debug, Deserialize)]
struct WirePage {
    measurements: Vec<WireMeasurement>,
    total: usize,
    total_pages: usize,
}

#[derive(Debug, Deserialize)]
struct WireMeasurement {
    temperature: f64,
    humidity: f64,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct WireCreate {
    temperature: f64,
    humidity: f64,
}

impl WireMeasurement {
    fn into_reading(self) -> StoreResult<Reading> {
        let timestamp = parse_timestamp(&self.timestamp)?;
        Ok(Reading::new(self.temperature, self.humidity, timestamp))
    }
}

/// RFC 3339, or a naive ISO timestamp taken as UTC
fn parse_timestamp(raw: &str) -> StoreResult<Timestamp> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::Protocol(format!("bad timestamp {raw:?}: {e}")))
}

fn format_timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

// ===== CLIENT =====

/// Store backed by the measurements REST API
pub struct HttpReadingStore {
    config: HttpStoreConfig,
    agent: ureq::Agent,
}

/// What a single attempt produced
enum Attempt<T> {
    Done(T),
    Retry(StoreError),
}

impl HttpReadingStore {
    /// Create new HTTP store
    pub fn new(config: HttpStoreConfig) -> StoreResult<Self> {
        config.validate()?;

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self { config, agent })
    }

    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    /// Build request with authentication and headers
    fn authorize(&self, mut request: ureq::Request) -> ureq::Request {
        match &self.config.auth {
            AuthMethod::None => {}
            AuthMethod::Bearer(token) => {
                request = request.set("Authorization", &format!("Bearer {token}"));
            }
            AuthMethod::Basic { username, password } => {
                let credentials =
                    base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
                request = request.set("Authorization", &format!("Basic {credentials}"));
            }
        }

        for (name, value) in &self.config.headers {
            request = request.set(name, value);
        }

        request.set("Accept", "application/json")
    }

    /// Run one blocking request on the blocking pool, with retry and backoff
    async fn execute<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: Fn() -> Attempt<T> + Send + Clone + 'static,
    {
        let mut last_error = StoreError::Unavailable("no attempt made".into());

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.config.retry_base, attempt);
                log::debug!("Retrying store request in {delay:?} (attempt {attempt})");
                tokio::time::sleep(delay).await;
            }

            let op = op.clone();
            let outcome = tokio::task::spawn_blocking(move || op())
                .await
                .map_err(|e| StoreError::Unavailable(format!("request task failed: {e}")))?;

            match outcome {
                Attempt::Done(value) => return Ok(value),
                Attempt::Retry(err) => {
                    log::warn!("Store request failed: {err}");
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }

    /// Fetch one listing page
    async fn page(
        &self,
        page: usize,
        page_size: usize,
        range: Option<(Timestamp, Timestamp)>,
    ) -> StoreResult<(Vec<Reading>, usize, usize)> {
        let mut request = self
            .authorize(self.agent.get(&self.config.listing_url()))
            .query("page", &page.to_string())
            .query("page_size", &page_size.to_string());
        if let Some((start, end)) = range {
            request = request
                .query("start_time", &format_timestamp(start))
                .query("end_time", &format_timestamp(end));
        }

        let wire: WirePage = self
            .execute(move || classify(request.clone().call()).and_then_json::<WirePage>())
            .await??;

        let readings = wire
            .measurements
            .into_iter()
            .map(WireMeasurement::into_reading)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok((readings, wire.total, wire.total_pages))
    }

    async fn walk(&self, range: Option<(Timestamp, Timestamp)>, limit: usize, direction: Direction) -> StoreResult<Vec<Reading>> {
        let size = self.config.page_size;
        let (first, _, total_pages) = self.page(1, size, range).await?;

        let mut out = Vec::new();
        match direction {
            Direction::Ascending => {
                out.extend(first);
                let mut page = 2;
                while out.len() < limit && page <= total_pages {
                    out.extend(self.page(page, size, range).await?.0);
                    page += 1;
                }
                out.truncate(limit);
            }
            Direction::Descending => {
                let mut page = total_pages;
                while out.len() < limit && page > 1 {
                    let (mut chunk, _, _) = self.page(page, size, range).await?;
                    chunk.reverse();
                    out.extend(chunk);
                    page -= 1;
                }
                if out.len() < limit {
                    out.extend(first.into_iter().rev());
                }
                out.truncate(limit);
            }
        }

        Ok(out)
    }
}

/// Map a ureq outcome to done / retryable / fatal
fn classify(result: Result<ureq::Response, ureq::Error>) -> Attempt<StoreResult<ureq::Response>> {
    match result {
        Ok(response) => Attempt::Done(Ok(response)),
        Err(ureq::Error::Status(code, response)) if code >= 500 || code == 429 => {
            Attempt::Retry(StoreError::Unavailable(format!(
                "server returned {code}: {}",
                response.into_string().unwrap_or_default()
            )))
        }
        Err(ureq::Error::Status(code, response)) => Attempt::Done(Err(StoreError::Protocol(format!(
            "server returned {code}: {}",
            response.into_string().unwrap_or_default()
        )))),
        Err(ureq::Error::Transport(e)) => Attempt::Retry(StoreError::Unavailable(e.to_string())),
    }
}

impl Attempt<StoreResult<ureq::Response>> {
    /// Decode a successful body; decoding errors are not retried
    fn and_then_json<T: for<'de> Deserialize<'de>>(self) -> Attempt<StoreResult<T>> {
        match self {
            Attempt::Done(Ok(response)) => Attempt::Done(
                response
                    .into_string()
                    .map_err(|e| StoreError::Protocol(format!("unreadable response body: {e}")))
                    .and_then(|body| {
                        serde_json::from_str(&body)
                            .map_err(|e| StoreError::Protocol(format!("invalid response body: {e}")))
                    }),
            ),
            Attempt::Done(Err(e)) => Attempt::Done(Err(e)),
            Attempt::Retry(e) => Attempt::Retry(e),
        }
    }
}

#[async_trait::async_trait]
impl ReadingStore for HttpReadingStore {
    async fn fetch_ordered(&self, limit: usize, direction: Direction) -> StoreResult<Vec<Reading>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.walk(None, limit, direction).await
    }

    async fn fetch_range(&self, start: Timestamp, end: Timestamp) -> StoreResult<Vec<Reading>> {
        check_range(start, end)?;
        self.walk(Some((start, end)), usize::MAX, Direction::Ascending).await
    }

    async fn count(&self) -> StoreResult<usize> {
        let (_, total, _) = self.page(1, 1, None).await?;
        Ok(total)
    }
}

#[async_trait::async_trait]
impl ReadingSink for HttpReadingStore {
    /// POST the values; the service stamps the time on arrival
    async fn insert(&self, reading: Reading) -> StoreResult<()> {
        let body = serde_json::to_string(&WireCreate {
            temperature: reading.temperature,
            humidity: reading.humidity,
        })
        .map_err(|e| StoreError::Protocol(e.to_string()))?;

        let request = self
            .authorize(self.agent.post(&self.config.listing_url()))
            .set("Content-Type", "application/json");

        self.execute(move || match classify(request.clone().send_string(&body)) {
            Attempt::Done(result) => Attempt::Done(result.map(|_| ())),
            Attempt::Retry(e) => Attempt::Retry(e),
        })
        .await?
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * (1u32 << attempt.saturating_sub(1).min(16))
}
