use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
    state::NotKeyed,
};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use std::future::Future;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::config::{EdgarConfig, RetryPolicy};
use super::error::{EdgarError, Result};

type Governor = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

#[derive(Debug, Clone)]
pub struct Edgar {
    /// HTTP client for making requests
    pub(crate) client: reqwest::Client,

    /// Token bucket rate limiter for SEC compliance
    pub(crate) rate_limiter: Arc<Governor>,

    /// Pause taken before every request attempt
    pub(crate) request_delay: Duration,

    /// Retry and backoff settings
    pub(crate) retry: RetryPolicy,

    /// Base URL for EDGAR archives
    pub(crate) edgar_archives_url: String,

    /// Interrupts requests and backoff sleeps when cancelled
    pub(crate) cancel: CancellationToken,
}

/// HTTP client for the SEC EDGAR archives with built-in throttling and retry logic.
///
/// `Edgar` is the single network primitive of the mirror. Every index file, feed, and
/// complete submission is fetched through [`Edgar::get`], [`Edgar::get_bytes`], or
/// [`Edgar::download`].
///
/// # Rate Limiting
///
/// SEC.gov asks automated clients to stay under 10 requests per second. Each attempt
/// first sleeps for the configured `request_delay`, then waits on a token bucket:
///
/// ```text
/// Token Bucket (capacity: 10 tokens)
/// ┌──────────────────────────┐
/// │ ████████████████████████ │  ← Tokens refill at 10/sec
/// └──────────────────────────┘
///      ↓ consume on request
/// ```
///
/// # Retries
///
/// Only transient failures are retried: timeouts, connection errors, HTTP 5xx, and
/// HTTP 429 (honouring `Retry-After`). The wait grows as `base * factor^attempt`,
/// capped at `max_backoff`, with a little jitter. A 404 returns
/// [`EdgarError::NotFound`] immediately and any other status returns
/// [`EdgarError::InvalidResponse`]. Cancelling the configured token (see
/// [`EdgarConfig::with_cancellation`]) ends the loop with [`EdgarError::Interrupted`],
/// whether a request or a backoff sleep is in flight.
///
/// # Examples
///
/// ```rust
/// # use edgar_mirror::Edgar;
/// let edgar = Edgar::new("my_app/1.0 (my@email.com)")?;
/// # Ok::<(), edgar_mirror::EdgarError>(())
/// ```
///
/// With custom configuration:
///
/// ```rust
/// # use edgar_mirror::{Edgar, EdgarConfig, RetryPolicy};
/// # use std::time::Duration;
/// let config = EdgarConfig::new("custom_app/2.0", 5, Duration::from_secs(60), None)
///     .with_retry(RetryPolicy { max_retries: 5, ..Default::default() });
/// let edgar = Edgar::with_config(config)?;
/// # Ok::<(), edgar_mirror::EdgarError>(())
/// ```
impl Edgar {
    /// Creates a new Edgar client with sensible defaults.
    ///
    /// Uses 10 requests per second, a 30-second timeout, a 100ms pre-request pause,
    /// three retries, and the standard SEC.gov archive URL.
    ///
    /// # Arguments
    ///
    /// * `user_agent` - A descriptive identifier for your application, following the format
    ///   "AppName/Version (contact@email.com)". The SEC requires this to contact you if
    ///   your application causes issues.
    pub fn new(user_agent: &str) -> Result<Self> {
        let config = EdgarConfig {
            user_agent: user_agent.to_string(),
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Creates an Edgar client with custom configuration settings.
    ///
    /// # Errors
    ///
    /// Returns `EdgarError::ConfigError` if the user agent is malformed, the rate limit
    /// is zero, or the HTTP client cannot be built with the provided configuration.
    pub fn with_config(config: EdgarConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| EdgarError::ConfigError(format!("Invalid user agent: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| EdgarError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(config.rate_limit).ok_or_else(|| {
                EdgarError::ConfigError("Rate limit must be greater than zero".to_string())
            })?,
        )));

        let factor = config.retry.backoff_factor;
        if factor.is_nan() || factor < 1.0 {
            return Err(EdgarError::ConfigError(
                "Backoff factor must be at least 1.0".to_string(),
            ));
        }

        Ok(Edgar {
            client,
            rate_limiter,
            request_delay: config.request_delay,
            retry: config.retry,
            edgar_archives_url: config.base_urls.archives,
            cancel: config.cancel,
        })
    }

    /// Calculates the wait before retry number `retry` (0-indexed).
    ///
    /// The formula is `min(base × factor^retry, max_backoff) ± 10%`.
    fn calculate_backoff(policy: &RetryPolicy, retry: u32) -> Duration {
        let base_ms = policy.backoff_base.as_millis() as f64;
        let raw_ms = base_ms * policy.backoff_factor.powi(retry as i32);
        let capped_ms = raw_ms.min(policy.max_backoff.as_millis() as f64);
        // Add some jitter (±10% of the capped backoff)
        let jitter = capped_ms * 0.2 * (fastrand::f64() - 0.5);
        Duration::from_millis((capped_ms + jitter).max(0.0) as u64)
    }

    /// Performs a single throttled GET and maps the status code onto the error taxonomy.
    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }
        self.rate_limiter.until_ready().await;

        let response = self.client.get(url).send().await?;
        let status = response.status();

        match status {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(EdgarError::NotFound),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(EdgarError::TooManyRequests { retry_after })
            }
            s if s.is_server_error() => Err(EdgarError::ServerError(s)),
            other_status => {
                let error_body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Failed to read error body".to_string());

                Err(EdgarError::InvalidResponse(format!(
                    "Unexpected status code: {} for URL: {}. Response preview: {}",
                    other_status,
                    url,
                    error_body.chars().take(200).collect::<String>()
                )))
            }
        }
    }

    /// Runs `attempt` until it succeeds, fails terminally, or retries are exhausted.
    async fn with_retries<T, F, Fut>(&self, url: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;

        loop {
            self.check_cancelled()?;
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Err(EdgarError::Interrupted),
                outcome = attempt() => outcome,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if retries >= self.retry.max_retries {
                return Err(match err {
                    EdgarError::TooManyRequests { .. } => EdgarError::RateLimitExceeded,
                    other => other,
                });
            }

            let wait = match &err {
                EdgarError::TooManyRequests {
                    retry_after: Some(after),
                } => (*after).min(self.retry.max_backoff),
                _ => Self::calculate_backoff(&self.retry, retries),
            };

            tracing::warn!(
                "Request failed for {}: {}. Attempt {}/{}. Retrying in {:?}.",
                url,
                err,
                retries + 1,
                self.retry.max_retries + 1,
                wait
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(EdgarError::Interrupted),
                _ = sleep(wait) => {}
            }
            retries += 1;
        }
    }

    /// Fetches text content from a URL with throttling and retries.
    ///
    /// # Errors
    ///
    /// * `EdgarError::NotFound` - Resource doesn't exist (HTTP 404)
    /// * `EdgarError::RateLimitExceeded` - HTTP 429 persisted after all retries
    /// * `EdgarError::ServerError` - HTTP 5xx persisted after all retries
    /// * `EdgarError::RequestError` - Network failure after all retries
    /// * `EdgarError::InvalidResponse` - Any other unexpected status code
    /// * `EdgarError::Interrupted` - The cancellation token was triggered
    pub async fn get(&self, url: &str) -> Result<String> {
        self.with_retries(url, || async move {
            let response = self.send(url).await?;
            Ok(response.text().await?)
        })
        .await
    }

    /// Fetches binary data from a URL with throttling and retries.
    ///
    /// Same retry semantics as [`Edgar::get`]; the body is returned unmodified.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.with_retries(url, || async move {
            let response = self.send(url).await?;
            Ok(response.bytes().await?.to_vec())
        })
        .await
    }

    /// Streams `url` to `path`, returning the number of bytes written.
    ///
    /// The body is copied chunk by chunk into `<path>.part`, which is renamed over
    /// `path` once complete. On any failure the partial file is removed, so `path`
    /// either holds a full download or is left untouched. Missing parent directories
    /// are created.
    pub async fn download(&self, url: &str, path: &Path) -> Result<u64> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(path);

        let result = self
            .with_retries(url, || self.download_once(url, &partial))
            .await;

        match result {
            Ok(written) => {
                tokio::fs::rename(&partial, path).await?;
                tracing::debug!("Downloaded {} ({} bytes) to {}", url, written, path.display());
                Ok(written)
            }
            Err(err) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            "Failed to remove partial download {}: {}",
                            partial.display(),
                            cleanup
                        );
                    }
                }
                Err(err)
            }
        }
    }

    async fn download_once(&self, url: &str, partial: &Path) -> Result<u64> {
        let mut response = self.send(url).await?;
        let mut file = tokio::fs::File::create(partial).await?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    /// Returns the base URL for EDGAR archives.
    pub fn archives_url(&self) -> &str {
        &self.edgar_archives_url
    }

    /// Token that interrupts this client; cancel it to stop any running operation.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// `Err(Interrupted)` once the token has been cancelled.
    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(EdgarError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// `<path>.part`, the staging name used while a download is in flight.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
