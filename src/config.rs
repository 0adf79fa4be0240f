use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configuration for the Edgar client
#[derive(Debug, Clone)]
pub struct EdgarConfig {
    /// User agent string for HTTP requests
    pub user_agent: String,
    /// Rate limit in requests per second
    pub rate_limit: u32,
    /// HTTP request timeout
    pub timeout: Duration,
    /// Pause taken before every request attempt
    pub request_delay: Duration,
    /// Retry and backoff settings for transient failures
    pub retry: RetryPolicy,
    /// Base URLs for different EDGAR services
    pub base_urls: EdgarUrls,
    /// Cancelling this token aborts in-flight requests and backoff sleeps
    pub cancel: CancellationToken,
}

/// Base URLs for different EDGAR services
#[derive(Debug, Clone)]
pub struct EdgarUrls {
    /// Base URL for EDGAR archives
    pub archives: String,
}

/// Exponential backoff settings: `base * factor^attempt`, capped at `max_backoff`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub backoff_base: Duration,
    /// Multiplier applied per attempt
    pub backoff_factor: f64,
    /// Upper bound for a single backoff sleep
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl Default for EdgarConfig {
    fn default() -> Self {
        Self {
            user_agent: "edgar_mirror/0.1.0".to_string(),
            rate_limit: 10,
            timeout: Duration::from_secs(30),
            request_delay: Duration::from_millis(100),
            retry: RetryPolicy::default(),
            base_urls: EdgarUrls::default(),
            cancel: CancellationToken::new(),
        }
    }
}

impl EdgarConfig {
    /// Creates a new EdgarConfig with custom settings
    ///
    /// # Basic usage
    ///
    /// ```rust
    /// use edgar_mirror::{Edgar, EdgarConfig};
    /// use std::time::Duration;
    ///
    /// let config = EdgarConfig::new(
    ///     "YourAppName contact@example.com",
    ///     10, // requests per second
    ///     Duration::from_secs(30),
    ///     None,
    /// );
    /// let edgar = Edgar::with_config(config)?;
    /// # Ok::<(), edgar_mirror::EdgarError>(())
    /// ```
    pub fn new(
        user_agent: impl Into<String>,
        rate_limit: u32,
        timeout: Duration,
        base_urls: Option<EdgarUrls>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            rate_limit,
            timeout,
            base_urls: base_urls.unwrap_or_default(),
            ..Default::default()
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Uses `token` to interrupt the client. The library installs no signal handlers;
    /// wire Ctrl-C (or any other shutdown source) to this token in the application.
    ///
    /// ```rust,ignore
    /// let token = CancellationToken::new();
    /// let on_interrupt = token.clone();
    /// tokio::spawn(async move {
    ///     if tokio::signal::ctrl_c().await.is_ok() {
    ///         on_interrupt.cancel();
    ///     }
    /// });
    /// let edgar = Edgar::with_config(EdgarConfig::default().with_cancellation(token))?;
    /// ```
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

impl Default for EdgarUrls {
    fn default() -> Self {
        Self {
            archives: "https://www.sec.gov/Archives/edgar".to_string(),
        }
    }
}

/// On-disk layout of the local mirror.
///
/// ```text
/// {root}/full-index/master.idx
/// {root}/full-index/{YEAR}/QTR{N}/{file}.idx|.csv
/// {root}/daily-index/{YEAR}/QTR{N}/{file}.{YYYYMMDD}.idx|.csv
/// {root}/monthly/xbrlrss-{YEAR}-{MM}.xml
/// {root}/merged-index.json.gz
/// {root}/data/{CIK}/{ACCESSION}.txt
/// {root}/data/{CIK}/{ACCESSION}/
/// ```
///
/// Nothing is created on construction; call [`DataLayout::init`] once before syncing.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub const MERGED_INDEX_FILE: &'static str = "merged-index.json.gz";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the top-level mirror directories.
    pub fn init(&self) -> io::Result<()> {
        for dir in [
            self.full_index_dir(),
            self.daily_index_dir(),
            self.monthly_dir(),
            self.data_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn full_index_dir(&self) -> PathBuf {
        self.root.join("full-index")
    }

    pub fn daily_index_dir(&self) -> PathBuf {
        self.root.join("daily-index")
    }

    pub fn monthly_dir(&self) -> PathBuf {
        self.root.join("monthly")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn merged_index_path(&self) -> PathBuf {
        self.root.join(Self::MERGED_INDEX_FILE)
    }

    /// Local copy of a complete submission text file.
    pub fn filing_path(&self, cik: u64, accession: &str) -> PathBuf {
        self.data_dir()
            .join(cik.to_string())
            .join(format!("{}.txt", accession))
    }

    /// Directory that receives the extracted documents of one filing.
    pub fn extraction_dir(&self, cik: u64, accession: &str) -> PathBuf {
        self.data_dir().join(cik.to_string()).join(accession)
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("edgar-data")
    }
}
