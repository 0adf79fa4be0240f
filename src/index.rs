//! Index feed synchronization.
//!
//! EDGAR publishes *index files* that act as a manifest of filings, either for a single day
//! (daily index), for an entire quarter (full index), or, since April 2005, as a monthly
//! XBRL RSS feed. This module mirrors those files into a [`DataLayout`] and keeps the
//! mirror current without re-downloading what hasn't changed.
//!
//! Every remote file is described by an [`Artifact`], a `(feed, url, local path)` triple
//! computed from fixed templates. How an artifact that already exists locally is handled
//! depends on its [`ExistingPolicy`]:
//!
//! - `Skip` keeps the local copy.
//! - `Diff` downloads a candidate beside it and replaces the local copy only when the byte
//!   size differs. This is how recent daily files are forward-filled cheaply.
//! - `Replace` deletes the local copy and fetches again. The top-level `master.idx`
//!   snapshot is always handled this way since SEC rewrites it in place.
//!
//! Failures are reported per artifact in a [`SyncReport`]; a batch only stops early when
//! [`SyncOptions::fail_fast`] is set or the process is interrupted.
//!
//! # Examples
//!
//! ```ignore
//! use chrono::NaiveDate;
//! use edgar_mirror::{DataLayout, DateRange, Edgar, IndexOperations, SyncOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let edgar = Edgar::new("MyApp contact@example.com")?;
//!     let layout = DataLayout::new("edgar-data");
//!     layout.init()?;
//!
//!     let range = DateRange::new(
//!         NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
//!     )?;
//!     let report = edgar.sync_full_index(&layout, &range, &SyncOptions::default()).await?;
//!     println!("{} downloaded, {} failed", report.downloaded(), report.failed());
//!     Ok(())
//! }
//! ```

use super::Edgar;
use super::config::DataLayout;
use super::convert::{ConvertReport, convert_tree};
use super::error::{EdgarError, Result};
use super::merge::{MergeOutcome, merge_indexes};
use super::traits::IndexOperations;
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate, Weekday};
use std::io;
use std::path::{Path, PathBuf};

/// First month with a published monthly XBRL RSS feed.
const XBRL_FIRST_MONTH: (i32, u32) = (2005, 4);

/// Returns the quarter (1-4) that contains `month`.
///
/// # Errors
///
/// `EdgarError::InvalidMonth` if `month` is not in `1..=12`.
pub fn calculate_quarter(month: u32) -> Result<u32> {
    if !(1..=12).contains(&month) {
        return Err(EdgarError::InvalidMonth);
    }
    Ok((month - 1) / 3 + 1)
}

/// Returns the first and last month of `quarter` (1-4).
///
/// # Errors
///
/// `EdgarError::InvalidQuarter` if `quarter` is not in `1..=4`.
pub fn quarter_to_month_range(quarter: u32) -> Result<(u32, u32)> {
    if !(1..=4).contains(&quarter) {
        return Err(EdgarError::InvalidQuarter);
    }
    Ok((quarter * 3 - 2, quarter * 3))
}

/// Fiscal quarter (Q1-Q4).
///
/// EDGAR index directories are grouped by quarter (e.g., `QTR1` .. `QTR4`).
///
/// Each quarter maps to specific months:
/// - Q1: January through March
/// - Q2: April through June
/// - Q3: July through September
/// - Q4: October through December
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Quarter {
    Q1 = 1,
    Q2 = 2,
    Q3 = 3,
    Q4 = 4,
}

impl Quarter {
    /// Creates a Quarter from a month number (1-12)
    ///
    /// # Returns
    /// * `Ok(Quarter)` if month is valid
    /// * `Err(EdgarError::InvalidMonth)` if month is invalid
    pub fn from_month(month: u32) -> Result<Self> {
        Self::from_number(calculate_quarter(month)?)
    }

    /// Creates a Quarter from its number (1-4).
    pub fn from_number(quarter: u32) -> Result<Self> {
        match quarter {
            1 => Ok(Quarter::Q1),
            2 => Ok(Quarter::Q2),
            3 => Ok(Quarter::Q3),
            4 => Ok(Quarter::Q4),
            _ => Err(EdgarError::InvalidQuarter),
        }
    }

    /// The quarter a calendar date falls in.
    pub fn containing(date: NaiveDate) -> Self {
        match date.month0() / 3 {
            0 => Quarter::Q1,
            1 => Quarter::Q2,
            2 => Quarter::Q3,
            _ => Quarter::Q4,
        }
    }

    /// Converts the quarter to its integer representation (1-4).
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// First and last month covered by this quarter.
    pub fn month_range(&self) -> (u32, u32) {
        let q = *self as u32;
        (q * 3 - 2, q * 3)
    }
}

/// A validated calendar date used to locate a daily EDGAR index file.
///
/// Daily indices live under `.../daily-index/<YEAR>/QTR<1-4>/` and include the date in the
/// filename (e.g., `master.20230815.idx`).
///
/// # Example
/// ```rust
/// use edgar_mirror::{EdgarDay, Quarter, Result};
///
/// fn main() -> Result<()> {
///     let day = EdgarDay::new(2023, 12, 25)?;
///     assert_eq!(day.format_date(), "20231225");
///     assert_eq!(day.quarter(), Quarter::Q4);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgarDay {
    date: NaiveDate,
}

impl EdgarDay {
    /// Creates a new EdgarDay with validation.
    ///
    /// # Errors
    ///
    /// - `InvalidYear` if year < 1994
    /// - `InvalidMonth` if month not 1-12
    /// - `InvalidDay` if the day does not exist in that month
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self> {
        if year < 1994 {
            return Err(EdgarError::InvalidYear);
        }
        if !(1..=12).contains(&month) {
            return Err(EdgarError::InvalidMonth);
        }
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(EdgarError::InvalidDay)?;
        Ok(Self { date })
    }

    pub fn from_date(date: NaiveDate) -> Result<Self> {
        Self::new(date.year(), date.month(), date.day())
    }

    /// Formats as `YYYYMMDD` (e.g., "20230815").
    pub fn format_date(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// Returns the quarter directory (`QTR1`..`QTR4`) that EDGAR uses for this date.
    pub fn quarter(&self) -> Quarter {
        Quarter::containing(self.date)
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// EDGAR doesn't publish daily indices on weekends.
    pub fn is_business_day(&self) -> bool {
        !matches!(self.date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

/// A fiscal period (year + quarter) used to locate quarterly index directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgarPeriod {
    year: i32,
    quarter: Quarter,
}

impl EdgarPeriod {
    /// Creates a new EdgarPeriod (year must be >= 1994).
    pub fn new(year: i32, quarter: Quarter) -> Result<Self> {
        if year < 1994 {
            return Err(EdgarError::InvalidYear);
        }
        Ok(Self { year, quarter })
    }

    /// The period a calendar date falls in.
    pub fn containing(date: NaiveDate) -> Result<Self> {
        Self::new(date.year(), Quarter::containing(date))
    }

    /// Returns the year of this period.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Returns the quarter of this period.
    pub fn quarter(&self) -> Quarter {
        self.quarter
    }

    /// The following quarter, rolling over into the next year after Q4.
    pub fn next(&self) -> Self {
        match self.quarter {
            Quarter::Q1 => Self { quarter: Quarter::Q2, ..*self },
            Quarter::Q2 => Self { quarter: Quarter::Q3, ..*self },
            Quarter::Q3 => Self { quarter: Quarter::Q4, ..*self },
            Quarter::Q4 => Self {
                year: self.year + 1,
                quarter: Quarter::Q1,
            },
        }
    }
}

/// An inclusive range of calendar days, validated before any I/O happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// # Errors
    ///
    /// - `InvalidYear` if either bound is before 1994
    /// - `InvalidDateRange` if `start` is after `end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start.year() < 1994 || end.year() < 1994 {
            return Err(EdgarError::InvalidYear);
        }
        if start > end {
            return Err(EdgarError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering a single day.
    pub fn day(date: NaiveDate) -> Result<Self> {
        Self::new(date, date)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every calendar day in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }

    /// Every quarter touched by the range, in order.
    pub fn periods(&self) -> Vec<EdgarPeriod> {
        let last = (self.end.year(), Quarter::containing(self.end));
        let mut period = EdgarPeriod {
            year: self.start.year(),
            quarter: Quarter::containing(self.start),
        };

        let mut periods = Vec::new();
        while (period.year, period.quarter) <= last {
            periods.push(period);
            period = period.next();
        }
        periods
    }

    /// Every `(year, month)` touched by the range, in order.
    pub fn months(&self) -> Vec<(i32, u32)> {
        let mut months = Vec::new();
        let (mut year, mut month) = (self.start.year(), self.start.month());
        while (year, month) <= (self.end.year(), self.end.month()) {
            months.push((year, month));
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        months
    }
}

/// The three index feeds EDGAR publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFeed {
    FullIndex,
    DailyIndex,
    MonthlyXbrl,
}

/// File templates within the full and daily index directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFile {
    Master,
    Form,
    Company,
    Crawler,
    Xbrl,
    Sitemap,
}

impl IndexFile {
    /// The five files published for every business day.
    pub const DAILY: [IndexFile; 5] = [
        IndexFile::Master,
        IndexFile::Form,
        IndexFile::Company,
        IndexFile::Crawler,
        IndexFile::Sitemap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexFile::Master => "master",
            IndexFile::Form => "form",
            IndexFile::Company => "company",
            IndexFile::Crawler => "crawler",
            IndexFile::Xbrl => "xbrl",
            IndexFile::Sitemap => "sitemap",
        }
    }

    /// The sitemap is served as XML; everything else is IDX text.
    pub fn extension(&self) -> &'static str {
        match self {
            IndexFile::Sitemap => "xml",
            _ => "idx",
        }
    }
}

/// One remote index file and where it lives locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub feed: IndexFeed,
    pub url: String,
    pub path: PathBuf,
}

impl Artifact {
    /// `{archives}/full-index/{YEAR}/QTR{N}/{file}.idx`
    pub fn full_index(
        archives: &str,
        layout: &DataLayout,
        period: EdgarPeriod,
        file: IndexFile,
    ) -> Self {
        let relative = format!(
            "{}/QTR{}/{}.{}",
            period.year(),
            period.quarter().as_i32(),
            file.as_str(),
            file.extension()
        );
        Self {
            feed: IndexFeed::FullIndex,
            url: format!("{}/full-index/{}", archives, relative),
            path: layout.full_index_dir().join(relative),
        }
    }

    /// The top-level `full-index/master.idx` snapshot.
    pub fn master_snapshot(archives: &str, layout: &DataLayout) -> Self {
        Self {
            feed: IndexFeed::FullIndex,
            url: format!("{}/full-index/master.idx", archives),
            path: layout.full_index_dir().join("master.idx"),
        }
    }

    /// `{archives}/daily-index/{YEAR}/QTR{N}/{file}.{YYYYMMDD}.{ext}` for each file template.
    pub fn daily(
        archives: &str,
        layout: &DataLayout,
        day: EdgarDay,
        files: &[IndexFile],
    ) -> Vec<Self> {
        files
            .iter()
            .map(|file| {
                let relative = format!(
                    "{}/QTR{}/{}.{}.{}",
                    day.year(),
                    day.quarter().as_i32(),
                    file.as_str(),
                    day.format_date(),
                    file.extension()
                );
                Self {
                    feed: IndexFeed::DailyIndex,
                    url: format!("{}/daily-index/{}", archives, relative),
                    path: layout.daily_index_dir().join(relative),
                }
            })
            .collect()
    }

    /// `{archives}/monthly/xbrlrss-{YEAR}-{MM}.xml`
    ///
    /// # Errors
    ///
    /// `InvalidXBRLYear` before April 2005, `InvalidMonth` for a month outside 1-12.
    pub fn monthly_xbrl(
        archives: &str,
        layout: &DataLayout,
        year: i32,
        month: u32,
    ) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(EdgarError::InvalidMonth);
        }
        if (year, month) < XBRL_FIRST_MONTH {
            return Err(EdgarError::InvalidXBRLYear);
        }
        let name = format!("xbrlrss-{}-{:02}.xml", year, month);
        Ok(Self {
            feed: IndexFeed::MonthlyXbrl,
            url: format!("{}/monthly/{}", archives, name),
            path: layout.monthly_dir().join(name),
        })
    }
}

/// What to do when an artifact already exists locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingPolicy {
    /// Keep the local file.
    Skip,
    /// Download a candidate and replace the local file only if the size differs.
    Diff,
    /// Delete the local file and download again.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    Changed,
    Unchanged,
}

/// Result of syncing one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Fetched for the first time (or after a `Replace`).
    Downloaded,
    /// Re-downloaded and the local copy was replaced.
    Changed,
    /// Re-downloaded, same size, local copy kept.
    Unchanged,
    /// Present locally and left alone.
    Skipped,
    /// SEC answered 404, typically a holiday or a period not yet published.
    Missing,
    Failed(String),
}

/// `<name>.tmp`, where a candidate download is staged before being compared.
pub fn candidate_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Compares `candidate` against `existing` by byte size.
///
/// A differing size moves `candidate` over `existing`; an equal size deletes `candidate`
/// and keeps `existing`. If `existing` is missing the candidate is always moved in.
pub fn replace_if_changed(existing: &Path, candidate: &Path) -> io::Result<DiffOutcome> {
    let new_len = std::fs::metadata(candidate)?.len();
    let old_len = match std::fs::metadata(existing) {
        Ok(meta) => Some(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    if old_len == Some(new_len) {
        std::fs::remove_file(candidate)?;
        Ok(DiffOutcome::Unchanged)
    } else {
        std::fs::rename(candidate, existing)?;
        Ok(DiffOutcome::Changed)
    }
}

/// Knobs for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Keep existing quarterly and older daily files instead of diffing them.
    pub skip_if_exists: bool,
    /// Daily files this many days old (or newer) are always diffed.
    pub recheck_days: i64,
    /// Stop at the first failed artifact instead of recording it and moving on.
    pub fail_fast: bool,
    /// Full-index file templates to fetch per quarter.
    pub files: Vec<IndexFile>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            skip_if_exists: true,
            recheck_days: 7,
            fail_fast: false,
            files: vec![IndexFile::Master],
        }
    }
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip_if_exists(mut self, skip: bool) -> Self {
        self.skip_if_exists = skip;
        self
    }

    pub fn with_recheck_days(mut self, days: i64) -> Self {
        self.recheck_days = days;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_files(mut self, files: Vec<IndexFile>) -> Self {
        self.files = files;
        self
    }

    /// Policy for quarterly and monthly files.
    pub fn period_policy(&self) -> ExistingPolicy {
        if self.skip_if_exists {
            ExistingPolicy::Skip
        } else {
            ExistingPolicy::Diff
        }
    }

    /// Policy for a daily file dated `day` as seen on `today`.
    pub fn daily_policy(&self, day: NaiveDate, today: NaiveDate) -> ExistingPolicy {
        if (today - day).num_days() <= self.recheck_days {
            ExistingPolicy::Diff
        } else {
            self.period_policy()
        }
    }
}

/// Per-artifact outcomes of a sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<(Artifact, ArtifactOutcome)>,
}

impl SyncReport {
    fn count(&self, pred: impl Fn(&ArtifactOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::Downloaded))
    }

    pub fn changed(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::Changed))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::Unchanged))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::Skipped))
    }

    pub fn missing(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::Missing))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::Failed(_)))
    }

    /// Artifacts whose local copy was written during this run.
    pub fn updated_paths(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ArtifactOutcome::Downloaded | ArtifactOutcome::Changed))
            .map(|(a, _)| a.path.as_path())
    }
}

/// Settings for [`IndexOperations::update_indexes`].
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub range: DateRange,
    pub sync: SyncOptions,
    /// Re-fetch the top-level `full-index/master.idx` snapshot first.
    pub refresh_master: bool,
    pub include_daily: bool,
    pub include_monthly: bool,
    /// Rebuild the merged index even when no source is newer.
    pub force_merge: bool,
}

impl UpdateOptions {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            sync: SyncOptions::default(),
            refresh_master: false,
            include_daily: true,
            include_monthly: false,
            force_merge: false,
        }
    }
}

/// Stage-by-stage results of an update run.
#[derive(Debug)]
pub struct UpdateReport {
    pub master: Option<ArtifactOutcome>,
    pub full_index: SyncReport,
    pub daily_index: Option<SyncReport>,
    pub monthly: Option<SyncReport>,
    pub convert: ConvertReport,
    pub merge: MergeOutcome,
}

impl Edgar {
    /// Fetches one artifact according to `policy`.
    ///
    /// A 404 is reported as [`ArtifactOutcome::Missing`] rather than an error.
    pub async fn fetch_artifact(
        &self,
        artifact: &Artifact,
        policy: ExistingPolicy,
    ) -> Result<ArtifactOutcome> {
        if tokio::fs::try_exists(&artifact.path).await? {
            match policy {
                ExistingPolicy::Skip => return Ok(ArtifactOutcome::Skipped),
                ExistingPolicy::Replace => tokio::fs::remove_file(&artifact.path).await?,
                ExistingPolicy::Diff => {
                    let candidate = candidate_path(&artifact.path);
                    match self.download(&artifact.url, &candidate).await {
                        Ok(_) => {}
                        Err(EdgarError::NotFound) => return Ok(ArtifactOutcome::Missing),
                        Err(e) => return Err(e),
                    }
                    return Ok(match replace_if_changed(&artifact.path, &candidate)? {
                        DiffOutcome::Changed => ArtifactOutcome::Changed,
                        DiffOutcome::Unchanged => ArtifactOutcome::Unchanged,
                    });
                }
            }
        }

        match self.download(&artifact.url, &artifact.path).await {
            Ok(_) => Ok(ArtifactOutcome::Downloaded),
            Err(EdgarError::NotFound) => Ok(ArtifactOutcome::Missing),
            Err(e) => Err(e),
        }
    }

    /// Fetches artifacts one at a time, recording each outcome.
    async fn sync_artifacts(
        &self,
        plan: Vec<(Artifact, ExistingPolicy)>,
        fail_fast: bool,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for (artifact, policy) in plan {
            self.check_cancelled()?;
            let outcome = match self.fetch_artifact(&artifact, policy).await {
                Ok(outcome) => outcome,
                Err(EdgarError::Interrupted) => return Err(EdgarError::Interrupted),
                Err(e) if fail_fast => return Err(e),
                Err(e) => {
                    tracing::warn!("Failed to sync {}: {}", artifact.url, e);
                    ArtifactOutcome::Failed(e.to_string())
                }
            };
            report.outcomes.push((artifact, outcome));
        }

        tracing::info!(
            "Synced {} artifact(s): {} downloaded, {} changed, {} unchanged, {} skipped, \
             {} missing, {} failed",
            report.outcomes.len(),
            report.downloaded(),
            report.changed(),
            report.unchanged(),
            report.skipped(),
            report.missing(),
            report.failed()
        );
        Ok(report)
    }

    fn full_index_plan(
        &self,
        layout: &DataLayout,
        range: &DateRange,
        options: &SyncOptions,
        today: NaiveDate,
    ) -> Vec<(Artifact, ExistingPolicy)> {
        let current = (today.year(), Quarter::containing(today));
        range
            .periods()
            .into_iter()
            .filter(|p| (p.year(), p.quarter()) <= current)
            .flat_map(|period| {
                options.files.iter().map(move |file| {
                    (
                        Artifact::full_index(&self.edgar_archives_url, layout, period, *file),
                        options.period_policy(),
                    )
                })
            })
            .collect()
    }

    fn daily_plan(
        &self,
        layout: &DataLayout,
        range: &DateRange,
        options: &SyncOptions,
        today: NaiveDate,
    ) -> Vec<(Artifact, ExistingPolicy)> {
        range
            .days()
            .filter(|d| *d <= today)
            .filter_map(|d| EdgarDay::from_date(d).ok())
            .filter(EdgarDay::is_business_day)
            .flat_map(|day| {
                let policy = options.daily_policy(day.date(), today);
                Artifact::daily(&self.edgar_archives_url, layout, day, &IndexFile::DAILY)
                    .into_iter()
                    .map(move |a| (a, policy))
            })
            .collect()
    }

    fn monthly_plan(
        &self,
        layout: &DataLayout,
        range: &DateRange,
        options: &SyncOptions,
        today: NaiveDate,
    ) -> Vec<(Artifact, ExistingPolicy)> {
        range
            .months()
            .into_iter()
            .filter(|&(y, m)| {
                (y, m) >= XBRL_FIRST_MONTH && (y, m) <= (today.year(), today.month())
            })
            .filter_map(|(y, m)| {
                let artifact = Artifact::monthly_xbrl(&self.edgar_archives_url, layout, y, m).ok()?;
                // The current month's feed keeps growing.
                let policy = if (y, m) == (today.year(), today.month()) {
                    ExistingPolicy::Diff
                } else {
                    options.period_policy()
                };
                Some((artifact, policy))
            })
            .collect()
    }
}

#[cfg(feature = "xbrl-feed")]
impl Edgar {
    /// Items of a mirrored `monthly/xbrlrss-{YEAR}-{MM}.xml`.
    ///
    /// Reads the local copy only; sync it first with
    /// [`IndexOperations::sync_monthly_xbrl`].
    pub fn monthly_xbrl_items(
        &self,
        layout: &DataLayout,
        year: i32,
        month: u32,
    ) -> Result<Vec<crate::parsing::rss::Item>> {
        use crate::parsing::rss::{XbrlFeedConfig, XbrlFeedParser};

        let artifact = Artifact::monthly_xbrl(&self.edgar_archives_url, layout, year, month)?;
        let bytes = std::fs::read(&artifact.path)?;
        let text = crate::parsing::encoding::decode_bytes(&bytes).text;
        let feed = XbrlFeedParser::new(XbrlFeedConfig::default()).parse(&text)?;
        Ok(feed.channel.items)
    }
}

/// Index synchronization for [`Edgar`].
///
/// Every method fetches sequentially and records per-artifact outcomes; only
/// `EdgarError::Interrupted` (or any error with `fail_fast`) aborts a run.
#[async_trait]
impl IndexOperations for Edgar {
    /// Mirrors `full-index/{YEAR}/QTR{N}/` files for every quarter of `range` up to today.
    async fn sync_full_index(
        &self,
        layout: &DataLayout,
        range: &DateRange,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let plan = self.full_index_plan(layout, range, options, Local::now().date_naive());
        self.sync_artifacts(plan, options.fail_fast).await
    }

    /// Mirrors the five daily files for every business day of `range` up to today.
    async fn sync_daily_index(
        &self,
        layout: &DataLayout,
        range: &DateRange,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let plan = self.daily_plan(layout, range, options, Local::now().date_naive());
        self.sync_artifacts(plan, options.fail_fast).await
    }

    /// Mirrors `monthly/xbrlrss-{YEAR}-{MM}.xml` for every month of `range` since April 2005.
    async fn sync_monthly_xbrl(
        &self,
        layout: &DataLayout,
        range: &DateRange,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let plan = self.monthly_plan(layout, range, options, Local::now().date_naive());
        self.sync_artifacts(plan, options.fail_fast).await
    }

    /// Deletes and re-fetches the top-level `full-index/master.idx`.
    async fn refresh_master_snapshot(&self, layout: &DataLayout) -> Result<ArtifactOutcome> {
        let artifact = Artifact::master_snapshot(&self.edgar_archives_url, layout);
        self.fetch_artifact(&artifact, ExistingPolicy::Replace).await
    }

    /// Sync, convert and merge in one pass.
    ///
    /// Conversion and merging are blocking file work and run on the blocking pool.
    /// The cancellation token is checked between stages.
    ///
    /// # Errors
    ///
    /// Sync failures are recorded in the stage reports. The call itself fails on
    /// interrupt, on `fail_fast` errors, or when convert/merge find no usable input.
    async fn update_indexes(
        &self,
        layout: &DataLayout,
        options: &UpdateOptions,
    ) -> Result<UpdateReport> {
        layout.init()?;

        let master = if options.refresh_master {
            match self.refresh_master_snapshot(layout).await {
                Ok(outcome) => Some(outcome),
                Err(EdgarError::Interrupted) => return Err(EdgarError::Interrupted),
                Err(e) if options.sync.fail_fast => return Err(e),
                Err(e) => {
                    tracing::warn!("Failed to refresh master snapshot: {}", e);
                    Some(ArtifactOutcome::Failed(e.to_string()))
                }
            }
        } else {
            None
        };

        let full_index = self
            .sync_full_index(layout, &options.range, &options.sync)
            .await?;

        let daily_index = if options.include_daily {
            Some(self.sync_daily_index(layout, &options.range, &options.sync).await?)
        } else {
            None
        };

        let monthly = if options.include_monthly {
            Some(self.sync_monthly_xbrl(layout, &options.range, &options.sync).await?)
        } else {
            None
        };

        self.check_cancelled()?;
        let (convert_layout, files) = (layout.clone(), options.sync.files.clone());
        let convert =
            tokio::task::spawn_blocking(move || convert_tree(&convert_layout, &files, true))
                .await??;

        self.check_cancelled()?;
        let (merge_layout, force) = (layout.clone(), options.force_merge);
        let merge =
            tokio::task::spawn_blocking(move || merge_indexes(&merge_layout, force)).await??;

        Ok(UpdateReport {
            master,
            full_index,
            daily_index,
            monthly,
            convert,
            merge,
        })
    }
}
