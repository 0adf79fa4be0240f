//! Trait definitions organizing the network-facing entry points by feature area.
//!
//! The mirror has two: keeping the index feeds current, and fetching filings to
//! extract. `Edgar` implements both. Callers usually use the `Edgar` struct directly,
//! but the traits are handy for substituting a stub in a larger pipeline's tests.

use super::config::DataLayout;
use super::error::Result;
use super::filings::Extraction;
use super::index::{
    ArtifactOutcome, DateRange, SyncOptions, SyncReport, UpdateOptions, UpdateReport,
};
use async_trait::async_trait;
use std::path::PathBuf;

/// Operations for mirroring EDGAR's index feeds.
///
/// The SEC publishes index files that list all filings for a given day, quarter or month
/// (XBRL RSS). Index files are available from 1994 onwards, the monthly XBRL feed from
/// April 2005. Each sync fetches one artifact at a time and reports what happened to it.
#[async_trait]
pub trait IndexOperations {
    /// Mirrors the quarterly `full-index` files touched by `range`.
    async fn sync_full_index(
        &self,
        layout: &DataLayout,
        range: &DateRange,
        options: &SyncOptions,
    ) -> Result<SyncReport>;
    /// Mirrors the five daily files for each business day in `range`.
    async fn sync_daily_index(
        &self,
        layout: &DataLayout,
        range: &DateRange,
        options: &SyncOptions,
    ) -> Result<SyncReport>;
    /// Mirrors the monthly XBRL RSS feeds touched by `range`.
    async fn sync_monthly_xbrl(
        &self,
        layout: &DataLayout,
        range: &DateRange,
        options: &SyncOptions,
    ) -> Result<SyncReport>;
    /// Deletes and re-fetches the top-level `full-index/master.idx`.
    async fn refresh_master_snapshot(&self, layout: &DataLayout) -> Result<ArtifactOutcome>;
    /// Runs sync, IDX to CSV conversion and the merge in order.
    async fn update_indexes(
        &self,
        layout: &DataLayout,
        options: &UpdateOptions,
    ) -> Result<UpdateReport>;
}

/// Operations for fetching complete submission files and splitting them into documents.
#[async_trait]
pub trait FilingOperations {
    /// Downloads `{archives}/data/{CIK}/{ACCESSION}.txt` into the mirror, unless already present.
    async fn download_filing(
        &self,
        layout: &DataLayout,
        cik: u64,
        accession: &str,
    ) -> Result<PathBuf>;
    /// Downloads a filing if needed and extracts its documents.
    async fn fetch_and_extract(
        &self,
        layout: &DataLayout,
        cik: u64,
        accession: &str,
    ) -> Result<Extraction>;
}
