//! # edgar-mirror - a local mirror of SEC EDGAR
//!
//! edgar-mirror keeps a local copy of EDGAR's public index feeds and turns SEC's packaged
//! "complete submission" files back into the documents they were assembled from.
//!
//! ## Features
//!
//! - **Rate-limited HTTP client** - Complies with SEC.gov fair access rules, retries
//!   transient failures with exponential backoff
//! - **Index sync** - Mirrors full-index, daily-index and monthly XBRL feeds, re-checking
//!   recent files by byte size instead of blindly re-downloading
//! - **IDX conversion** - Parses pipe-delimited and fixed-width `.idx` files into CSV
//! - **Merged index** - One deduplicated, date-sorted table over every converted index,
//!   filterable by CIK, form type and date
//! - **Filing extraction** - Splits a complete submission into its documents, decodes
//!   uuencoded attachments and records the SEC-HEADER as CSV
//! - **Primary document** - Picks the main document of a filing out of its exhibits
//!
//! ## Requirements
//!
//! edgar-mirror is an async-first library and requires an async runtime. We recommend
//! [tokio](https://tokio.rs), which is the most widely used async runtime in the Rust ecosystem.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use chrono::NaiveDate;
//! use edgar_mirror::{
//!     DataLayout, DateRange, Edgar, FilingOperations, FilingOptions, IndexOperations,
//!     MergedIndex, UpdateOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Initialize with a proper user agent (required by SEC.gov)
//!     let edgar = Edgar::new("YourAppName contact@example.com")?;
//!     let layout = DataLayout::new("edgar-data");
//!
//!     let range = DateRange::new(
//!         NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 10, 31).unwrap(),
//!     )?;
//!     edgar.update_indexes(&layout, &UpdateOptions::new(range)).await?;
//!
//!     let index = MergedIndex::load(&layout.merged_index_path())?;
//!     let options = FilingOptions::new().with_form_type("10-K").with_cik(320193);
//!     for entry in index.filter(&options) {
//!         let accession = entry.accession_number().unwrap_or_default();
//!         edgar.fetch_and_extract(&layout, entry.cik, &accession).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
pub mod parsing;

mod options;
mod traits;

pub mod convert;
mod filings;
mod index;
pub mod merge;
pub mod primary;

// Core Edgar functionality
pub use config::{DataLayout, EdgarConfig, EdgarUrls, RetryPolicy};
pub use core::Edgar;
pub use error::{EdgarError, Result};

pub use options::FilingOptions;

// Re-export core types and traits for a clean API
pub use convert::{ConvertOutcome, ConvertReport, convert_idx_to_csv, convert_tree};
pub use filings::{
    Extraction, ExtractionStatus, FilingDocument, HEADER_CSV, extract_filing, extract_filing_with,
};
pub use index::{
    Artifact, ArtifactOutcome, DateRange, DiffOutcome, EdgarDay, EdgarPeriod, ExistingPolicy,
    IndexFeed, IndexFile, Quarter, SyncOptions, SyncReport, UpdateOptions, UpdateReport,
    calculate_quarter, quarter_to_month_range, replace_if_changed,
};
pub use merge::{MergeOutcome, MergedIndex, merge_indexes};
pub use parsing::index::IndexEntry;
pub use primary::{PrimaryDocumentOptions, identify_primary};

pub use traits::{FilingOperations, IndexOperations};
pub use tokio_util::sync::CancellationToken;

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
