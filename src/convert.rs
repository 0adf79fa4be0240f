//! IDX to CSV conversion.
//!
//! Each mirrored `.idx` file gets a sibling `.csv` with the columns
//! `CIK, Company Name, Form Type, Date Filed, Filename`. Conversion is skipped when the
//! CSV is at least as new as its source, so re-running over an unchanged mirror is cheap
//! and leaves every CSV byte-for-byte as it was.

use crate::config::DataLayout;
use crate::error::{EdgarError, Result};
use crate::index::IndexFile;
use crate::parsing::encoding::decode_bytes;
use crate::parsing::index::{IndexConfig, IndexParser};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    /// The CSV was (re)written.
    Converted { rows: usize, skipped: usize },
    /// The CSV is at least as new as the IDX; nothing was parsed.
    UpToDate,
}

/// Totals for a [`convert_tree`] run.
#[derive(Debug, Default)]
pub struct ConvertReport {
    pub converted: Vec<(PathBuf, usize)>,
    pub up_to_date: usize,
    pub failed: Vec<(PathBuf, String)>,
    /// Data lines discarded across all converted files.
    pub skipped_rows: usize,
}

impl ConvertReport {
    pub fn rows(&self) -> usize {
        self.converted.iter().map(|(_, rows)| rows).sum()
    }
}

/// The `.csv` path that goes with an `.idx` path.
pub fn csv_path_for(idx: &Path) -> PathBuf {
    idx.with_extension("csv")
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Converts one IDX file to CSV.
///
/// With `skip_if_exists`, an existing CSV whose modification time is not older than the
/// IDX's is left alone. The CSV is written to `<csv>.tmp` and renamed into place.
pub fn convert_idx_to_csv(idx: &Path, csv: &Path, skip_if_exists: bool) -> Result<ConvertOutcome> {
    if skip_if_exists {
        if let (Some(csv_time), Some(idx_time)) = (modified(csv), modified(idx)) {
            if csv_time >= idx_time {
                return Ok(ConvertOutcome::UpToDate);
            }
        }
    }

    let bytes = fs::read(idx)?;
    let decoded = decode_bytes(&bytes);
    if decoded.lossy {
        tracing::warn!("{} contained undecodable bytes", idx.display());
    }

    let parsed = IndexParser::new(IndexConfig::default()).parse(decoded.text.as_bytes())?;

    let tmp = crate::index::candidate_path(csv);
    let write = || -> Result<()> {
        let mut writer = csv::Writer::from_path(&tmp)?;
        for entry in &parsed.entries {
            writer.serialize(entry)?;
        }
        writer.flush()?;
        Ok(())
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, csv)?;

    if parsed.skipped > 0 {
        tracing::debug!(
            "Discarded {} malformed row(s) from {}",
            parsed.skipped,
            idx.display()
        );
    }

    Ok(ConvertOutcome::Converted {
        rows: parsed.entries.len(),
        skipped: parsed.skipped,
    })
}

/// Whether `path` is an `.idx` file produced by one of `files`' templates.
fn wanted(path: &Path, files: &[IndexFile]) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some("idx") {
        return false;
    }
    let Some(stem) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
    else {
        return false;
    };
    files.iter().any(|f| f.as_str() == stem)
}

/// Every `.idx` under `full-index/` and `daily-index/` matching `files`, sorted.
pub fn find_index_files(layout: &DataLayout, files: &[IndexFile]) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = [layout.full_index_dir(), layout.daily_index_dir()]
        .into_iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| wanted(p, files))
        .collect();
    found.sort();
    found
}

/// Converts every mirrored IDX file matching `files`.
///
/// Individual failures are logged and recorded; the run only fails when there were
/// inputs and none of them could be converted.
pub fn convert_tree(
    layout: &DataLayout,
    files: &[IndexFile],
    skip_if_exists: bool,
) -> Result<ConvertReport> {
    let inputs = find_index_files(layout, files);
    let mut report = ConvertReport::default();

    for idx in &inputs {
        match convert_idx_to_csv(idx, &csv_path_for(idx), skip_if_exists) {
            Ok(ConvertOutcome::Converted { rows, skipped }) => {
                report.converted.push((idx.clone(), rows));
                report.skipped_rows += skipped;
            }
            Ok(ConvertOutcome::UpToDate) => report.up_to_date += 1,
            Err(e) => {
                tracing::warn!("Failed to convert {}: {}", idx.display(), e);
                report.failed.push((idx.clone(), e.to_string()));
            }
        }
    }

    if !inputs.is_empty() && report.failed.len() == inputs.len() {
        return Err(EdgarError::NoIndexData(inputs.len()));
    }

    tracing::info!(
        "Converted {} index file(s) ({} rows), {} up to date, {} failed",
        report.converted.len(),
        report.rows(),
        report.up_to_date,
        report.failed.len()
    );
    Ok(report)
}
