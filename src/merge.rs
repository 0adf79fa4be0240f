//! The merged index.
//!
//! All per-period CSVs are folded into one deduplicated, date-descending table stored
//! column by column in `merged-index.json.gz`. This is the artifact downstream queries
//! (CIK, form type, date range) run against.

use crate::config::DataLayout;
use crate::error::{EdgarError, Result};
use crate::options::FilingOptions;
use crate::parsing::index::IndexEntry;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Columnar table of index rows, one vector per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedIndex {
    pub cik: Vec<u64>,
    pub company_name: Vec<String>,
    pub form_type: Vec<String>,
    pub date_filed: Vec<String>,
    pub filename: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Rebuilt {
        rows: usize,
        sources: usize,
        duplicates: usize,
    },
    /// No source CSV is newer than the merged artifact.
    UpToDate,
}

impl MergedIndex {
    /// Builds the table from rows, dropping repeated `(CIK, Form Type, Date Filed, Filename)`
    /// keys (first occurrence wins) and stable-sorting by date, newest first.
    ///
    /// Returns the table and the number of duplicates removed.
    pub fn from_entries(entries: Vec<IndexEntry>) -> (Self, usize) {
        let total = entries.len();
        let mut seen = HashSet::with_capacity(total);
        let mut unique: Vec<IndexEntry> = entries
            .into_iter()
            .filter(|e| {
                seen.insert((
                    e.cik,
                    e.form_type.clone(),
                    e.date_filed.clone(),
                    e.filename.clone(),
                ))
            })
            .collect();
        let duplicates = total - unique.len();

        unique.sort_by(|a, b| b.date_filed.cmp(&a.date_filed));

        let mut merged = MergedIndex::default();
        for entry in unique {
            merged.push(entry);
        }
        (merged, duplicates)
    }

    fn push(&mut self, entry: IndexEntry) {
        self.cik.push(entry.cik);
        self.company_name.push(entry.company_name);
        self.form_type.push(entry.form_type);
        self.date_filed.push(entry.date_filed);
        self.filename.push(entry.filename);
    }

    pub fn len(&self) -> usize {
        self.cik.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cik.is_empty()
    }

    /// Row `i` as an owned entry.
    pub fn get(&self, i: usize) -> Option<IndexEntry> {
        Some(IndexEntry {
            cik: *self.cik.get(i)?,
            company_name: self.company_name.get(i)?.clone(),
            form_type: self.form_type.get(i)?.clone(),
            date_filed: self.date_filed.get(i)?.clone(),
            filename: self.filename.get(i)?.clone(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = IndexEntry> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Rows matching `options`, after offset and limit.
    pub fn filter(&self, options: &FilingOptions) -> Vec<IndexEntry> {
        let matching = (0..self.len())
            .filter(|&i| {
                options.matches_cik(self.cik[i])
                    && options.matches_form(&self.form_type[i])
                    && options.matches_date(&self.date_filed[i])
            })
            .filter_map(|i| self.get(i))
            .skip(options.offset.unwrap_or(0));

        match options.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    /// Reads a merged artifact written by [`MergedIndex::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(GzDecoder::new(File::open(path)?));
        Ok(serde_json::from_reader(reader)?)
    }

    /// Writes the table as gzip-compressed JSON via `<path>.tmp`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = crate::index::candidate_path(path);
        let write = || -> Result<()> {
            let file = BufWriter::new(File::create(&tmp)?);
            let mut encoder = GzEncoder::new(file, Compression::default());
            serde_json::to_writer(&mut encoder, self)?;
            encoder.finish()?.flush()?;
            Ok(())
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Every `.csv` under `full-index/` and `daily-index/`, sorted by path.
pub fn find_source_csvs(layout: &DataLayout) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = [layout.full_index_dir(), layout.daily_index_dir()]
        .into_iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
        .collect();
    found.sort();
    found
}

/// Whether the merged artifact is missing or older than any source.
pub fn needs_rebuild(merged: &Path, sources: &[PathBuf]) -> bool {
    let Ok(merged_time) = fs::metadata(merged).and_then(|m| m.modified()) else {
        return true;
    };
    let newest = sources
        .iter()
        .filter_map(|p| fs::metadata(p).and_then(|m| m.modified()).ok())
        .max()
        .unwrap_or(SystemTime::UNIX_EPOCH);
    newest > merged_time
}

/// Reads one converted CSV into rows.
pub fn read_index_csv(path: &Path) -> Result<Vec<IndexEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut entries = Vec::new();
    for record in reader.deserialize() {
        entries.push(record?);
    }
    Ok(entries)
}

/// Rebuilds `merged-index.json.gz` from every source CSV when needed.
///
/// # Errors
///
/// `EdgarError::NoIndexData` when no source CSV could be loaded.
pub fn merge_indexes(layout: &DataLayout, force: bool) -> Result<MergeOutcome> {
    let sources = find_source_csvs(layout);
    let target = layout.merged_index_path();

    if !force && !sources.is_empty() && !needs_rebuild(&target, &sources) {
        tracing::debug!("Merged index is up to date");
        return Ok(MergeOutcome::UpToDate);
    }

    let mut entries = Vec::new();
    let mut loaded = 0;
    for source in &sources {
        match read_index_csv(source) {
            Ok(rows) => {
                entries.extend(rows);
                loaded += 1;
            }
            Err(e) => tracing::warn!("Skipping unreadable index CSV {}: {}", source.display(), e),
        }
    }

    if loaded == 0 {
        return Err(EdgarError::NoIndexData(sources.len()));
    }

    let (merged, duplicates) = MergedIndex::from_entries(entries);
    merged.save(&target)?;

    tracing::info!(
        "Merged {} source(s) into {} row(s), dropped {} duplicate(s)",
        loaded,
        merged.len(),
        duplicates
    );

    Ok(MergeOutcome::Rebuilt {
        rows: merged.len(),
        sources: loaded,
        duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(cik: u64, form: &str, date: &str, file: &str) -> IndexEntry {
        IndexEntry {
            cik,
            company_name: format!("COMPANY {}", cik),
            form_type: form.to_string(),
            date_filed: date.to_string(),
            filename: file.to_string(),
        }
    }

    #[test]
    fn test_dedup_and_sort() {
        let rows = vec![
            entry(1, "10-K", "2024-01-02", "a.txt"),
            entry(2, "8-K", "2024-03-01", "b.txt"),
            entry(1, "10-K", "2024-01-02", "a.txt"),
            entry(3, "10-Q", "2024-02-15", "c.txt"),
        ];
        let (merged, duplicates) = MergedIndex::from_entries(rows);
        assert_eq!(duplicates, 1);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.date_filed, vec!["2024-03-01", "2024-02-15", "2024-01-02"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_dates() {
        let rows = vec![
            entry(5, "8-K", "2024-01-02", "x.txt"),
            entry(4, "8-K", "2024-01-02", "y.txt"),
        ];
        let (merged, _) = MergedIndex::from_entries(rows);
        assert_eq!(merged.cik, vec![5, 4]);
    }

    #[test]
    fn test_filter() {
        let rows = vec![
            entry(1, "10-K", "2024-01-02", "a.txt"),
            entry(1, "10-K/A", "2024-02-02", "b.txt"),
            entry(2, "10-K", "2024-03-01", "c.txt"),
        ];
        let (merged, _) = MergedIndex::from_entries(rows);

        let opts = FilingOptions::new().with_cik(1).with_form_type("10-K");
        assert_eq!(merged.filter(&opts).len(), 2);

        let opts = opts.with_include_amendments(false);
        let hits = merged.filter(&opts);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].filename, "a.txt");

        let limited = merged.filter(&FilingOptions::new().with_offset(1).with_limit(1));
        assert_eq!(limited[0].filename, "b.txt");
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DataLayout::MERGED_INDEX_FILE);
        let (merged, _) = MergedIndex::from_entries(vec![entry(7, "D", "2023-07-03", "d.txt")]);

        merged.save(&path).unwrap();
        assert_eq!(MergedIndex::load(&path).unwrap(), merged);
        assert!(!crate::index::candidate_path(&path).exists());
    }

    #[test]
    fn test_merge_without_sources_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(tmp.path());
        layout.init().unwrap();
        assert!(matches!(
            merge_indexes(&layout, false),
            Err(EdgarError::NoIndexData(0))
        ));
    }
}
