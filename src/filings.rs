//! Filing download and document extraction.
//!
//! A complete submission (`{archives}/data/{CIK}/{ACCESSION}.txt`) bundles every document
//! of a filing into one text file. Extraction splits it back apart: the SEC-HEADER block
//! becomes `sec-header.csv`, and each `<DOCUMENT>` becomes one file named
//! `{SEQ:04}-({TYPE}) {DESCRIPTION} {FILENAME}` inside a directory named after the
//! accession number. Uuencoded attachments found in older filings are decoded back to
//! their original bytes.
//!
//! Extraction is keyed by that directory: if it (or a `.zip` of it) already exists, the
//! call does nothing. Documents are written into `<dir>.tmp` first and the directory is
//! renamed into place only once every document has been written.
//!
//! # Examples
//!
//! ```ignore
//! use edgar_mirror::{DataLayout, Edgar, ExtractionStatus, FilingOperations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let edgar = Edgar::new("MyApp contact@example.com")?;
//!     let layout = DataLayout::new("edgar-data");
//!     layout.init()?;
//!
//!     let extraction = edgar
//!         .fetch_and_extract(&layout, 320193, "0000320193-24-000123")
//!         .await?;
//!     if extraction.status == ExtractionStatus::Extracted {
//!         for doc in &extraction.documents {
//!             println!("{} {} ({})", doc.sequence, doc.relative_path.display(), doc.human_size);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use super::Edgar;
use super::config::DataLayout;
use super::error::{EdgarError, Result};
use super::parsing::encoding::decode_bytes;
use super::parsing::header::parse_header;
use super::parsing::index::IndexEntry;
use super::parsing::submission::{ContainerDocument, ContainerParser, TagScanner};
use super::parsing::utils::{format_size, normalize_accession, sanitize_filename};
use super::parsing::uue;
use super::primary::{PrimaryDocumentOptions, identify_primary};
use super::traits::FilingOperations;
use async_trait::async_trait;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// File name of the header CSV inside an extraction directory.
pub const HEADER_CSV: &str = "sec-header.csv";

/// One document written out of a complete submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilingDocument {
    pub sequence: u32,
    pub doc_type: String,
    pub filename: String,
    pub description: String,
    /// Path relative to the extraction directory.
    pub relative_path: PathBuf,
    /// Size in bytes of the written file.
    pub file_size: u64,
    pub human_size: String,
    /// Whether the payload was a uuencoded attachment.
    pub uuencoded: bool,
    /// Number of HTML opening tags in the payload; zero for decoded binaries.
    pub html_elements: usize,
    /// Set when a uuencoded payload failed to decode and the raw text was kept instead.
    pub decode_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    Extracted,
    /// The extraction directory or its `.zip` already exists.
    AlreadyExtracted,
    /// Something went wrong; nothing was left on disk.
    Abandoned(String),
}

/// What an extraction produced.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub status: ExtractionStatus,
    pub documents: Vec<FilingDocument>,
    pub header_path: Option<PathBuf>,
    /// `CONFORMED SUBMISSION TYPE` from the header, when present.
    pub submission_type: Option<String>,
}

impl Extraction {
    fn empty(status: ExtractionStatus) -> Self {
        Self {
            status,
            documents: Vec::new(),
            header_path: None,
            submission_type: None,
        }
    }

    /// The primary document, looking for the header's submission type unless `options`
    /// names a form.
    pub fn primary_document(&self, options: &PrimaryDocumentOptions) -> Option<&FilingDocument> {
        match (&options.form_type, &self.submission_type) {
            (None, Some(form)) => {
                let options = options.clone().with_form_type(form.as_str());
                identify_primary(&self.documents, &options)
            }
            _ => identify_primary(&self.documents, options),
        }
    }
}

/// File name a container document is written under.
pub fn document_file_name(doc: &ContainerDocument) -> String {
    let mut name = format!(
        "{:04}-({}) {} {}",
        doc.sequence, doc.doc_type, doc.description, doc.filename
    );
    if doc.filename.trim().is_empty() {
        name.push_str(".txt");
    }
    sanitize_filename(&name)
}

/// Counts opening HTML tags, i.e. `<` followed by a letter.
pub fn count_html_elements(text: &str) -> usize {
    text.as_bytes()
        .windows(2)
        .filter(|w| w[0] == b'<' && w[1].is_ascii_alphabetic())
        .count()
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Extracts the complete submission at `source` into `out_dir` using [`TagScanner`].
pub fn extract_filing(source: &Path, out_dir: &Path) -> Extraction {
    extract_filing_with(&TagScanner, source, out_dir)
}

/// Extracts the complete submission at `source` into `out_dir`.
///
/// Never fails: problems are reported through [`ExtractionStatus::Abandoned`] and any
/// partially written directory is removed.
pub fn extract_filing_with<P: ContainerParser>(
    parser: &P,
    source: &Path,
    out_dir: &Path,
) -> Extraction {
    if out_dir.exists() || with_suffix(out_dir, ".zip").exists() {
        tracing::debug!("{} already extracted", out_dir.display());
        return Extraction::empty(ExtractionStatus::AlreadyExtracted);
    }

    let staging = with_suffix(out_dir, ".tmp");
    let result = fs::read(source)
        .map_err(EdgarError::from)
        .and_then(|bytes| extract_into(parser, &bytes, &staging, out_dir))
        .and_then(|extraction| {
            fs::rename(&staging, out_dir)?;
            Ok(extraction)
        });

    match result {
        Ok(extraction) => extraction,
        Err(e) => {
            tracing::warn!("Abandoning extraction of {}: {}", source.display(), e);
            if staging.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    tracing::warn!("Failed to remove {}: {}", staging.display(), cleanup);
                }
            }
            Extraction::empty(ExtractionStatus::Abandoned(e.to_string()))
        }
    }
}

fn extract_into<P: ContainerParser>(
    parser: &P,
    bytes: &[u8],
    staging: &Path,
    out_dir: &Path,
) -> Result<Extraction> {
    if staging.exists() {
        fs::remove_dir_all(staging)?;
    }
    fs::create_dir_all(staging)?;

    let decoded = decode_bytes(bytes);
    if decoded.lossy {
        tracing::warn!("Submission contained undecodable bytes; replaced with U+FFFD");
    }
    let container = parser.parse(&decoded.text);

    let mut extraction = Extraction::empty(ExtractionStatus::Extracted);

    if let Some(header) = &container.header {
        let records = parse_header(header);
        if records.skipped > 0 {
            tracing::debug!("Skipped {} unparsable header line(s)", records.skipped);
        }
        extraction.submission_type = records
            .value("CONFORMED SUBMISSION TYPE")
            .map(str::to_string);
        records.write_csv(BufWriter::new(File::create(staging.join(HEADER_CSV))?))?;
        extraction.header_path = Some(out_dir.join(HEADER_CSV));
    }

    for doc in &container.documents {
        extraction.documents.push(write_document(doc, staging)?);
    }

    Ok(extraction)
}

fn write_document(doc: &ContainerDocument, dir: &Path) -> Result<FilingDocument> {
    let name = document_file_name(doc);
    let target = dir.join(&name);
    let uuencoded = uue::looks_uuencoded(&doc.text);
    let mut decode_error = None;
    let mut html_elements = count_html_elements(&doc.text);

    if uuencoded {
        let intermediate = with_suffix(&target, ".uue");
        fs::write(&intermediate, doc.text.as_bytes())?;
        let decoded = uue::decode(BufReader::new(File::open(&intermediate)?));
        fs::remove_file(&intermediate)?;

        match decoded {
            Ok(bytes) => {
                fs::write(&target, bytes)?;
                html_elements = 0;
            }
            Err(e) => {
                tracing::warn!("Keeping raw text of {}: {}", name, e);
                decode_error = Some(e.to_string());
                fs::write(&target, doc.text.as_bytes())?;
            }
        }
    } else {
        fs::write(&target, doc.text.as_bytes())?;
    }

    let file_size = fs::metadata(&target)?.len();

    Ok(FilingDocument {
        sequence: doc.sequence,
        doc_type: doc.doc_type.clone(),
        filename: doc.filename.clone(),
        description: doc.description.clone(),
        relative_path: PathBuf::from(name),
        file_size,
        human_size: format_size(file_size),
        uuencoded,
        html_elements,
        decode_error,
    })
}

impl Edgar {
    /// URL of a complete submission: `{archives}/data/{CIK}/{ACCESSION}.txt`.
    ///
    /// `accession` may be dashed, undashed, or an index file path.
    pub fn filing_url(&self, cik: u64, accession: &str) -> Result<String> {
        let accession = normalize_accession(accession)?;
        Ok(format!("{}/data/{}/{}.txt", self.edgar_archives_url, cik, accession))
    }

    /// Fetches and extracts every filing listed in `entries`, one at a time.
    ///
    /// Per-filing failures are logged and skipped; only an interrupt stops the batch.
    pub async fn extract_entries(
        &self,
        layout: &DataLayout,
        entries: &[IndexEntry],
    ) -> Result<Vec<(String, Extraction)>> {
        let mut results = Vec::with_capacity(entries.len());

        for entry in entries {
            self.check_cancelled()?;
            let Some(accession) = entry.accession_number() else {
                tracing::warn!("No accession number in {}", entry.filename);
                continue;
            };
            match self.fetch_and_extract(layout, entry.cik, &accession).await {
                Ok(extraction) => results.push((accession, extraction)),
                Err(EdgarError::Interrupted) => return Err(EdgarError::Interrupted),
                Err(e) => {
                    tracing::warn!("Failed to fetch {}: {}", accession, e);
                    let abandoned = Extraction::empty(ExtractionStatus::Abandoned(e.to_string()));
                    results.push((accession, abandoned));
                }
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl FilingOperations for Edgar {
    async fn download_filing(
        &self,
        layout: &DataLayout,
        cik: u64,
        accession: &str,
    ) -> Result<PathBuf> {
        let accession = normalize_accession(accession)?;
        let path = layout.filing_path(cik, &accession);
        if tokio::fs::try_exists(&path).await? {
            return Ok(path);
        }
        let url = self.filing_url(cik, &accession)?;
        self.download(&url, &path).await?;
        Ok(path)
    }

    async fn fetch_and_extract(
        &self,
        layout: &DataLayout,
        cik: u64,
        accession: &str,
    ) -> Result<Extraction> {
        let accession = normalize_accession(accession)?;
        let out_dir = layout.extraction_dir(cik, &accession);
        if out_dir.exists() || with_suffix(&out_dir, ".zip").exists() {
            return Ok(Extraction::empty(ExtractionStatus::AlreadyExtracted));
        }

        let source = self.download_filing(layout, cik, &accession).await?;
        Ok(extract_filing(&source, &out_dir))
    }
}
