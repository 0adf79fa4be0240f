//! Primary document identification.
//!
//! A filing's documents are the main form plus exhibits, graphics and XBRL files.
//! [`identify_primary`] picks the main one from signals that usually agree: the form
//! type named in `DESCRIPTION`/`TYPE`, the largest file, and the document with the most
//! HTML elements. When the form-matching document is tiny next to the richest document
//! (a cover page wrapping a large exhibit, say), the richer document wins.
//!
//! Without an explicit form type the lowest-sequence document names the form: SEC puts
//! the main form first, so its `TYPE` (or `DESCRIPTION` when `TYPE` is blank) is used.

use crate::filings::FilingDocument;

#[derive(Debug, Clone)]
pub struct PrimaryDocumentOptions {
    /// Form type to look for, e.g. `10-K`. Usually `CONFORMED SUBMISSION TYPE`.
    /// `None` takes the form from the lowest-sequence document.
    pub form_type: Option<String>,
    /// How many times denser the structure candidate must be to beat a form match.
    pub density_ratio: f64,
    /// Always pick this sequence when it exists.
    pub override_sequence: Option<u32>,
}

impl Default for PrimaryDocumentOptions {
    fn default() -> Self {
        Self {
            form_type: None,
            density_ratio: 10.0,
            override_sequence: None,
        }
    }
}

impl PrimaryDocumentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form_type(mut self, form_type: impl Into<String>) -> Self {
        self.form_type = Some(form_type.into());
        self
    }

    pub fn with_density_ratio(mut self, ratio: f64) -> Self {
        self.density_ratio = ratio;
        self
    }

    pub fn with_override_sequence(mut self, sequence: u32) -> Self {
        self.override_sequence = Some(sequence);
        self
    }
}

fn form_matches(doc: &FilingDocument, form: &str) -> bool {
    let form = form.trim().to_ascii_uppercase();
    !form.is_empty()
        && (doc.description.to_ascii_uppercase().contains(&form)
            || doc.doc_type.trim().eq_ignore_ascii_case(&form))
}

/// Form named by the lowest-sequence document: its `TYPE`, else its `DESCRIPTION`.
fn manifest_form(docs: &[FilingDocument]) -> Option<&str> {
    let first = docs.iter().min_by_key(|d| d.sequence)?;
    [first.doc_type.trim(), first.description.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
}

/// Picks the primary document, or `None` for an empty manifest.
///
/// Order of precedence:
/// 1. `override_sequence`, if a document has that sequence.
/// 2. With a form match (against `form_type`, or the form named by the lowest-sequence
///    document): the structure candidate only when
///    `candidate_elements / (form_elements + 1) > density_ratio`, else the form match.
/// 3. Without one: the document with the most HTML elements, or the largest file when
///    no document has any.
pub fn identify_primary<'a>(
    docs: &'a [FilingDocument],
    options: &PrimaryDocumentOptions,
) -> Option<&'a FilingDocument> {
    if let Some(seq) = options.override_sequence {
        if let Some(doc) = docs.iter().find(|d| d.sequence == seq) {
            return Some(doc);
        }
        tracing::debug!("Override sequence {} not in manifest", seq);
    }

    let by_size = docs
        .iter()
        .max_by_key(|d| (d.file_size, std::cmp::Reverse(d.sequence)))?;
    let candidate = docs
        .iter()
        .filter(|d| d.html_elements > 0)
        .max_by_key(|d| (d.html_elements, std::cmp::Reverse(d.sequence)))
        .unwrap_or(by_size);

    let form_match = options
        .form_type
        .as_deref()
        .or_else(|| manifest_form(docs))
        .and_then(|form| docs.iter().find(|d| form_matches(d, form)));

    match form_match {
        Some(matched) if matched.sequence != candidate.sequence => {
            let ratio = candidate.html_elements as f64 / (matched.html_elements as f64 + 1.0);
            if ratio > options.density_ratio {
                Some(candidate)
            } else {
                Some(matched)
            }
        }
        Some(matched) => Some(matched),
        None => Some(candidate),
    }
}
