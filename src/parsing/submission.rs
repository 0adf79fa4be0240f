//! Complete submission container scanning.
//!
//! SEC's "complete submission" text file concatenates every document of a filing in an
//! SGML-like envelope:
//!
//! ```text
//! <SEC-DOCUMENT>0000320193-24-000123.txt : 20241101
//! <SEC-HEADER>0000320193-24-000123.hdr.sgml : 20241101
//! ...
//! </SEC-HEADER>
//! <DOCUMENT>
//! <TYPE>10-K
//! <SEQUENCE>1
//! <FILENAME>aapl-20240928.htm
//! <DESCRIPTION>10-K
//! <TEXT>
//! ...
//! </TEXT>
//! </DOCUMENT>
//! ```
//!
//! Tags are matched case-insensitively. A document without a closing tag runs to the end
//! of the input, and missing metadata tags come back as empty strings.

use std::ops::Range;

/// The parsed view of one complete submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilingContainer {
    /// Text inside `<SEC-HEADER>` (or `<IMS-HEADER>` for pre-1996 filings).
    pub header: Option<String>,
    pub documents: Vec<ContainerDocument>,
}

/// One `<DOCUMENT>` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerDocument {
    /// `<SEQUENCE>`, or the 1-based position when the tag is missing or not a number.
    pub sequence: u32,
    pub doc_type: String,
    pub filename: String,
    pub description: String,
    /// Payload of `<TEXT>`, without a surrounding `<PDF>` wrapper.
    pub text: String,
}

/// Splits raw submission text into a [`FilingContainer`].
pub trait ContainerParser {
    fn parse(&self, raw: &str) -> FilingContainer;
}

/// Hand-written tag scanner over the submission text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagScanner;

/// Parses `raw` with the default [`TagScanner`].
pub fn parse(raw: &str) -> FilingContainer {
    TagScanner.parse(raw)
}

impl ContainerParser for TagScanner {
    fn parse(&self, raw: &str) -> FilingContainer {
        // ASCII upper-casing keeps byte offsets valid for slicing `raw`.
        let upper = raw.to_ascii_uppercase();

        let header = find_element(&upper, "SEC-HEADER", 0)
            .or_else(|| find_element(&upper, "IMS-HEADER", 0))
            .map(|(body, _)| raw[body].trim().to_string());

        let mut documents = Vec::new();
        let mut pos = 0;
        while let Some((body, next)) = find_element(&upper, "DOCUMENT", pos) {
            let position = documents.len() + 1;
            documents.push(parse_document(&raw[body.clone()], &upper[body], position));
            pos = next;
        }

        FilingContainer { header, documents }
    }
}

/// Finds `<TAG>` at or after `from` and returns the byte range of its body, which ends at
/// `</TAG>` or the end of input, along with the position just past the element.
fn find_element(upper: &str, tag: &str, from: usize) -> Option<(Range<usize>, usize)> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = upper.get(from..)?.find(&open)? + from + open.len();
    match upper[start..].find(&close) {
        Some(len) => Some((start..start + len, start + len + close.len())),
        None => Some((start..upper.len(), upper.len())),
    }
}

/// Value of a one-line metadata tag such as `<TYPE>10-K`, searched before `<TEXT>`.
fn tag_value(block: &str, block_upper: &str, tag: &str) -> String {
    let open = format!("<{}>", tag);
    let limit = block_upper.find("<TEXT>").unwrap_or(block_upper.len());

    block_upper[..limit]
        .find(&open)
        .map(|at| {
            let rest = &block[at + open.len()..limit];
            rest.lines().next().unwrap_or_default().trim().to_string()
        })
        .unwrap_or_default()
}

fn parse_document(block: &str, block_upper: &str, position: usize) -> ContainerDocument {
    let sequence = tag_value(block, block_upper, "SEQUENCE")
        .parse::<u32>()
        .unwrap_or(position as u32);

    let text = find_element(block_upper, "TEXT", 0)
        .map(|(body, _)| strip_pdf_wrapper(trim_newlines(&block[body])).to_string())
        .unwrap_or_default();

    ContainerDocument {
        sequence,
        doc_type: tag_value(block, block_upper, "TYPE"),
        filename: tag_value(block, block_upper, "FILENAME"),
        description: tag_value(block, block_upper, "DESCRIPTION"),
        text,
    }
}

/// Drops the line break that follows `<TEXT>` and the one before `</TEXT>`.
fn trim_newlines(text: &str) -> &str {
    let text = text
        .strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text);
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

fn strip_pdf_wrapper(text: &str) -> &str {
    let trimmed = text.trim_start();
    if !trimmed.get(..5).is_some_and(|t| t.eq_ignore_ascii_case("<PDF>")) {
        return text;
    }
    let inner = trimmed[5..].trim_end();
    let inner = match inner.len().checked_sub(6) {
        Some(at) if inner.is_char_boundary(at) && inner[at..].eq_ignore_ascii_case("</PDF>") => {
            &inner[..at]
        }
        _ => inner,
    };
    inner.trim_matches(|c| c == '\r' || c == '\n')
}
