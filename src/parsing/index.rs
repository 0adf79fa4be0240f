use super::utils::{normalize_accession, normalize_date};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::str::FromStr;

/// Line index where data starts in a `master.idx` whose header row can't be found.
pub const DEFAULT_DATA_OFFSET: usize = 11;

/// How many leading lines are searched for the header row and its separator.
const PREAMBLE_SCAN_LINES: usize = 50;

#[derive(Default)]
pub struct IndexConfig {
    pub max_entries: Option<usize>,
    pub index_type: Option<IndexType>,
    /// Overrides [`DEFAULT_DATA_OFFSET`] when the header row is missing.
    pub data_offset: Option<usize>,
}

pub struct IndexParser {
    config: IndexConfig,
}

/// One row of an EDGAR index file.
///
/// Field names double as the CSV column names used by the converter and merge step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(rename = "CIK")]
    pub cik: u64,
    #[serde(rename = "Company Name")]
    pub company_name: String,
    #[serde(rename = "Form Type")]
    pub form_type: String,
    #[serde(rename = "Date Filed")]
    pub date_filed: String,
    /// Archive-relative path, e.g. `edgar/data/320193/0000320193-24-000123.txt`.
    #[serde(rename = "Filename")]
    pub filename: String,
}

impl IndexEntry {
    /// Absolute URL of the complete submission file.
    pub fn url(&self) -> String {
        format!("{}{}", IndexParser::ARCHIVES_PREFIX, self.filename)
    }

    /// Accession number derived from the file name, if it has the usual shape.
    pub fn accession_number(&self) -> Option<String> {
        normalize_accession(&self.filename).ok()
    }
}

/// Rows recovered from an index file plus a count of discarded data lines.
#[derive(Debug, Default)]
pub struct ParsedIndex {
    pub entries: Vec<IndexEntry>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndexType {
    /// `company.idx`: fixed width, ordered by company name.
    Company,
    /// `form.idx`: fixed width, ordered by form type.
    Form,
    /// `master.idx` / `xbrl.idx`: pipe-delimited.
    Master,
}

impl IndexType {
    pub const VARIANTS: &'static [(&'static str, IndexType)] = &[
        ("company", IndexType::Company),
        ("form", IndexType::Form),
        ("master", IndexType::Master),
        ("xbrl", IndexType::Master),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::VARIANTS
            .iter()
            .find(|(_, variant)| variant == self)
            .map(|(s, _)| *s)
            .unwrap_or("master")
    }

    /// Column widths for fixed-width layouts; the remainder of the line is the file name.
    fn field_widths(&self) -> Option<&'static [usize]> {
        match self {
            IndexType::Company => Some(&[62, 12, 12, 12]),
            IndexType::Form => Some(&[12, 62, 12, 12]),
            IndexType::Master => None,
        }
    }
}

/// Converts a string slice to an `IndexType` enumeration.
impl FromStr for IndexType {
    type Err = crate::EdgarError;

    fn from_str(s: &str) -> Result<Self> {
        Self::VARIANTS
            .iter()
            .find(|(pattern, _)| s.to_lowercase().contains(pattern))
            .map(|(_, variant)| *variant)
            .ok_or_else(|| crate::EdgarError::InvalidFormat("Unknown index type".to_string()))
    }
}

impl Default for IndexType {
    /// Master is the layout used by every full-index quarter and the top-level snapshot.
    fn default() -> Self {
        Self::Master
    }
}

/// A parser for EDGAR `.idx` files.
///
/// Index files open with a human-readable preamble of varying length:
///
/// ```text
/// Description:           Master Index of EDGAR Dissemination Feed
/// Last Data Received:    March 31, 2023
/// ...
/// CIK|Company Name|Form Type|Date Filed|Filename
/// --------------------------------------------------------------------------------
/// 1000045|NICHOLAS FINANCIAL INC|10-Q|2023-02-14|edgar/data/1000045/0000950170-23-002704.txt
/// ```
///
/// The parser looks for the header row (the line naming `CIK`, `Company Name` and
/// `Form Type`) and starts reading after the dashed separator that follows it. If no
/// header row shows up in the first lines, data is assumed to start at
/// [`DEFAULT_DATA_OFFSET`].
///
/// Rows are discarded (and counted in [`ParsedIndex::skipped`]) when the CIK is not an
/// integer or the company name / form type is empty.
///
/// # Examples
///
/// ```
/// use edgar_mirror::parsing::index::{IndexParser, IndexConfig};
///
/// let parser = IndexParser::new(IndexConfig::default());
/// let parsed = parser.parse("CIK|Company Name|Form Type|Date Filed|Filename\n---\n".as_bytes())?;
/// assert!(parsed.entries.is_empty());
/// # Ok::<(), edgar_mirror::EdgarError>(())
/// ```
impl IndexParser {
    pub const ARCHIVES_PREFIX: &'static str = "https://www.sec.gov/Archives/";

    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    fn is_header_row(line: &str) -> bool {
        line.contains("CIK") && line.contains("Company Name") && line.contains("Form Type")
    }

    fn is_separator(line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.starts_with("---") && trimmed.chars().all(|c| c == '-')
    }

    /// Infers the layout from the header row, falling back to the description line.
    fn detect_type(preamble: &[String]) -> IndexType {
        if let Some(header) = preamble.iter().find(|l| Self::is_header_row(l)) {
            if header.contains('|') {
                return IndexType::Master;
            }
            let form_at = header.find("Form Type").unwrap_or(usize::MAX);
            let company_at = header.find("Company Name").unwrap_or(usize::MAX);
            return if form_at < company_at {
                IndexType::Form
            } else {
                IndexType::Company
            };
        }

        for line in preamble.iter().take(10) {
            if line.contains("by Company Name") {
                return IndexType::Company;
            }
            if line.contains("by Form Type") {
                return IndexType::Form;
            }
        }

        IndexType::default()
    }

    /// Reads the preamble and returns `(preamble lines, index of first data line)`.
    fn read_preamble<R: BufRead>(
        &self,
        lines: &mut std::io::Lines<R>,
    ) -> Result<(Vec<String>, usize)> {
        let mut preamble = Vec::new();
        let mut header_seen = false;

        while preamble.len() < PREAMBLE_SCAN_LINES {
            let Some(line) = lines.next() else { break };
            let line = line?;

            if header_seen && Self::is_separator(&line) {
                preamble.push(line);
                let start = preamble.len();
                return Ok((preamble, start));
            }
            if Self::is_header_row(&line) {
                header_seen = true;
            }
            preamble.push(line);
        }

        let offset = self.config.data_offset.unwrap_or(DEFAULT_DATA_OFFSET);
        tracing::debug!(
            "Index header row not found, assuming data starts at line {}",
            offset
        );
        Ok((preamble, offset))
    }

    /// Parses a whole index file.
    ///
    /// # Errors
    ///
    /// Only I/O errors from `reader` are returned; malformed rows are skipped.
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<ParsedIndex> {
        let mut lines = reader.lines();
        let (preamble, data_start) = self.read_preamble(&mut lines)?;

        let index_type = match self.config.index_type {
            Some(t) => t,
            None => Self::detect_type(&preamble),
        };

        let mut parsed = ParsedIndex::default();
        let buffered = preamble.into_iter().skip(data_start).map(Ok);

        for line in buffered.chain(lines) {
            let line = line?;
            if line.trim().is_empty() || Self::is_separator(&line) {
                continue;
            }

            match self.parse_line(&line, &index_type) {
                Some(entry) => parsed.entries.push(entry),
                None => {
                    tracing::debug!("Skipping malformed index line: {}", line);
                    parsed.skipped += 1;
                }
            }

            if let Some(max) = self.config.max_entries {
                if parsed.entries.len() >= max {
                    break;
                }
            }
        }

        Ok(parsed)
    }

    /// Parses a single data line, returning `None` when the row must be discarded.
    fn parse_line(&self, line: &str, index_type: &IndexType) -> Option<IndexEntry> {
        let (cik, company_name, form_type, date_filed, filename) = match index_type.field_widths() {
            Some(widths) => {
                let fields = Self::parse_fixed_width(line, widths);
                if fields.len() < 5 {
                    return None;
                }
                match index_type {
                    IndexType::Form => (
                        fields[2].clone(),
                        fields[1].clone(),
                        fields[0].clone(),
                        fields[3].clone(),
                        fields[4].clone(),
                    ),
                    _ => (
                        fields[2].clone(),
                        fields[0].clone(),
                        fields[1].clone(),
                        fields[3].clone(),
                        fields[4].clone(),
                    ),
                }
            }
            None => {
                let fields: Vec<&str> = line.split('|').collect();
                if fields.len() < 5 {
                    return None;
                }
                // Anything between the CIK and the last three fields belongs to the name.
                let n = fields.len();
                (
                    fields[0].to_string(),
                    fields[1..n - 3].join("|"),
                    fields[n - 3].to_string(),
                    fields[n - 2].to_string(),
                    fields[n - 1].to_string(),
                )
            }
        };

        let cik = cik.trim().parse::<u64>().ok()?;
        let company_name = company_name.trim().to_string();
        let form_type = form_type.trim().to_string();
        if company_name.is_empty() || form_type.is_empty() {
            return None;
        }

        Some(IndexEntry {
            cik,
            company_name,
            form_type,
            date_filed: normalize_date(&date_filed),
            filename: filename.trim().to_string(),
        })
    }

    /// Splits a fixed-width line into fields, counting widths in characters.
    ///
    /// Whatever follows the last width becomes the final field.
    fn parse_fixed_width(line: &str, widths: &[usize]) -> Vec<String> {
        let mut result = Vec::with_capacity(widths.len() + 1);
        let mut rest = line;

        for &width in widths {
            if rest.is_empty() {
                break;
            }
            let split_at = rest
                .char_indices()
                .nth(width)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let (field, tail) = rest.split_at(split_at);
            result.push(field.trim().to_string());
            rest = tail;
        }

        if !rest.trim().is_empty() {
            result.push(rest.trim().to_string());
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    const MASTER_SAMPLE: &str = r#"Description:           Master Index of EDGAR Dissemination Feed
Last Data Received:    March 31, 2023
Comments:              webmaster@sec.gov
Anonymous FTP:         ftp://ftp.sec.gov/edgar/
Cloud HTTP:            https://www.sec.gov/Archives/




CIK|Company Name|Form Type|Date Filed|Filename
--------------------------------------------------------------------------------
1000045|NICHOLAS FINANCIAL INC|10-Q|2023-02-14|edgar/data/1000045/0000950170-23-002704.txt
320193|APPLE INC|10-K|2024-10-31|edgar/data/320193/0000320193-24-000123.txt
"#;

    #[test]
    fn test_index_type_conversion() {
        assert_eq!(
            IndexType::from_str("company_index").unwrap(),
            IndexType::Company
        );
        assert_eq!(IndexType::from_str("form.idx").unwrap(), IndexType::Form);
        assert_eq!(
            IndexType::from_str("master_list").unwrap(),
            IndexType::Master
        );
        assert_eq!(IndexType::from_str("xbrl.idx").unwrap(), IndexType::Master);
        assert!(IndexType::from_str("invalid").is_err());

        assert_eq!(IndexType::Company.as_str(), "company");
        assert_eq!(IndexType::Form.as_str(), "form");
        assert_eq!(IndexType::Master.as_str(), "master");
    }

    #[test]
    fn test_invalid_input() {
        let parser = IndexParser::new(IndexConfig::default());
        let result = parser.parse(BufReader::new("invalid content".as_bytes()));
        assert!(result.is_ok());
        assert!(result.unwrap().entries.is_empty());
    }

    #[test]
    fn test_master_index_with_pipe_delimiter() {
        let parser = IndexParser::new(IndexConfig::default());
        let parsed = parser.parse(BufReader::new(MASTER_SAMPLE.as_bytes())).unwrap();

        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.skipped, 0);
        let entry = &parsed.entries[0];
        assert_eq!(entry.cik, 1000045);
        assert_eq!(entry.company_name, "NICHOLAS FINANCIAL INC");
        assert_eq!(
            entry.url(),
            "https://www.sec.gov/Archives/edgar/data/1000045/0000950170-23-002704.txt"
        );
        assert_eq!(
            parsed.entries[1].accession_number().as_deref(),
            Some("0000320193-24-000123")
        );
    }

    #[test]
    fn test_fallback_offset_without_header() {
        // Eleven preamble lines with the header row mangled beyond recognition.
        let mut content = String::new();
        for i in 0..DEFAULT_DATA_OFFSET {
            content.push_str(&format!("preamble line {}\n", i));
        }
        content.push_str("320193|APPLE INC|10-K|2024-10-31|edgar/data/320193/0000320193-24-000123.txt\n");

        let parser = IndexParser::new(IndexConfig::default());
        let parsed = parser.parse(content.as_bytes()).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].cik, 320193);
    }

    #[test]
    fn test_bad_rows_are_discarded() {
        let content = "CIK|Company Name|Form Type|Date Filed|Filename\n\
-----------\n\
ABC|BAD CIK CORP|10-K|2024-01-02|edgar/data/1/x.txt\n\
42| |10-K|2024-01-02|edgar/data/42/x.txt\n\
43|NO FORM INC| |2024-01-02|edgar/data/43/x.txt\n\
44|TOO FEW FIELDS|10-K\n\
45|OK CORP|8-K|2024-01-02|edgar/data/45/0000000045-24-000001.txt\n";

        let parser = IndexParser::new(IndexConfig::default());
        let parsed = parser.parse(content.as_bytes()).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].cik, 45);
        assert_eq!(parsed.skipped, 4);
    }

    #[test]
    fn test_pipe_in_company_name() {
        let parser = IndexParser::new(IndexConfig::default());
        let line = "0000012345|ALPHA | OMEGA HOLDINGS|SC 13G|2023-02-14|edgar/data/12345/0000012345-23-000001.txt";
        let entry = parser.parse_line(line, &IndexType::Master).unwrap();

        assert_eq!(entry.cik, 12345);
        assert_eq!(entry.company_name, "ALPHA | OMEGA HOLDINGS");
        assert_eq!(entry.form_type, "SC 13G");
    }

    #[test]
    fn test_parse_company_index_line() {
        let parser = IndexParser::new(IndexConfig::default());
        let line = "3J LLC                                                        D           1975393     20230703    edgar/data/1975393/0001975393-23-000001.txt";

        let entry = parser.parse_line(line, &IndexType::Company).unwrap();

        assert_eq!(entry.company_name, "3J LLC");
        assert_eq!(entry.form_type, "D");
        assert_eq!(entry.cik, 1975393);
        assert_eq!(entry.date_filed, "2023-07-03");
        assert_eq!(entry.filename, "edgar/data/1975393/0001975393-23-000001.txt");
    }

    #[test]
    fn test_parse_form_index_line() {
        let parser = IndexParser::new(IndexConfig::default());
        let line = "10-K        APPLE INC                                                     320193      20241101    edgar/data/320193/0000320193-24-000123.txt";

        let entry = parser.parse_line(line, &IndexType::Form).unwrap();

        assert_eq!(entry.form_type, "10-K");
        assert_eq!(entry.company_name, "APPLE INC");
        assert_eq!(entry.cik, 320193);
        assert_eq!(entry.date_filed, "2024-11-01");
    }

    #[test]
    fn test_detects_form_layout_from_header() {
        let preamble = vec![
            "Description:           Daily Index of EDGAR Dissemination Feed by Form Type".to_string(),
            "Form Type   Company Name                                                  CIK         Date Filed  File Name".to_string(),
        ];
        assert_eq!(IndexParser::detect_type(&preamble), IndexType::Form);
    }

    #[test]
    fn test_max_entries() {
        let config = IndexConfig {
            max_entries: Some(1),
            ..Default::default()
        };
        let parsed = IndexParser::new(config)
            .parse(MASTER_SAMPLE.as_bytes())
            .unwrap();
        assert_eq!(parsed.entries.len(), 1);
    }
}
