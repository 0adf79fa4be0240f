//! SEC-HEADER block parsing.
//!
//! The header of a complete submission is an indented key/value outline:
//!
//! ```text
//! <SEC-HEADER>0000320193-24-000123.hdr.sgml : 20241101
//! <ACCEPTANCE-DATETIME>20241031180317
//! ACCESSION NUMBER:		0000320193-24-000123
//! CONFORMED SUBMISSION TYPE:	10-K
//! FILER:
//! 	COMPANY DATA:
//! 		COMPANY CONFORMED NAME:			Apple Inc.
//! 		CENTRAL INDEX KEY:			0000320193
//! 	BUSINESS ADDRESS:
//! 		CITY:		CUPERTINO
//! </SEC-HEADER>
//! ```
//!
//! Each line becomes a `(group, key, value)` record. A `KEY:` line with nothing after the
//! colon opens a group; nested groups are joined with `/` (`FILER/COMPANY DATA`) based
//! on tab depth.

use serde::Serialize;
use std::io::Write;

/// One `(group, key, value)` triple from a header block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderRecord {
    #[serde(rename = "Group")]
    pub group: String,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct HeaderRecords {
    pub records: Vec<HeaderRecord>,
    /// Lines that matched no rule.
    pub skipped: usize,
}

impl HeaderRecords {
    /// First value recorded under `key`, in any group.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.key.eq_ignore_ascii_case(key))
            .map(|r| r.value.as_str())
    }

    /// First value recorded under `key` within `group`.
    pub fn group_value(&self, group: &str, key: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.group == group && r.key.eq_ignore_ascii_case(key))
            .map(|r| r.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes the records as CSV with a `Group,Key,Value` header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> crate::Result<()> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv.write_record(["Group", "Key", "Value"])?;
        for record in &self.records {
            csv.serialize(record)?;
        }
        csv.flush()?;
        Ok(())
    }
}

/// Splits `<TAG>value` into `(TAG, value)`.
fn split_tag(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('<')?;
    if rest.starts_with('/') {
        return None;
    }
    let close = rest.find('>')?;
    let tag = &rest[..close];
    if tag.is_empty() || tag.contains(char::is_whitespace) {
        return None;
    }
    Some((tag, rest[close + 1..].trim()))
}

fn is_closing_tag(line: &str) -> bool {
    line.starts_with("</") && line.ends_with('>')
}

/// Parses the text inside `<SEC-HEADER>` (or `<IMS-HEADER>`) into records.
///
/// Lines matching no rule are skipped, logged at debug level and counted.
pub fn parse_header(text: &str) -> HeaderRecords {
    let mut out = HeaderRecords::default();
    let mut groups: Vec<String> = Vec::new();
    let mut pending_tag: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        let depth = line.chars().take_while(|c| *c == '\t').count();
        let content = line.trim();

        if let Some(tag) = pending_tag.take() {
            if split_tag(content).is_none() && !is_closing_tag(content) {
                out.records.push(HeaderRecord {
                    group: String::new(),
                    key: tag,
                    value: content.to_string(),
                });
                continue;
            }
            out.records.push(HeaderRecord {
                group: String::new(),
                key: tag,
                value: String::new(),
            });
        }

        if is_closing_tag(content) {
            continue;
        }

        if let Some((tag, inline)) = split_tag(content) {
            groups.clear();
            if inline.is_empty() {
                pending_tag = Some(tag.to_string());
            } else {
                out.records.push(HeaderRecord {
                    group: String::new(),
                    key: tag.to_string(),
                    value: inline.to_string(),
                });
            }
            continue;
        }

        let Some((key, value)) = content.split_once(':') else {
            tracing::debug!("Skipping unparsable header line: {}", content);
            out.skipped += 1;
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            tracing::debug!("Skipping header line without key: {}", content);
            out.skipped += 1;
            continue;
        }

        groups.truncate(depth);

        if value.is_empty() {
            // Missing intermediate levels are padded so depth stays aligned.
            while groups.len() < depth {
                groups.push(String::new());
            }
            groups.push(key.to_string());
            continue;
        }

        out.records.push(HeaderRecord {
            group: groups
                .iter()
                .filter(|g| !g.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join("/"),
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    if let Some(tag) = pending_tag {
        out.records.push(HeaderRecord {
            group: String::new(),
            key: tag,
            value: String::new(),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "0000320193-24-000123.hdr.sgml : 20241101\n\
<ACCEPTANCE-DATETIME>20241031180317\n\
ACCESSION NUMBER:\t\t0000320193-24-000123\n\
CONFORMED SUBMISSION TYPE:\t10-K\n\
PUBLIC DOCUMENT COUNT:\t\t96\n\
FILER:\n\
\tCOMPANY DATA:\t\n\
\t\tCOMPANY CONFORMED NAME:\t\t\tApple Inc.\n\
\t\tCENTRAL INDEX KEY:\t\t\t0000320193\n\
\tBUSINESS ADDRESS:\t\n\
\t\tCITY:\t\tCUPERTINO\n\
<PAPER>\n\
Y\n";

    #[test]
    fn test_groups_follow_indentation() {
        let parsed = parse_header(HEADER);

        assert_eq!(parsed.value("CONFORMED SUBMISSION TYPE"), Some("10-K"));
        assert_eq!(
            parsed.group_value("FILER/COMPANY DATA", "CENTRAL INDEX KEY"),
            Some("0000320193")
        );
        assert_eq!(parsed.group_value("FILER/BUSINESS ADDRESS", "CITY"), Some("CUPERTINO"));
        assert_eq!(parsed.value("ACCEPTANCE-DATETIME"), Some("20241031180317"));
    }

    #[test]
    fn test_tag_with_value_on_next_line() {
        let parsed = parse_header(HEADER);
        assert_eq!(parsed.value("PAPER"), Some("Y"));
    }

    #[test]
    fn test_unparsable_lines_are_counted() {
        let parsed = parse_header("no colon here\n:orphan value\n");
        assert!(parsed.is_empty());
        assert_eq!(parsed.skipped, 2);
    }

    #[test]
    fn test_write_csv() {
        let parsed = parse_header("FILER:\n\tCOMPANY DATA:\n\t\tCITY:\tA, B\n");
        let mut out = Vec::new();
        parsed.write_csv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Group,Key,Value\nFILER/COMPANY DATA,CITY,\"A, B\"\n"
        );
    }
}
