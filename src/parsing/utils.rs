use crate::error::{EdgarError, Result};
use chrono::NaiveDate;

/// Normalizes an accession number to its dashed `NNNNNNNNNN-YY-NNNNNN` form.
///
/// Accepts the dashed form, the 18-digit undashed form, or an archive path such as
/// `edgar/data/320193/0000320193-24-000123.txt`.
pub fn normalize_accession(input: &str) -> Result<String> {
    let stem = input
        .trim()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim_end_matches(".txt");
    let digits: String = stem.chars().filter(|c| *c != '-').collect();

    if digits.len() != 18 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(EdgarError::InvalidAccession(input.to_string()));
    }

    Ok(format!("{}-{}-{}", &digits[..10], &digits[10..12], &digits[12..]))
}

/// Normalizes an index date (`YYYYMMDD` or `YYYY-MM-DD`) to `YYYY-MM-DD`.
///
/// Unrecognized values are returned trimmed but otherwise untouched.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    ["%Y-%m-%d", "%Y%m%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Human-readable byte size, e.g. `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// Replaces characters that are unsafe in file names and collapses whitespace.
pub fn sanitize_filename(name: &str) -> String {
    const MAX_LEN: usize = 200;

    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c| c == '.' || c == ' ');

    trimmed.chars().take(MAX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accession() {
        assert_eq!(
            normalize_accession("0000320193-24-000123").unwrap(),
            "0000320193-24-000123"
        );
        assert_eq!(
            normalize_accession("000032019324000123").unwrap(),
            "0000320193-24-000123"
        );
        assert_eq!(
            normalize_accession("edgar/data/320193/0000320193-24-000123.txt").unwrap(),
            "0000320193-24-000123"
        );
        assert!(normalize_accession("0000320193-24").is_err());
        assert!(normalize_accession("abcdefghij-24-000123").is_err());
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("20230703"), "2023-07-03");
        assert_eq!(normalize_date(" 2023-07-03 "), "2023-07-03");
        assert_eq!(normalize_date("n/a"), "n/a");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("0001-(10-K) ANNUAL REPORT  a10-k.htm"),
            "0001-(10-K) ANNUAL REPORT a10-k.htm"
        );
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("name\twith\nbreaks"), "name with breaks");
    }
}
