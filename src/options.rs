use chrono::NaiveDate;

/// Options for filtering merged index rows
#[derive(Debug, Clone)]
pub struct FilingOptions {
    pub form_types: Option<Vec<String>>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub ciks: Option<Vec<u64>>,
    /// Earliest `Date Filed` to keep (inclusive).
    pub date_from: Option<NaiveDate>,
    /// Latest `Date Filed` to keep (inclusive).
    pub date_to: Option<NaiveDate>,
    /// Whether to automatically include amendment forms (e.g., S-1/A when S-1 is requested).
    /// Defaults to true.
    pub include_amendments: bool,
}

impl Default for FilingOptions {
    fn default() -> Self {
        Self {
            form_types: None,
            offset: None,
            limit: None,
            ciks: None,
            date_from: None,
            date_to: None,
            include_amendments: true,
        }
    }
}

impl FilingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form_type(mut self, form_type: impl Into<String>) -> Self {
        let form_type = form_type.into();
        self.form_types = Some(vec![form_type]);
        self
    }

    pub fn with_form_types(mut self, form_types: Vec<String>) -> Self {
        self.form_types = Some(form_types);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cik(mut self, cik: u64) -> Self {
        self.ciks = Some(vec![cik]);
        self
    }

    pub fn with_ciks(mut self, ciks: Vec<u64>) -> Self {
        self.ciks = Some(ciks);
        self
    }

    pub fn with_date_from(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self
    }

    pub fn with_date_to(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    /// Set whether to include amendment forms automatically.
    ///
    /// When true (default), requesting "S-1" will also include "S-1/A" filings.
    /// When false, only the exact form type specified will be returned.
    pub fn with_include_amendments(mut self, include_amendments: bool) -> Self {
        self.include_amendments = include_amendments;
        self
    }

    /// Whether `form_type` passes the form filter.
    pub fn matches_form(&self, form_type: &str) -> bool {
        let Some(ref wanted) = self.form_types else {
            return true;
        };
        let form_type = form_type.trim();
        wanted.iter().any(|w| {
            let w = w.trim();
            form_type.eq_ignore_ascii_case(w)
                || (self.include_amendments
                    && form_type
                        .strip_suffix("/A")
                        .is_some_and(|base| base.eq_ignore_ascii_case(w)))
        })
    }

    /// Whether `cik` passes the CIK filter.
    pub fn matches_cik(&self, cik: u64) -> bool {
        self.ciks.as_ref().is_none_or(|ciks| ciks.contains(&cik))
    }

    /// Whether a `YYYY-MM-DD` filing date passes the date filter.
    ///
    /// Dates that don't parse only pass when no date bound is set.
    pub fn matches_date(&self, date_filed: &str) -> bool {
        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        let Ok(date) = NaiveDate::parse_from_str(date_filed, "%Y-%m-%d") else {
            return false;
        };
        self.date_from.is_none_or(|from| date >= from) && self.date_to.is_none_or(|to| date <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amendments_follow_flag() {
        let opts = FilingOptions::new().with_form_type("S-1");
        assert!(opts.matches_form("S-1"));
        assert!(opts.matches_form("S-1/A"));
        assert!(!opts.matches_form("S-11"));

        let strict = opts.with_include_amendments(false);
        assert!(!strict.matches_form("S-1/A"));
    }

    #[test]
    fn test_date_bounds() {
        let opts = FilingOptions::new()
            .with_date_from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .with_date_to(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert!(opts.matches_date("2024-10-31"));
        assert!(!opts.matches_date("2023-12-31"));
        assert!(!opts.matches_date("garbage"));
        assert!(FilingOptions::new().matches_date("garbage"));
    }
}
