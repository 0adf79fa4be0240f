//! Monthly XBRL RSS feed parsing.
//!
//! Since April 2005 EDGAR publishes `monthly/xbrlrss-YYYY-MM.xml`, an RSS 2.0 document
//! with one `<item>` per XBRL-bearing filing. Each item carries an `edgar:xbrlFiling`
//! element with the accession number, CIK, form type, period and the list of XBRL files.
//! Only that metadata is parsed; the XBRL documents themselves are not.

use crate::Result;
use quick_xml::{Reader, events::Event};
use serde::Deserialize;

/// Configuration options for XBRL feed parsing.
#[derive(Default)]
pub struct XbrlFeedConfig {
    /// Maximum number of items to keep.
    pub max_entries: Option<usize>,

    /// Only keep items whose form type is listed (all items when empty).
    pub form_types: Vec<String>,
}

pub struct XbrlFeedParser {
    config: XbrlFeedConfig,
}

/// Root element of an RSS 2.0 feed document.
#[derive(Debug, Deserialize)]
pub struct RssDocument {
    /// The RSS channel containing all feed metadata and items.
    pub channel: Channel,
}

/// An RSS channel containing feed metadata and items.
#[derive(Debug, Deserialize)]
pub struct Channel {
    /// Name of the RSS channel.
    pub title: String,

    /// URL to the website corresponding to this channel (parsed manually).
    #[serde(skip)]
    pub link: String,

    /// Atom syndication link for feed discovery (parsed manually due to XML namespace).
    #[serde(skip)]
    pub atom_link: Option<AtomLink>,

    /// Textual description of the channel's content.
    #[serde(default)]
    pub description: String,

    /// Language the channel is written in (e.g., "en-us").
    pub language: Option<String>,

    #[serde(rename = "lastBuildDate")]
    pub last_build_date: Option<String>,

    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,

    #[serde(rename = "item", default)]
    pub items: Vec<Item>,
}

/// Atom-style link element for feed autodiscovery.
#[derive(Debug, Deserialize)]
pub struct AtomLink {
    #[serde(rename = "@href")]
    pub href: String,

    #[serde(rename = "@rel")]
    pub rel: Option<String>,

    #[serde(rename = "@type")]
    pub link_type: Option<String>,
}

/// One filing in the feed.
#[derive(Debug, Deserialize)]
pub struct Item {
    /// Company name and form type, e.g. `APPLE INC (0000320193) (Filer)`.
    pub title: String,

    /// Filing index page.
    pub link: String,

    pub description: Option<String>,

    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,

    pub guid: Option<String>,

    #[serde(rename = "xbrlFiling", default)]
    pub xbrl_filing: Option<XbrlFiling>,

    /// The zipped XBRL package.
    pub enclosure: Option<Enclosure>,
}

impl Item {
    /// Accession number from `edgar:xbrlFiling`, normalized to the dashed form.
    pub fn accession_number(&self) -> Option<String> {
        let raw = self.xbrl_filing.as_ref()?.accession_number.as_deref()?;
        crate::parsing::utils::normalize_accession(raw).ok()
    }

    pub fn cik(&self) -> Option<u64> {
        self.xbrl_filing
            .as_ref()?
            .cik_number
            .as_deref()?
            .trim()
            .parse()
            .ok()
    }

    pub fn form_type(&self) -> Option<&str> {
        self.xbrl_filing.as_ref()?.form_type.as_deref()
    }
}

/// `edgar:xbrlFiling` metadata.
#[derive(Debug, Deserialize)]
pub struct XbrlFiling {
    #[serde(rename = "@xmlns:edgar")]
    pub xmlns: Option<String>,

    #[serde(rename = "companyName")]
    pub company_name: Option<String>,

    #[serde(rename = "formType")]
    pub form_type: Option<String>,

    /// `MM/DD/YYYY`
    #[serde(rename = "filingDate")]
    pub filing_date: Option<String>,

    #[serde(rename = "cikNumber")]
    pub cik_number: Option<String>,

    /// Format: 0000000000-00-000000
    #[serde(rename = "accessionNumber")]
    pub accession_number: Option<String>,

    #[serde(rename = "fileNumber")]
    pub file_number: Option<String>,

    #[serde(rename = "acceptanceDatetime")]
    pub acceptance_datetime: Option<String>,

    /// Reporting period end date, `YYYYMMDD`.
    #[serde(rename = "period")]
    pub period: Option<String>,

    #[serde(rename = "assignedSic")]
    pub assigned_sic: Option<String>,

    /// `MMDD`
    #[serde(rename = "fiscalYearEnd")]
    pub fiscal_year_end: Option<String>,

    #[serde(rename = "xbrlFiles")]
    pub xbrl_files: Option<XbrlFiles>,
}

#[derive(Debug, Deserialize)]
pub struct XbrlFiles {
    #[serde(rename = "xbrlFile", default)]
    pub files: Vec<XbrlFile>,
}

/// Individual XBRL file reference within a filing.
#[derive(Debug, Deserialize)]
pub struct XbrlFile {
    #[serde(rename = "@sequence", default)]
    pub sequence: Option<String>,

    /// e.g. "EX-101.INS", "EX-101.SCH", "EX-101.CAL"
    #[serde(rename = "@type", default)]
    pub file_type: Option<String>,

    #[serde(rename = "@size", default)]
    pub size: Option<String>,

    #[serde(rename = "@description", default)]
    pub description: Option<String>,

    #[serde(rename = "@url", default)]
    pub url: Option<String>,

    #[serde(rename = "@inlineXBRL", default)]
    pub inline_xbrl: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Enclosure {
    #[serde(rename = "@url")]
    pub url: String,

    #[serde(rename = "@length")]
    pub length: Option<u64>,

    #[serde(rename = "@type")]
    pub enclosure_type: Option<String>,
}

impl XbrlFeedParser {
    pub fn new(config: XbrlFeedConfig) -> Self {
        Self { config }
    }

    /// Pulls the channel `<link>` and `<atom:link>` out by hand.
    ///
    /// The deserializer matches local names only, so both elements look like `link` to it
    /// and it fails with a duplicate field error.
    fn extract_links(&self, content: &str) -> Result<(String, Option<AtomLink>)> {
        let mut reader = Reader::from_str(content);
        let config = reader.config_mut();
        config.trim_text(true);

        let mut buf = Vec::new();
        let mut link = String::new();
        let mut atom_link = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                    b"link" if link.is_empty() => {
                        let has_href = e.attributes().flatten().any(|a| a.key.as_ref() == b"href");
                        if !has_href {
                            if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                                link = text.unescape()?.into_owned();
                            }
                        }
                    }
                    b"atom:link" => {
                        let mut href = String::new();
                        let mut rel = None;
                        let mut link_type = None;

                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"href" => href = attr.unescape_value()?.into_owned(),
                                b"rel" => rel = Some(attr.unescape_value()?.into_owned()),
                                b"type" => link_type = Some(attr.unescape_value()?.into_owned()),
                                _ => {}
                            }
                        }

                        if !href.is_empty() {
                            atom_link = Some(AtomLink { href, rel, link_type });
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
            buf.clear();
        }
        Ok((link, atom_link))
    }

    /// Parses a monthly XBRL feed document.
    ///
    /// # Errors
    ///
    /// `EdgarError::XmlError` if the document isn't well-formed RSS.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use edgar_mirror::parsing::rss::{XbrlFeedParser, XbrlFeedConfig};
    ///
    /// let parser = XbrlFeedParser::new(XbrlFeedConfig::default());
    /// assert!(parser.parse("not xml").is_err());
    /// ```
    pub fn parse(&self, content: &str) -> Result<RssDocument> {
        let mut rss: RssDocument = quick_xml::de::from_str(content)?;

        let (link, atom_link) = self.extract_links(content)?;
        rss.channel.link = link;
        rss.channel.atom_link = atom_link;

        if !self.config.form_types.is_empty() {
            rss.channel.items.retain(|item| {
                item.form_type().is_some_and(|f| {
                    self.config
                        .form_types
                        .iter()
                        .any(|w| w.eq_ignore_ascii_case(f))
                })
            });
        }

        if let Some(max) = self.config.max_entries {
            rss.channel.items.truncate(max);
        }

        Ok(rss)
    }
}
