//! Byte-to-text decoding for EDGAR payloads.
//!
//! Index files and complete submissions are nominally ASCII, but older filings carry
//! Latin-1 company names and the occasional stray byte. Decoding never fails: the
//! chain is BOM sniffing, strict UTF-8, windows-1252 (the WHATWG superset of
//! Latin-1), and finally UTF-8 with replacement characters.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

/// Text recovered from raw bytes, plus how it was obtained.
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    /// Name of the encoding that produced `text`.
    pub encoding: &'static str,
    /// `true` when undecodable bytes were replaced with U+FFFD.
    pub lossy: bool,
}

pub fn decode_bytes(bytes: &[u8]) -> DecodedText {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return DecodedText {
            text: text.into_owned(),
            encoding: encoding.name(),
            lossy: had_errors,
        };
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedText {
            text: text.to_string(),
            encoding: UTF_8.name(),
            lossy: false,
        };
    }

    if let Some(text) = WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes) {
        return DecodedText {
            text: text.into_owned(),
            encoding: WINDOWS_1252.name(),
            lossy: false,
        };
    }

    tracing::debug!("Falling back to lossy UTF-8 decoding");
    DecodedText {
        text: String::from_utf8_lossy(bytes).into_owned(),
        encoding: UTF_8.name(),
        lossy: true,
    }
}
