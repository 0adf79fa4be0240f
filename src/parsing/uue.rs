//! Uuencode / uudecode.
//!
//! Pre-2001 EDGAR submissions embed binary exhibits (PDFs, images, spreadsheets) as
//! uuencoded text inside the `<TEXT>` element of a document:
//!
//! ```text
//! begin 644 exhibit.pdf
//! M)5!$1BTQ+C,*)>+CS],*,2`P(&]B:@H\/`HO5'EP92`O0V%T86QO9PHO4&%G
//! ...
//! `
//! end
//! ```
//!
//! Each body line starts with a length character (`32 + n` bytes, at most 45) followed
//! by groups of four characters, each carrying six bits. Both space and backtick
//! encode zero. Decoding is lenient in the same places real-world encoders are
//! sloppy: trailing spaces stripped by editors, CRLF line endings, and a missing
//! `end` line.

use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Bytes carried by one full body line.
const LINE_BYTES: usize = 45;

#[derive(Debug, Error)]
pub enum UueError {
    #[error("missing 'begin' line")]
    MissingBegin,

    #[error("invalid character on line {line}")]
    InvalidCharacter { line: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A decoded attachment along with the metadata from its `begin` line.
#[derive(Debug, Clone, PartialEq)]
pub struct UuFile {
    pub mode: u32,
    pub name: String,
    pub data: Vec<u8>,
}

/// Decodes the first uuencoded file found in `reader` and returns its bytes.
pub fn decode<R: BufRead>(reader: R) -> Result<Vec<u8>, UueError> {
    decode_file(reader).map(|file| file.data)
}

/// Decodes the first uuencoded file found in `reader`, keeping its mode and name.
///
/// Lines before `begin` are ignored.
pub fn decode_file<R: BufRead>(reader: R) -> Result<UuFile, UueError> {
    let mut lines = reader.split(b'\n').enumerate();
    let mut header = None;

    for (_, line) in lines.by_ref() {
        let line = line?;
        if let Some(parsed) = parse_begin_line(trim_line_end(&line)) {
            header = Some(parsed);
            break;
        }
    }

    let (mode, name) = header.ok_or(UueError::MissingBegin)?;
    let mut data = Vec::new();
    let mut terminated = false;

    for (idx, line) in lines {
        let line = line?;
        let line = trim_line_end(&line);

        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case(b"end") {
            terminated = true;
            break;
        }

        let len = decode_char(line[0]).ok_or(UueError::InvalidCharacter { line: idx + 1 })?;
        if len == 0 {
            continue;
        }

        decode_line(&line[1..], len as usize, &mut data)
            .ok_or(UueError::InvalidCharacter { line: idx + 1 })?;
    }

    if !terminated {
        tracing::warn!("Uuencoded payload '{}' has no 'end' line", name);
    }

    Ok(UuFile { mode, name, data })
}

/// Uuencodes `data` as `data` with mode 644.
pub fn encode<W: Write>(writer: W, data: &[u8]) -> io::Result<()> {
    encode_file(writer, "data", 0o644, data)
}

/// Uuencodes `data` with an explicit file name and mode.
pub fn encode_file<W: Write>(mut writer: W, name: &str, mode: u32, data: &[u8]) -> io::Result<()> {
    writeln!(writer, "begin {:o} {}", mode, name)?;

    for chunk in data.chunks(LINE_BYTES) {
        let mut line = Vec::with_capacity(1 + LINE_BYTES / 3 * 4);
        line.push(encode_char(chunk.len() as u8));

        for group in chunk.chunks(3) {
            let b0 = group[0];
            let b1 = group.get(1).copied().unwrap_or(0);
            let b2 = group.get(2).copied().unwrap_or(0);
            line.push(encode_char(b0 >> 2));
            line.push(encode_char(((b0 & 0x03) << 4) | (b1 >> 4)));
            line.push(encode_char(((b1 & 0x0f) << 2) | (b2 >> 6)));
            line.push(encode_char(b2 & 0x3f));
        }

        line.push(b'\n');
        writer.write_all(&line)?;
    }

    writer.write_all(b"`\nend\n")?;
    writer.flush()
}

/// Whether a text payload opens with a uuencode `begin` token.
pub fn looks_uuencoded(payload: &str) -> bool {
    payload
        .split_whitespace()
        .next()
        .is_some_and(|token| token.eq_ignore_ascii_case("begin"))
}

fn parse_begin_line(line: &[u8]) -> Option<(u32, String)> {
    let line = std::str::from_utf8(line).ok()?.trim_start();
    let mut parts = line.splitn(3, char::is_whitespace);

    if !parts.next()?.eq_ignore_ascii_case("begin") {
        return None;
    }

    let mode = parts
        .next()
        .and_then(|m| u32::from_str_radix(m.trim(), 8).ok())
        .unwrap_or(0o644);
    let name = parts.next().unwrap_or_default().trim().to_string();

    Some((mode, name))
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\r' | b'\n') {
        end -= 1;
    }
    &line[..end]
}

fn decode_char(c: u8) -> Option<u8> {
    match c {
        b' '..=b'`' => Some((c - b' ') & 0x3f),
        _ => None,
    }
}

fn encode_char(v: u8) -> u8 {
    if v == 0 { b'`' } else { v + b' ' }
}

/// Decodes `len` bytes from the body characters of one line.
///
/// Characters stripped from the end of the line are treated as zero.
fn decode_line(body: &[u8], len: usize, out: &mut Vec<u8>) -> Option<()> {
    let groups = len.div_ceil(3);
    let mut decoded = Vec::with_capacity(groups * 3);

    for g in 0..groups {
        let mut sextets = [0u8; 4];
        for (i, slot) in sextets.iter_mut().enumerate() {
            *slot = match body.get(g * 4 + i) {
                Some(&c) => decode_char(c)?,
                None => 0,
            };
        }
        decoded.push((sextets[0] << 2) | (sextets[1] >> 4));
        decoded.push((sextets[1] << 4) | (sextets[2] >> 2));
        decoded.push((sextets[2] << 6) | sextets[3]);
    }

    decoded.truncate(len);
    out.extend_from_slice(&decoded);
    Some(())
}
