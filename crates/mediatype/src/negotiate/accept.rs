//! `Accept` and `Accept-Charset` header parsing.
//!
//! Both headers are comma separated lists of entries with an optional quality weight:
//!
//! ```text
//! Accept: text/html;level=1, application/json;q=0.8, */*;q=0.1
//! Accept-Charset: utf-8, iso-8859-1;q=0.5, *;q=0
//! ```
//!
//! Parsing is lenient per entry: an entry that cannot be parsed is skipped and the rest of the
//! header is still used.

use crate::content_type::ContentType;
use std::fmt;

/// A quality weight in thousandths, `0..=1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u16);

impl Quality {
    pub const ONE: Quality = Quality(1000);
    pub const ZERO: Quality = Quality(0);

    /// Parses a `qvalue`: `0` or `1` with up to three decimals, never above `1`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (int, frac) = raw.split_once('.').unwrap_or((raw, ""));
        if frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        match int {
            "0" => {
                let mut thousandths = 0u16;
                for (i, b) in frac.bytes().enumerate() {
                    thousandths += u16::from(b - b'0') * [100, 10, 1][i];
                }
                Some(Quality(thousandths))
            }
            "1" if frac.bytes().all(|b| b == b'0') => Some(Quality::ONE),
            _ => None,
        }
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn thousandths(self) -> u16 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::ONE
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1000 => f.write_str("1"),
            0 => f.write_str("0"),
            q => {
                let decimal = format!("0.{q:03}");
                f.write_str(decimal.trim_end_matches('0'))
            }
        }
    }
}

/// One entry of an `Accept` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRange {
    range: ContentType,
    charset: Option<String>,
    quality: Quality,
}

impl MediaRange {
    /// Parses a single `Accept` entry, `None` when it has to be skipped.
    ///
    /// Parameters after `q` are accept extensions and are ignored.
    pub fn parse(entry: &str) -> Option<Self> {
        let mut segments = split_unquoted(entry, b';');
        let mut raw = segments.next()?.trim().to_string();
        let mut quality = Quality::ONE;

        for param in segments {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            if let Some((name, value)) = param.split_once('=')
                && name.trim().eq_ignore_ascii_case("q")
            {
                quality = Quality::parse(value)?;
                break;
            }
            raw.push_str("; ");
            raw.push_str(param);
        }

        let mut range = ContentType::parse(&raw).ok()?;
        if range.main_type() == "*" && range.subtype() != "*" {
            return None;
        }
        let charset = range.take_param("charset").filter(|charset| !charset.is_empty());

        Some(Self { range, charset, quality })
    }

    /// The range without `q` and `charset`.
    pub fn range(&self) -> &ContentType {
        &self.range
    }

    /// The `charset` parameter of the range, lower-cased.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// How specifically this range matches `candidate`, `None` when it does not match.
    ///
    /// `*/*` scores 0, `type/*` 1 and `type/subtype` 2, each equal media type parameter adds 1.
    pub fn specificity(&self, candidate: &ContentType) -> Option<u32> {
        let base = match (self.range.main_type(), self.range.subtype()) {
            ("*", "*") => 0,
            (main, "*") if main == candidate.main_type() => 1,
            _ if self.range.mime_type() == candidate.mime_type() => 2,
            _ => return None,
        };

        let mut specificity = base;
        for (name, value) in self.range.parameters() {
            if candidate.param(name) != Some(value.as_str()) {
                return None;
            }
            specificity += 1;
        }
        Some(specificity)
    }
}

/// One entry of an `Accept-Charset` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharsetRange {
    charset: String,
    quality: Quality,
}

impl CharsetRange {
    pub fn parse(entry: &str) -> Option<Self> {
        let mut segments = split_unquoted(entry, b';');
        let charset = segments.next()?.trim().to_ascii_lowercase();
        if charset.is_empty() {
            return None;
        }

        let mut quality = Quality::ONE;
        for param in segments {
            if let Some((name, value)) = param.split_once('=')
                && name.trim().eq_ignore_ascii_case("q")
            {
                quality = Quality::parse(value)?;
                break;
            }
        }
        Some(Self { charset, quality })
    }

    /// The lower-cased charset label, `*` for the wildcard.
    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn is_wildcard(&self) -> bool {
        self.charset == "*"
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }
}

/// Parses an `Accept` header, skipping invalid entries. Header order is kept.
pub fn parse_accept(header: &str) -> Vec<MediaRange> {
    split_unquoted(header, b',').filter(|entry| !entry.trim().is_empty()).filter_map(MediaRange::parse).collect()
}

/// Parses an `Accept-Charset` header, skipping invalid entries. Header order is kept.
pub fn parse_accept_charset(header: &str) -> Vec<CharsetRange> {
    split_unquoted(header, b',').filter_map(CharsetRange::parse).collect()
}

/// Splits on `delimiter` outside of double quoted strings.
fn split_unquoted(input: &str, delimiter: u8) -> impl Iterator<Item = &str> {
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut parts = Vec::new();

    for (i, b) in input.bytes().enumerate() {
        match b {
            _ if escaped => escaped = false,
            b'\\' if in_quotes => escaped = true,
            b'"' => in_quotes = !in_quotes,
            _ if b == delimiter && !in_quotes => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts.into_iter()
}
