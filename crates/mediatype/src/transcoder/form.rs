//! `application/x-www-form-urlencoded` transcoder.
//!
//! Decoding produces a [`Value::Map`] from key to an ordered [`Value::Array`] of strings:
//!
//! ```text
//! a=1&a=2&b=3   =>   {a: ["1", "2"], b: ["3"]}
//! c[]=x         =>   {c: ["x"]}
//! ```
//!
//! Keys ending in `[]` are array-style, the suffix is stripped and they always decode to an
//! array. The behavior can be tuned with [`FormOptions`].
//!
//! Percent escapes are bytes in the body's charset: with `charset=iso-8859-1`, `%E9` is `é`.
//! Decoding is strict, a `%` that is not followed by two hex digits, or escaped bytes that are
//! not valid in the charset, are rejected instead of being replaced.

use crate::charset;
use crate::error::{ContentError, DecodeError, EncodeError};
use crate::transcoder::{TextFormat, TextTranscoder};
use crate::value::{Map, Value, iso_format};
use encoding_rs::Encoding;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};
use std::collections::{BTreeMap, BTreeSet};

pub type FormTranscoder = TextTranscoder<FormFormat>;

const ARRAY_SUFFIX: &str = "[]";

/// Bytes left unescaped by the urlencoded serializer, space is written as `+` separately.
const FORM_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'*').remove(b'-').remove(b'.').remove(b'_');

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormOptions {
    flatten_single: bool,
    reject_duplicates: bool,
    array_brackets: bool,
}

impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-valued, non array-style keys decode to a plain string instead of a one item array,
    /// and one item arrays encode without brackets.
    #[must_use]
    pub fn flatten_single(mut self, flatten: bool) -> Self {
        self.flatten_single = flatten;
        self
    }

    /// A key that appears more than once without the `[]` suffix is a decode error.
    #[must_use]
    pub fn reject_duplicates(mut self, reject: bool) -> Self {
        self.reject_duplicates = reject;
        self
    }

    /// Arrays are encoded as `key[]=v` instead of a repeated `key=v`.
    #[must_use]
    pub fn array_brackets(mut self, brackets: bool) -> Self {
        self.array_brackets = brackets;
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormFormat {
    options: FormOptions,
}

impl FormFormat {
    pub fn new(options: FormOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    fn pairs(&self, value: &Value) -> Result<Vec<(String, String)>, EncodeError> {
        let map = match value {
            Value::Map(map) => map,
            other => return Err(EncodeError::unsupported_value(other.kind(), "form")),
        };

        let mut pairs: Vec<(String, String)> = Vec::with_capacity(map.len());
        for (key, value) in map {
            if let Value::Array(items) = value {
                let flattened = self.options.flatten_single && items.len() == 1;
                let name = if self.options.array_brackets && !flattened { format!("{key}{ARRAY_SUFFIX}") } else { key.clone() };
                for item in items {
                    pairs.push((name.clone(), scalar(key, item)?));
                }
            } else {
                pairs.push((key.clone(), scalar(key, value)?));
            }
        }
        Ok(pairs)
    }
}

fn scalar(key: &str, value: &Value) -> Result<String, EncodeError> {
    Ok(match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => s.clone(),
        Value::DateTime(timestamp) => iso_format(timestamp),
        Value::Bytes(bytes) => std::str::from_utf8(bytes)
            .map(ToString::to_string)
            .map_err(|e| EncodeError::new(format!("field {key} holds bytes that are not UTF-8: {e}")).with_kind(value.kind()))?,
        Value::Array(_) | Value::Map(_) => {
            return Err(EncodeError::new(format!("field {key} is nested, form data only holds flat values")).with_kind(value.kind()));
        }
    })
}

fn encode_component(text: &str, encoding: &'static Encoding) -> Result<String, EncodeError> {
    let bytes = charset::encode(text, encoding)?;
    Ok(percent_encode(&bytes, FORM_ESCAPE).to_string().replace("%20", "+"))
}

fn unescape_bytes(escaped: &mut Vec<u8>, encoding: &'static Encoding, decoded: &mut String) -> Result<(), DecodeError> {
    if escaped.is_empty() {
        return Ok(());
    }
    let text = encoding
        .decode_without_bom_handling_and_without_replacement(escaped)
        .ok_or_else(|| DecodeError::new(format!("percent-encoded data is not valid {}", encoding.name())))?;
    decoded.push_str(&text);
    escaped.clear();
    Ok(())
}

/// Decodes one key or value. Runs of escapes are collected and decoded together, so a
/// multi-byte character split over several escapes comes out whole.
fn decode_component(raw: &str, encoding: &'static Encoding) -> Result<String, DecodeError> {
    let mut segments = raw.split('%');
    let mut decoded = segments.next().unwrap_or_default().replace('+', " ");
    let mut escaped = Vec::new();

    for segment in segments {
        let byte = segment
            .get(..2)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .ok_or_else(|| DecodeError::new("malformed percent escape"))?;
        escaped.push(byte);

        let literal = &segment[2..];
        if !literal.is_empty() {
            unescape_bytes(&mut escaped, encoding, &mut decoded)?;
            decoded.push_str(&literal.replace('+', " "));
        }
    }

    unescape_bytes(&mut escaped, encoding, &mut decoded)?;
    Ok(decoded)
}

impl TextFormat for FormFormat {
    fn dumps(&self, value: &Value) -> Result<String, EncodeError> {
        self.dumps_in(value, encoding_rs::UTF_8)
    }

    fn loads(&self, text: &str) -> Result<Value, DecodeError> {
        self.loads_in(text, encoding_rs::UTF_8)
    }

    fn dumps_in(&self, value: &Value, encoding: &'static Encoding) -> Result<String, EncodeError> {
        let pairs = self.pairs(value)?;
        if encoding == encoding_rs::UTF_8 {
            return serde_urlencoded::to_string(&pairs).map_err(EncodeError::new);
        }

        let encoded = pairs
            .iter()
            .map(|(key, value)| Ok(format!("{}={}", encode_component(key, encoding)?, encode_component(value, encoding)?)))
            .collect::<Result<Vec<_>, EncodeError>>()?;
        Ok(encoded.join("&"))
    }

    fn loads_in(&self, text: &str, encoding: &'static Encoding) -> Result<Value, DecodeError> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut array_keys = BTreeSet::new();
        let mut plain_keys = BTreeSet::new();

        for pair in text.split('&').filter(|pair| !pair.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let mut key = decode_component(raw_key, encoding)?;
            let value = decode_component(raw_value, encoding)?;

            if let Some(stripped) = key.strip_suffix(ARRAY_SUFFIX) {
                key = stripped.to_string();
                array_keys.insert(key.clone());
            } else if self.options.reject_duplicates && !plain_keys.insert(key.clone()) {
                // the key is request content, keep it out of the message
                return Err(DecodeError::new("duplicate key in form data"));
            }
            grouped.entry(key).or_default().push(value);
        }

        let map: Map = grouped
            .into_iter()
            .map(|(key, mut values)| {
                let value = if self.options.flatten_single && values.len() == 1 && !array_keys.contains(&key) {
                    Value::String(values.remove(0))
                } else {
                    Value::Array(values.into_iter().map(Value::String).collect())
                };
                (key, value)
            })
            .collect();

        Ok(Value::Map(map))
    }
}

/// The `application/x-www-form-urlencoded` transcoder.
///
/// # Errors
///
/// Never fails for the built-in content type, the `Result` mirrors the other constructors.
pub fn form_transcoder(options: FormOptions) -> Result<FormTranscoder, ContentError> {
    TextTranscoder::new(mime::APPLICATION_WWW_FORM_URLENCODED.essence_str(), FormFormat::new(options))
}
