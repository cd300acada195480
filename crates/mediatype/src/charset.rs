//! Character encoding support for textual transcoders.
//!
//! Charset labels are resolved with the WHATWG encoding registry from `encoding_rs`, so the usual
//! aliases (`utf8`, `latin1`, `ascii`, ...) are accepted. Only encodings that can also be used for
//! output are considered supported: UTF-16 and `replacement` are decode-only and are rejected.

use crate::error::{DecodeError, EncodeError};
use encoding_rs::Encoding;
use std::borrow::Cow;

pub const DEFAULT_CHARSET: &str = "utf-8";

/// Resolves a charset label, `None` if it is unknown or cannot be used for output.
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    let encoding = Encoding::for_label_no_replacement(label.trim().as_bytes())?;
    (encoding.output_encoding() == encoding).then_some(encoding)
}

/// Whether `label` names a supported charset.
pub fn is_supported(label: &str) -> bool {
    lookup(label).is_some()
}

/// The lower-cased canonical name of an encoding, as used in `charset` parameters.
pub fn canonical_name(encoding: &'static Encoding) -> String {
    encoding.name().to_ascii_lowercase()
}

pub(crate) fn encode<'a>(text: &'a str, encoding: &'static Encoding) -> Result<Cow<'a, [u8]>, EncodeError> {
    let (bytes, _, had_unmappable) = encoding.encode(text);
    if had_unmappable {
        return Err(EncodeError::new(format!("text is not representable in {}", encoding.name())));
    }
    Ok(bytes)
}

pub(crate) fn decode<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Result<Cow<'a, str>, DecodeError> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| DecodeError::new(format!("body is not valid {}", encoding.name())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_aliases() {
        assert_eq!(lookup("UTF-8"), Some(encoding_rs::UTF_8));
        assert_eq!(lookup(" utf8 "), Some(encoding_rs::UTF_8));
        assert_eq!(lookup("latin1"), Some(encoding_rs::WINDOWS_1252));
        assert_eq!(canonical_name(encoding_rs::UTF_8), "utf-8");
    }

    #[test]
    fn test_lookup_rejects_unknown_and_decode_only() {
        assert!(lookup("klingon").is_none());
        assert!(lookup("utf-16le").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn test_encode_decode_latin1() {
        let encoding = lookup("iso-8859-1").unwrap();

        let bytes = encode("café", encoding).unwrap();
        assert_eq!(bytes.as_ref(), b"caf\xe9");
        assert_eq!(decode(&bytes, encoding).unwrap(), "café");
    }

    #[test]
    fn test_unmappable_and_malformed() {
        let latin1 = lookup("iso-8859-1").unwrap();
        assert!(encode("snow ☃", latin1).is_err());

        assert!(decode(b"\xff\xfe", encoding_rs::UTF_8).is_err());
    }
}
