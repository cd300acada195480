//! Transcoders convert between a [`Value`] and the bytes of one content type.
//!
//! Two flavors are provided:
//!
//! - [`TextTranscoder`] wraps a [`TextFormat`] that dumps to and loads from a `String`, and applies
//!   the character encoding around it
//! - [`BinaryTranscoder`] wraps a [`BinaryFormat`] that packs to and unpacks from bytes, the
//!   character encoding is ignored
//!
//! Plain functions can be used as formats through [`text_transcoder`] and [`binary_transcoder`].
//!
//! # Example
//! ```
//! use micro_mediatype::transcoder::{text_transcoder, Transcoder};
//! use micro_mediatype::Value;
//!
//! let plain = text_transcoder(
//!     "text/plain",
//!     |value: &Value| Ok(value.as_str().unwrap_or_default().to_string()),
//!     |text: &str| Ok(Value::from(text)),
//! )
//! .unwrap();
//!
//! let (content_type, bytes) = plain.to_bytes(&Value::from("hello"), None).unwrap();
//! assert_eq!(content_type, "text/plain; charset=utf-8");
//! assert_eq!(bytes.as_ref(), b"hello");
//! ```

mod form;
mod json;
#[cfg(feature = "msgpack")]
mod msgpack;

pub use form::{FormFormat, FormOptions, FormTranscoder, form_transcoder};
pub use json::{DefaultDumpObject, DumpObject, JsonFormat, JsonTranscoder, json_transcoder};
#[cfg(feature = "msgpack")]
pub use msgpack::{MSGPACK_CONTENT_TYPE, MsgPackFormat, MsgPackTranscoder, msgpack_transcoder};

use crate::charset;
use crate::content_type::ContentType;
use crate::error::{ContentError, DecodeError, EncodeError};
use crate::value::Value;
use bytes::Bytes;
use encoding_rs::Encoding;
use std::fmt;

/// Core trait of a codec registered for one content type.
///
/// A single instance is shared by all concurrent requests of its content type, so implementors
/// must not keep per-request mutable state.
///
/// Return [`EncodeError`]/[`DecodeError`] for problems with the data itself. Bugs inside a
/// transcoder should panic rather than be reported as a client error.
pub trait Transcoder: Send + Sync {
    /// The canonical content type this transcoder implements, without parameters.
    fn content_type(&self) -> &str;

    /// Encodes `value`, returning the full `Content-Type` header value and the body.
    fn to_bytes(&self, value: &Value, charset: Option<&str>) -> Result<(String, Bytes), EncodeError>;

    /// Decodes a body.
    fn from_bytes(&self, data: &[u8], charset: Option<&str>) -> Result<Value, DecodeError>;
}

/// A text serialization, the string half of a [`TextTranscoder`].
pub trait TextFormat: Send + Sync {
    fn dumps(&self, value: &Value) -> Result<String, EncodeError>;

    fn loads(&self, text: &str) -> Result<Value, DecodeError>;

    /// Dumps for a body that will be written in `encoding`.
    ///
    /// Formats that escape bytes inside the text, like form data, override this. The default
    /// ignores the encoding.
    fn dumps_in(&self, value: &Value, _encoding: &'static Encoding) -> Result<String, EncodeError> {
        self.dumps(value)
    }

    /// Loads text that was decoded from a body in `encoding`.
    fn loads_in(&self, text: &str, _encoding: &'static Encoding) -> Result<Value, DecodeError> {
        self.loads(text)
    }
}

/// A binary serialization, the byte half of a [`BinaryTranscoder`].
pub trait BinaryFormat: Send + Sync {
    fn pack(&self, value: &Value) -> Result<Vec<u8>, EncodeError>;

    fn unpack(&self, data: &[u8]) -> Result<Value, DecodeError>;
}

/// Transcodes between textual and value representations.
pub struct TextTranscoder<F> {
    content_type: String,
    format: F,
    default_encoding: &'static Encoding,
}

impl<F: TextFormat> TextTranscoder<F> {
    /// Creates a transcoder for `content_type`, a `charset` parameter is stripped.
    ///
    /// # Errors
    ///
    /// Fails if `content_type` cannot be parsed.
    pub fn new(content_type: &str, format: F) -> Result<Self, ContentError> {
        let content_type = ContentType::parse(content_type)?.without_param("charset").to_string();
        Ok(Self { content_type, format, default_encoding: encoding_rs::UTF_8 })
    }

    /// Sets the encoding used when no charset is given.
    ///
    /// # Errors
    ///
    /// Fails with [`ContentError::UnsupportedMediaType`] if `label` is not a supported charset.
    pub fn with_default_encoding(mut self, label: &str) -> Result<Self, ContentError> {
        self.default_encoding =
            charset::lookup(label).ok_or_else(|| ContentError::unsupported_charset(&self.content_type, label))?;
        Ok(self)
    }

    pub fn format(&self) -> &F {
        &self.format
    }

    pub fn default_encoding(&self) -> &'static Encoding {
        self.default_encoding
    }

    fn select_encoding(&self, charset: Option<&str>) -> Result<&'static Encoding, String> {
        match charset.map(str::trim).filter(|label| !label.is_empty()) {
            None => Ok(self.default_encoding),
            Some(label) => charset::lookup(label).ok_or_else(|| format!("unsupported charset {label}")),
        }
    }
}

impl<F: TextFormat> Transcoder for TextTranscoder<F> {
    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn to_bytes(&self, value: &Value, charset: Option<&str>) -> Result<(String, Bytes), EncodeError> {
        let encoding = self.select_encoding(charset).map_err(EncodeError::new)?;
        let dumped = self.format.dumps_in(value, encoding)?;
        let bytes = charset::encode(&dumped, encoding)?.into_owned();
        let content_type = format!("{}; charset={}", self.content_type, charset::canonical_name(encoding));
        Ok((content_type, Bytes::from(bytes)))
    }

    fn from_bytes(&self, data: &[u8], charset: Option<&str>) -> Result<Value, DecodeError> {
        let encoding = self.select_encoding(charset).map_err(DecodeError::new)?;
        let text = charset::decode(data, encoding)?;
        self.format.loads_in(&text, encoding)
    }
}

impl<F> fmt::Debug for TextTranscoder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextTranscoder")
            .field("content_type", &self.content_type)
            .field("default_encoding", &self.default_encoding.name())
            .finish_non_exhaustive()
    }
}

/// Packs and unpacks binary types, a thin veneer around a [`BinaryFormat`].
pub struct BinaryTranscoder<F> {
    content_type: String,
    format: F,
}

impl<F: BinaryFormat> BinaryTranscoder<F> {
    /// Creates a transcoder for `content_type`.
    ///
    /// # Errors
    ///
    /// Fails if `content_type` cannot be parsed.
    pub fn new(content_type: &str, format: F) -> Result<Self, ContentError> {
        let content_type = ContentType::parse(content_type)?.to_string();
        Ok(Self { content_type, format })
    }

    pub fn format(&self) -> &F {
        &self.format
    }
}

impl<F: BinaryFormat> Transcoder for BinaryTranscoder<F> {
    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn to_bytes(&self, value: &Value, _charset: Option<&str>) -> Result<(String, Bytes), EncodeError> {
        let packed = self.format.pack(value)?;
        Ok((self.content_type.clone(), Bytes::from(packed)))
    }

    fn from_bytes(&self, data: &[u8], _charset: Option<&str>) -> Result<Value, DecodeError> {
        self.format.unpack(data)
    }
}

impl<F> fmt::Debug for BinaryTranscoder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryTranscoder").field("content_type", &self.content_type).finish_non_exhaustive()
    }
}

/// A [`TextFormat`] made of a dump and a load function.
pub struct FnTextFormat<D, L> {
    dumps: D,
    loads: L,
}

impl<D, L> fmt::Debug for FnTextFormat<D, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTextFormat").finish_non_exhaustive()
    }
}

impl<D, L> TextFormat for FnTextFormat<D, L>
where
    D: Fn(&Value) -> Result<String, EncodeError> + Send + Sync,
    L: Fn(&str) -> Result<Value, DecodeError> + Send + Sync,
{
    fn dumps(&self, value: &Value) -> Result<String, EncodeError> {
        (self.dumps)(value)
    }

    fn loads(&self, text: &str) -> Result<Value, DecodeError> {
        (self.loads)(text)
    }
}

/// A [`BinaryFormat`] made of a pack and an unpack function.
pub struct FnBinaryFormat<P, U> {
    pack: P,
    unpack: U,
}

impl<P, U> fmt::Debug for FnBinaryFormat<P, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBinaryFormat").finish_non_exhaustive()
    }
}

impl<P, U> BinaryFormat for FnBinaryFormat<P, U>
where
    P: Fn(&Value) -> Result<Vec<u8>, EncodeError> + Send + Sync,
    U: Fn(&[u8]) -> Result<Value, DecodeError> + Send + Sync,
{
    fn pack(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        (self.pack)(value)
    }

    fn unpack(&self, data: &[u8]) -> Result<Value, DecodeError> {
        (self.unpack)(data)
    }
}

/// Creates a [`TextTranscoder`] from a pair of functions.
///
/// # Errors
///
/// Fails if `content_type` cannot be parsed.
pub fn text_transcoder<D, L>(content_type: &str, dumps: D, loads: L) -> Result<TextTranscoder<FnTextFormat<D, L>>, ContentError>
where
    D: Fn(&Value) -> Result<String, EncodeError> + Send + Sync,
    L: Fn(&str) -> Result<Value, DecodeError> + Send + Sync,
{
    TextTranscoder::new(content_type, FnTextFormat { dumps, loads })
}

/// Creates a [`BinaryTranscoder`] from a pair of functions.
///
/// # Errors
///
/// Fails if `content_type` cannot be parsed.
pub fn binary_transcoder<P, U>(content_type: &str, pack: P, unpack: U) -> Result<BinaryTranscoder<FnBinaryFormat<P, U>>, ContentError>
where
    P: Fn(&Value) -> Result<Vec<u8>, EncodeError> + Send + Sync,
    U: Fn(&[u8]) -> Result<Value, DecodeError> + Send + Sync,
{
    BinaryTranscoder::new(content_type, FnBinaryFormat { pack, unpack })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> TextTranscoder<impl TextFormat> {
        text_transcoder(
            "Text/Plain; charset=ISO-8859-1",
            |value: &Value| value.as_str().map(ToString::to_string).ok_or_else(|| EncodeError::unsupported_value(value.kind(), "text")),
            |text: &str| Ok(Value::from(text)),
        )
        .unwrap()
    }

    fn raw() -> BinaryTranscoder<impl BinaryFormat> {
        binary_transcoder(
            "application/octet-stream",
            |value: &Value| match value {
                Value::Bytes(bytes) => Ok(bytes.to_vec()),
                other => Err(EncodeError::unsupported_value(other.kind(), "raw")),
            },
            |data: &[u8]| Ok(Value::Bytes(Bytes::copy_from_slice(data))),
        )
        .unwrap()
    }

    #[test]
    fn test_text_strips_charset_from_content_type() {
        assert_eq!(plain().content_type(), "text/plain");
    }

    #[test]
    fn test_text_default_encoding() {
        let (content_type, bytes) = plain().to_bytes(&Value::from("café"), None).unwrap();

        assert_eq!(content_type, "text/plain; charset=utf-8");
        assert_eq!(bytes.as_ref(), "café".as_bytes());
    }

    #[test]
    fn test_text_empty_charset_uses_default() {
        let transcoder = plain().with_default_encoding("latin1").unwrap();
        let (content_type, bytes) = transcoder.to_bytes(&Value::from("café"), Some("")).unwrap();

        assert_eq!(content_type, "text/plain; charset=windows-1252");
        assert_eq!(bytes.as_ref(), b"caf\xe9");
        assert_eq!(transcoder.from_bytes(b"caf\xe9", None).unwrap(), Value::from("café"));
    }

    #[test]
    fn test_text_explicit_charset() {
        let transcoder = plain();
        let (content_type, bytes) = transcoder.to_bytes(&Value::from("café"), Some("ISO-8859-1")).unwrap();

        assert_eq!(content_type, "text/plain; charset=windows-1252");
        assert_eq!(transcoder.from_bytes(&bytes, Some("iso-8859-1")).unwrap(), Value::from("café"));
    }

    #[test]
    fn test_text_unknown_charset() {
        let transcoder = plain();

        assert!(transcoder.to_bytes(&Value::from("x"), Some("klingon")).is_err());
        assert!(transcoder.from_bytes(b"x", Some("klingon")).is_err());
        assert!(plain().with_default_encoding("klingon").is_err());
    }

    #[test]
    fn test_text_invalid_bytes() {
        let error = plain().from_bytes(b"\xff\xff", None).unwrap_err();
        assert!(error.reason().contains("UTF-8"));
    }

    #[test]
    fn test_text_dump_error() {
        assert!(plain().to_bytes(&Value::Integer(1), None).is_err());
    }

    #[test]
    fn test_binary_ignores_charset() {
        let transcoder = raw();
        let value = Value::Bytes(Bytes::from_static(b"\x00\x01"));

        let (content_type, bytes) = transcoder.to_bytes(&value, Some("klingon")).unwrap();
        assert_eq!(content_type, "application/octet-stream");
        assert_eq!(transcoder.from_bytes(&bytes, Some("klingon")).unwrap(), value);
    }

    #[test]
    fn test_malformed_content_type() {
        assert!(text_transcoder("plain", |_: &Value| Ok(String::new()), |_: &str| Ok(Value::Null)).is_err());
    }
}
