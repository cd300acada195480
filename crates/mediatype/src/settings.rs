//! The registry of content types a server can decode and encode.
//!
//! [`ContentSettings`] is filled once at startup and then moved into a
//! [`ContentHandler`](crate::ContentHandler), after which it is only read.
//!
//! # Example
//! ```
//! use micro_mediatype::ContentSettings;
//! use micro_mediatype::transcoder::json_transcoder;
//!
//! let mut settings = ContentSettings::new();
//! settings.register_transcoder("Application/JSON", json_transcoder().unwrap()).unwrap();
//! settings.set_default_content_type("application/json", Some("utf-8")).unwrap();
//!
//! assert!(settings.get("application/json").is_some());
//! assert!(settings.default_is_registered());
//! ```

use crate::charset;
use crate::content_type::ContentType;
use crate::error::{ContentError, DecodeError, EncodeError};
use crate::transcoder::{self, FormOptions, Transcoder};
use crate::value::Value;
use encoding_rs::Encoding;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Default)]
pub struct ContentSettings {
    default_content_type: Option<ContentType>,
    default_encoding: Option<&'static Encoding>,
    handlers: HashMap<String, Arc<dyn Transcoder>>,
    available_content_types: Vec<ContentType>,
}

impl ContentSettings {
    /// An empty registry without a default content type.
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON (the default, `utf-8`), form-urlencoded and, with the `msgpack` feature, MessagePack.
    ///
    /// # Errors
    ///
    /// Never fails for the bundled transcoders, the `Result` mirrors the registration calls.
    pub fn standard() -> Result<Self, ContentError> {
        let mut settings = Self::new();
        settings.add_transcoder(transcoder::json_transcoder()?)?;
        settings.add_transcoder(transcoder::form_transcoder(FormOptions::default())?)?;
        #[cfg(feature = "msgpack")]
        settings.add_transcoder(transcoder::msgpack_transcoder()?)?;
        settings.set_default_content_type(mime::APPLICATION_JSON.essence_str(), Some(charset::DEFAULT_CHARSET))?;
        Ok(settings)
    }

    /// Records the default content type and encoding, nothing is registered.
    ///
    /// A `charset` parameter on `content_type` is used when `encoding` is `None`.
    ///
    /// # Errors
    ///
    /// [`ContentError::MalformedContentType`] if `content_type` cannot be parsed,
    /// [`ContentError::UnsupportedMediaType`] if the encoding is unknown.
    pub fn set_default_content_type(&mut self, content_type: &str, encoding: Option<&str>) -> Result<&mut Self, ContentError> {
        let mut content_type = ContentType::parse(content_type)?;
        let label = encoding.map(ToString::to_string).or_else(|| content_type.take_param("charset"));

        let encoding = match label.as_deref() {
            Some(label) => Some(
                charset::lookup(label).ok_or_else(|| ContentError::unsupported_charset(content_type.mime_type(), label))?,
            ),
            None => None,
        };

        debug!(content_type = %content_type.mime_type(), encoding = ?encoding.map(Encoding::name), "set default content type");
        self.default_content_type = Some(content_type.essence());
        self.default_encoding = encoding;
        Ok(self)
    }

    /// Registers `transcoder` for the mime type of `content_type`.
    ///
    /// Registering a mime type again replaces its transcoder and keeps its position in
    /// [`available_content_types`](Self::available_content_types).
    ///
    /// # Errors
    ///
    /// [`ContentError::MalformedContentType`] if `content_type` cannot be parsed.
    pub fn register_transcoder<T>(&mut self, content_type: &str, transcoder: T) -> Result<&mut Self, ContentError>
    where
        T: Transcoder + 'static,
    {
        self.register_shared(content_type, Arc::new(transcoder))
    }

    /// Like [`register_transcoder`](Self::register_transcoder) for an already shared transcoder.
    ///
    /// # Errors
    ///
    /// [`ContentError::MalformedContentType`] if `content_type` cannot be parsed.
    pub fn register_shared(&mut self, content_type: &str, transcoder: Arc<dyn Transcoder>) -> Result<&mut Self, ContentError> {
        let content_type = ContentType::parse(content_type)?.essence();
        let mime_type = content_type.mime_type().to_string();

        if self.handlers.insert(mime_type.clone(), transcoder).is_some() {
            warn!(content_type = %mime_type, "replaced registered transcoder");
        } else {
            debug!(content_type = %mime_type, "registered transcoder");
            self.available_content_types.push(content_type);
        }
        Ok(self)
    }

    /// Registers `transcoder` under its own [`Transcoder::content_type`].
    ///
    /// # Errors
    ///
    /// [`ContentError::MalformedContentType`] if the transcoder reports an unparseable content type.
    pub fn add_transcoder<T>(&mut self, transcoder: T) -> Result<&mut Self, ContentError>
    where
        T: Transcoder + 'static,
    {
        let content_type = transcoder.content_type().to_string();
        self.register_transcoder(&content_type, transcoder)
    }

    /// Registers a textual content type from a dump and a load function.
    ///
    /// # Errors
    ///
    /// [`ContentError::MalformedContentType`] for an unparseable content type,
    /// [`ContentError::UnsupportedMediaType`] for an unknown `default_encoding`.
    pub fn add_text_content_type<D, L>(
        &mut self,
        content_type: &str,
        default_encoding: Option<&str>,
        dumps: D,
        loads: L,
    ) -> Result<&mut Self, ContentError>
    where
        D: Fn(&Value) -> Result<String, EncodeError> + Send + Sync + 'static,
        L: Fn(&str) -> Result<Value, DecodeError> + Send + Sync + 'static,
    {
        let mut text = transcoder::text_transcoder(content_type, dumps, loads)?;
        if let Some(label) = default_encoding {
            text = text.with_default_encoding(label)?;
        }
        self.add_transcoder(text)
    }

    /// Registers a binary content type from a pack and an unpack function.
    ///
    /// # Errors
    ///
    /// [`ContentError::MalformedContentType`] for an unparseable content type.
    pub fn add_binary_content_type<P, U>(&mut self, content_type: &str, pack: P, unpack: U) -> Result<&mut Self, ContentError>
    where
        P: Fn(&Value) -> Result<Vec<u8>, EncodeError> + Send + Sync + 'static,
        U: Fn(&[u8]) -> Result<Value, DecodeError> + Send + Sync + 'static,
    {
        self.add_transcoder(transcoder::binary_transcoder(content_type, pack, unpack)?)
    }

    /// Looks up the transcoder of a mime type, parameters are ignored. No wildcard matching.
    pub fn get(&self, mime_type: &str) -> Option<&Arc<dyn Transcoder>> {
        if let Some(transcoder) = self.handlers.get(mime_type) {
            return Some(transcoder);
        }
        let content_type = ContentType::parse(mime_type).ok()?;
        self.handlers.get(content_type.mime_type())
    }

    /// Registered content types, in registration order.
    pub fn available_content_types(&self) -> &[ContentType] {
        &self.available_content_types
    }

    pub fn default_content_type(&self) -> Option<&ContentType> {
        self.default_content_type.as_ref()
    }

    pub fn default_encoding(&self) -> Option<&'static Encoding> {
        self.default_encoding
    }

    /// `false` when a default content type is set but has no transcoder.
    pub fn default_is_registered(&self) -> bool {
        self.default_content_type.as_ref().is_none_or(|content_type| self.handlers.contains_key(content_type.mime_type()))
    }

    pub fn is_empty(&self) -> bool {
        self.available_content_types.is_empty()
    }
}

impl fmt::Debug for ContentSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentSettings")
            .field("default_content_type", &self.default_content_type.as_ref().map(ContentType::mime_type))
            .field("default_encoding", &self.default_encoding.map(Encoding::name))
            .field("available_content_types", &self.available_content_types.iter().map(ContentType::mime_type).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn echo(content_type: &str) -> impl Transcoder + 'static {
        transcoder::binary_transcoder(
            content_type,
            |_: &Value| Ok(b"echo".to_vec()),
            |data: &[u8]| Ok(Value::Bytes(Bytes::copy_from_slice(data))),
        )
        .unwrap()
    }

    fn mime_types(settings: &ContentSettings) -> Vec<&str> {
        settings.available_content_types().iter().map(ContentType::mime_type).collect()
    }

    #[test]
    fn test_register_normalizes() {
        let mut settings = ContentSettings::new();
        settings.register_transcoder("Application/Vnd.Custom; charset=UTF-8", echo("application/vnd.custom")).unwrap();

        assert_eq!(mime_types(&settings), vec!["application/vnd.custom"]);
        assert!(settings.get("application/vnd.custom").is_some());
        assert!(settings.get("APPLICATION/VND.CUSTOM; charset=latin1").is_some());
        assert!(settings.get("application/*").is_none());
        assert!(settings.get("application/json").is_none());
    }

    #[test]
    fn test_register_malformed() {
        let mut settings = ContentSettings::new();
        let error = settings.register_transcoder("custom", echo("application/octet-stream")).unwrap_err();

        assert!(matches!(error, ContentError::MalformedContentType { .. }));
        assert!(settings.is_empty());
    }

    #[test]
    fn test_reregistration_keeps_position() {
        let mut settings = ContentSettings::new();
        settings
            .register_transcoder("application/a", echo("application/a"))
            .unwrap()
            .register_transcoder("application/b", echo("application/b"))
            .unwrap();

        let replacement: Arc<dyn Transcoder> = Arc::new(echo("application/a"));
        settings.register_shared("application/a", Arc::clone(&replacement)).unwrap();
        settings.register_shared("application/a", Arc::clone(&replacement)).unwrap();

        assert_eq!(mime_types(&settings), vec!["application/a", "application/b"]);
        assert!(Arc::ptr_eq(settings.get("application/a").unwrap(), &replacement));
    }

    #[test]
    fn test_default_content_type() {
        let mut settings = ContentSettings::new();
        settings.set_default_content_type("text/csv; charset=latin1", None).unwrap();

        assert_eq!(settings.default_content_type().map(ContentType::mime_type), Some("text/csv"));
        assert_eq!(settings.default_encoding(), Some(encoding_rs::WINDOWS_1252));
        assert!(!settings.default_is_registered());
        assert!(settings.is_empty());

        settings.add_text_content_type("text/csv", None, |_: &Value| Ok(String::new()), |_: &str| Ok(Value::Null)).unwrap();
        assert!(settings.default_is_registered());
    }

    #[test]
    fn test_default_content_type_errors() {
        let mut settings = ContentSettings::new();

        assert!(matches!(settings.set_default_content_type("nope", None), Err(ContentError::MalformedContentType { .. })));
        assert!(matches!(
            settings.set_default_content_type("application/json", Some("klingon")),
            Err(ContentError::UnsupportedMediaType { .. })
        ));
        assert!(settings.default_content_type().is_none());
    }

    #[test]
    fn test_add_text_content_type_strips_charset() {
        let mut settings = ContentSettings::new();
        settings
            .add_text_content_type(
                "text/plain; charset=utf-8",
                Some("latin1"),
                |value: &Value| Ok(value.as_str().unwrap_or_default().to_string()),
                |text: &str| Ok(Value::from(text)),
            )
            .unwrap();

        let transcoder = settings.get("text/plain").unwrap();
        assert_eq!(transcoder.content_type(), "text/plain");

        let (content_type, bytes) = transcoder.to_bytes(&Value::from("é"), None).unwrap();
        assert_eq!(content_type, "text/plain; charset=windows-1252");
        assert_eq!(bytes.as_ref(), b"\xe9");
    }

    #[test]
    fn test_standard() {
        let settings = ContentSettings::standard().unwrap();

        assert_eq!(settings.default_content_type().map(ContentType::mime_type), Some("application/json"));
        assert!(settings.default_is_registered());

        let mut expected = vec!["application/json", "application/x-www-form-urlencoded"];
        if cfg!(feature = "msgpack") {
            expected.push("application/msgpack");
        }
        assert_eq!(mime_types(&settings), expected);
    }
}
