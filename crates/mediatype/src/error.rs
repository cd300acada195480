//! Error types for content negotiation and body transcoding.
//!
//! - [`ContentError`]: top-level error returned by the negotiator and the [`ContentHandler`](crate::ContentHandler)
//! - [`EncodeError`]: a transcoder failed to turn a value into bytes
//! - [`DecodeError`]: a transcoder failed to turn bytes into a value
//!
//! Every variant of [`ContentError`] is a distinct, client facing condition. Mapping it to an
//! HTTP status is left to the server, [`ContentError::status_code`] and
//! [`ContentError::into_response`] are provided for convenience.

use bytes::Bytes;
use http::{Response, StatusCode};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("malformed content type {value:?}: {reason}")]
    MalformedContentType { value: String, reason: String },

    #[error("unsupported media type: {content_type}")]
    UnsupportedMediaType { content_type: String },

    #[error("not acceptable: {accept:?}")]
    NotAcceptable { accept: String },

    #[error("encode error: {source}")]
    Encode {
        #[from]
        source: EncodeError,
    },

    #[error("decode error: {source}")]
    Decode {
        #[from]
        source: DecodeError,
    },
}

impl ContentError {
    pub fn malformed_content_type<V: ToString, R: ToString>(value: V, reason: R) -> Self {
        Self::MalformedContentType { value: value.to_string(), reason: reason.to_string() }
    }

    pub fn missing_content_type() -> Self {
        Self::malformed_content_type("", "missing Content-Type header")
    }

    pub fn unsupported_media_type<S: ToString>(content_type: S) -> Self {
        Self::UnsupportedMediaType { content_type: content_type.to_string() }
    }

    pub fn unsupported_charset(mime_type: &str, charset: &str) -> Self {
        Self::UnsupportedMediaType { content_type: format!("{mime_type}; charset={charset}") }
    }

    pub fn not_acceptable<S: ToString>(accept: S) -> Self {
        Self::NotAcceptable { accept: accept.to_string() }
    }

    /// The HTTP status a server should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ContentError::MalformedContentType { .. } | ContentError::Decode { .. } => StatusCode::BAD_REQUEST,
            ContentError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ContentError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            ContentError::Encode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders a short plain text response.
    ///
    /// The message never contains the request body.
    pub fn into_response(self) -> Response<Bytes> {
        let message: &'static str = match self {
            ContentError::MalformedContentType { .. } => "failed to parse content type",
            ContentError::UnsupportedMediaType { .. } => "cannot decode body of this media type",
            ContentError::NotAcceptable { .. } => "no acceptable representation",
            ContentError::Encode { .. } => "failed to encode response",
            ContentError::Decode { .. } => "failed to decode request",
        };

        let mut response = Response::new(Bytes::from_static(message.as_bytes()));
        *response.status_mut() = self.status_code();
        response.headers_mut().insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("text/plain; charset=utf-8"));
        response
    }
}

/// A value could not be encoded by a transcoder.
///
/// When the failure is tied to one value, its [`Value::kind`](crate::Value::kind) is kept for
/// diagnostics, the value itself is not.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct EncodeError {
    reason: String,
    kind: Option<&'static str>,
}

impl EncodeError {
    pub fn new<S: ToString>(reason: S) -> Self {
        Self { reason: reason.to_string(), kind: None }
    }

    pub fn unsupported_value(kind: &'static str, format: &str) -> Self {
        Self::new(format!("{kind} value is not {format} serializable")).with_kind(kind)
    }

    #[must_use]
    pub fn with_kind(mut self, kind: &'static str) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Kind of the value that failed to encode, if known.
    pub fn kind(&self) -> Option<&'static str> {
        self.kind
    }
}

/// Bytes could not be decoded by a transcoder.
///
/// The offending bytes are kept for diagnostics, they are left out of both the `Display`
/// and the `Debug` output so that request bodies never end up in logs by accident.
#[derive(Error)]
#[error("{reason}")]
pub struct DecodeError {
    reason: String,
    bytes: Bytes,
}

impl DecodeError {
    pub fn new<S: ToString>(reason: S) -> Self {
        Self { reason: reason.to_string(), bytes: Bytes::new() }
    }

    #[must_use]
    pub fn with_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.bytes = bytes.into();
        self
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeError").field("reason", &self.reason).field("len", &self.bytes.len()).finish()
    }
}
