//! Bridges negotiation and transcoding to HTTP requests and responses.
//!
//! [`ContentHandler`] owns a frozen [`ContentSettings`] and exposes two levels of API:
//!
//! - raw header strings and bytes: [`decode_body`](ContentHandler::decode_body) and
//!   [`encode_body`](ContentHandler::encode_body)
//! - `http` types: [`get_request_body`](ContentHandler::get_request_body),
//!   [`read_request`](ContentHandler::read_request) and
//!   [`send_response`](ContentHandler::send_response)
//!
//! # Example
//! ```
//! use micro_mediatype::{ContentHandler, ContentSettings, Value};
//!
//! let handler = ContentHandler::new(ContentSettings::standard().unwrap());
//!
//! let value = handler.decode_body(Some("application/x-www-form-urlencoded"), b"a=1&a=2&b=3").unwrap();
//! let encoded = handler.encode_body(Some("application/json"), &value).unwrap();
//!
//! assert_eq!(encoded.content_type(), "application/json; charset=utf-8");
//! assert_eq!(encoded.body().as_ref(), br#"{"a":["1","2"],"b":["3"]}"#);
//! ```

use crate::error::{ContentError, DecodeError, EncodeError};
use crate::negotiate::{self, Negotiated};
use crate::settings::ContentSettings;
use crate::value::Value;
use bytes::Bytes;
use http::header::{ACCEPT, ACCEPT_CHARSET, CONTENT_TYPE, VARY};
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response};
use http_body::Body;
use http_body_util::BodyExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, warn};

/// Anything that carries request headers.
pub trait HasHeaders {
    fn headers(&self) -> &HeaderMap;

    /// All values of `name` joined with `, `, `None` when absent or not visible ASCII.
    fn header_str(&self, name: &HeaderName) -> Option<Cow<'_, str>> {
        let mut values = self.headers().get_all(name).iter().filter_map(|value| value.to_str().ok());
        let first = values.next()?;
        match values.next() {
            None => Some(Cow::Borrowed(first)),
            Some(second) => {
                let mut joined = format!("{first}, {second}");
                for value in values {
                    joined.push_str(", ");
                    joined.push_str(value);
                }
                Some(Cow::Owned(joined))
            }
        }
    }
}

impl HasHeaders for HeaderMap {
    fn headers(&self) -> &HeaderMap {
        self
    }
}

impl HasHeaders for http::request::Parts {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl<B> HasHeaders for Request<B> {
    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }
}

/// Request headers a response body depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vary {
    accept_charset: bool,
}

impl Vary {
    /// `Accept` is always listed.
    pub fn accept(&self) -> bool {
        true
    }

    pub fn accept_charset(&self) -> bool {
        self.accept_charset
    }

    pub fn header_value(&self) -> HeaderValue {
        if self.accept_charset { HeaderValue::from_static("Accept, Accept-Charset") } else { HeaderValue::from_static("Accept") }
    }
}

/// An encoded response body with the headers that describe it.
#[derive(Debug, Clone)]
pub struct EncodedBody {
    content_type: String,
    body: Bytes,
    vary: Vary,
}

impl EncodedBody {
    /// The full `Content-Type` header value, including the charset of text types.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn vary(&self) -> Vary {
        self.vary
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Builds a `200 OK` response carrying this body.
    ///
    /// # Errors
    ///
    /// Fails with an encode error when the content type is not a valid header value.
    pub fn into_response(self) -> Result<Response<Bytes>, ContentError> {
        let content_type = HeaderValue::try_from(self.content_type.as_str())
            .map_err(|e| ContentError::from(EncodeError::new(format!("invalid content type header: {e}"))))?;

        let mut response = Response::new(self.body);
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, content_type);
        headers.append(VARY, self.vary.header_value());
        Ok(response)
    }
}

/// Decodes request bodies and encodes response bodies with a shared registry.
#[derive(Debug, Clone)]
pub struct ContentHandler {
    settings: Arc<ContentSettings>,
}

impl ContentHandler {
    /// Freezes `settings`. A default content type without a transcoder is logged, not rejected.
    pub fn new(settings: ContentSettings) -> Self {
        if !settings.default_is_registered() {
            warn!(
                content_type = ?settings.default_content_type().map(ToString::to_string),
                "default content type has no registered transcoder"
            );
        }
        Self { settings: Arc::new(settings) }
    }

    pub fn settings(&self) -> &ContentSettings {
        &self.settings
    }

    /// Negotiates the request `Content-Type` and decodes `body`.
    ///
    /// # Errors
    ///
    /// The errors of [`negotiate_request`](negotiate::negotiate_request), or
    /// [`ContentError::Decode`] when the body cannot be decoded.
    pub fn decode_body(&self, content_type: Option<&str>, body: &[u8]) -> Result<Value, ContentError> {
        let negotiated = negotiate::negotiate_request(&self.settings, content_type)?;

        negotiated.transcoder().from_bytes(body, negotiated.charset()).map_err(|e| {
            debug!(content_type = %negotiated.content_type(), len = body.len(), cause = %e, "failed to decode request body");
            ContentError::from(e.with_bytes(Bytes::copy_from_slice(body)))
        })
    }

    /// Negotiates the response content type from `Accept` and encodes `value`.
    ///
    /// # Errors
    ///
    /// [`ContentError::NotAcceptable`] when no registered type is acceptable,
    /// [`ContentError::Encode`] when `value` cannot be encoded.
    pub fn encode_body(&self, accept: Option<&str>, value: &Value) -> Result<EncodedBody, ContentError> {
        self.encode_body_with_charset(accept, None, value)
    }

    /// Like [`encode_body`](Self::encode_body), also honoring `Accept-Charset`.
    ///
    /// # Errors
    ///
    /// See [`encode_body`](Self::encode_body).
    pub fn encode_body_with_charset(
        &self,
        accept: Option<&str>,
        accept_charset: Option<&str>,
        value: &Value,
    ) -> Result<EncodedBody, ContentError> {
        let negotiated = negotiate::negotiate_response(&self.settings, accept, accept_charset)?;

        let (content_type, body) = negotiated.transcoder().to_bytes(value, negotiated.charset()).inspect_err(|e| {
            warn!(content_type = %negotiated.content_type(), cause = %e, "failed to encode response body");
        })?;

        Ok(EncodedBody { content_type, body, vary: Vary { accept_charset: negotiated.vary_charset() } })
    }

    /// The negotiated response content type for `accept`, without encoding anything.
    ///
    /// # Errors
    ///
    /// [`ContentError::NotAcceptable`] when no registered type is acceptable.
    pub fn response_content_type(&self, accept: Option<&str>) -> Result<Negotiated, ContentError> {
        negotiate::negotiate_response(&self.settings, accept, None)
    }

    /// Decodes `body` using the `Content-Type` of `request`.
    ///
    /// # Errors
    ///
    /// See [`decode_body`](Self::decode_body). A header that is not visible ASCII counts as
    /// malformed.
    pub fn get_request_body(&self, request: &impl HasHeaders, body: &[u8]) -> Result<Value, ContentError> {
        let content_type = match request.headers().get(CONTENT_TYPE) {
            None => None,
            Some(value) => {
                Some(value.to_str().map_err(|e| ContentError::malformed_content_type("<opaque>", e))?)
            }
        };
        self.decode_body(content_type, body)
    }

    /// Collects the body of `request` and decodes it.
    ///
    /// # Errors
    ///
    /// See [`get_request_body`](Self::get_request_body), reading the body fails with
    /// [`ContentError::Decode`].
    pub async fn read_request<B>(&self, request: Request<B>) -> Result<Value, ContentError>
    where
        B: Body,
        B::Error: Display,
    {
        let (parts, body) = request.into_parts();
        let bytes = body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| DecodeError::new(format!("failed to read request body: {e}")))?;

        self.get_request_body(&parts, &bytes)
    }

    /// Encodes `value` for the `Accept` and `Accept-Charset` headers of `request`.
    ///
    /// # Errors
    ///
    /// See [`encode_body`](Self::encode_body).
    pub fn send_response(&self, request: &impl HasHeaders, value: &Value) -> Result<Response<Bytes>, ContentError> {
        let accept = request.header_str(&ACCEPT);
        let accept_charset = request.header_str(&ACCEPT_CHARSET);

        self.encode_body_with_charset(accept.as_deref(), accept_charset.as_deref(), value)?.into_response()
    }

    /// Decodes `body` straight into `T`.
    ///
    /// # Errors
    ///
    /// See [`decode_body`](Self::decode_body), a value that does not fit `T` is a decode error.
    pub fn decode_typed<T: DeserializeOwned>(&self, content_type: Option<&str>, body: &[u8]) -> Result<T, ContentError> {
        Ok(self.decode_body(content_type, body)?.deserialize_into()?)
    }

    /// Encodes any serializable `value`.
    ///
    /// # Errors
    ///
    /// See [`encode_body`](Self::encode_body).
    pub fn encode_typed<T: Serialize + ?Sized>(&self, accept: Option<&str>, value: &T) -> Result<EncodedBody, ContentError> {
        self.encode_body(accept, &Value::from_serialize(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use http_body_util::Full;
    use serde::Deserialize;

    fn handler() -> ContentHandler {
        ContentHandler::new(ContentSettings::standard().unwrap())
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        name: String,
        times: u8,
    }

    #[test]
    fn test_form_to_json() {
        let handler = handler();
        let value = handler.decode_body(Some("application/x-www-form-urlencoded"), b"a=1&a=2&b=3").unwrap();

        let expected: Value = [
            ("a", Value::Array(vec![Value::from("1"), Value::from("2")])),
            ("b", Value::Array(vec![Value::from("3")])),
        ]
        .into_iter()
        .collect();
        assert_eq!(value, expected);
    }

    #[test]
    fn test_latin1_form_to_json() {
        let handler = handler();
        let value = handler.decode_body(Some("application/x-www-form-urlencoded; charset=iso-8859-1"), b"q=%E9").unwrap();
        let encoded = handler.encode_body(Some("application/json"), &value).unwrap();

        assert_eq!(encoded.body().as_ref(), "{\"q\":[\"é\"]}".as_bytes());
    }

    #[test]
    fn test_decode_large_unsigned_json() {
        let value = handler().decode_body(Some("application/json"), b"{\"n\": 18446744073709551615}").unwrap();

        assert_eq!(value.get("n"), Some(&Value::Float(1.844_674_407_370_955_2e19)));
    }

    #[test]
    fn test_encode_json() {
        let value: Value = [("x", 1)].into_iter().collect();
        let encoded = handler().encode_body(Some("application/json"), &value).unwrap();

        assert_eq!(encoded.content_type(), "application/json; charset=utf-8");
        assert_eq!(encoded.body().as_ref(), br#"{"x":1}"#);
        assert!(encoded.vary().accept());
        assert!(!encoded.vary().accept_charset());
    }

    #[test]
    fn test_decode_errors() {
        let handler = handler();

        let missing = handler.decode_body(None, b"{}").unwrap_err();
        assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);

        let unsupported = handler.decode_body(Some("application/xml"), b"<a/>").unwrap_err();
        assert_eq!(unsupported.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let invalid = handler.decode_body(Some("application/json"), b"{\"secret\":").unwrap_err();
        match invalid {
            ContentError::Decode { ref source } => assert_eq!(source.bytes().as_ref(), b"{\"secret\":"),
            ref other => panic!("unexpected error {other:?}"),
        }
        assert!(!invalid.to_string().contains("secret"));
    }

    #[test]
    fn test_not_acceptable() {
        let error = handler().encode_body(Some("text/html"), &Value::Null).unwrap_err();

        assert_eq!(error.status_code(), StatusCode::NOT_ACCEPTABLE);
    }

    #[test]
    fn test_typed_round_trip() {
        let handler = handler();
        let greeting = Greeting { name: "zava".into(), times: 3 };

        let encoded = handler.encode_typed(Some("application/msgpack, application/json;q=0.5"), &greeting).unwrap();
        assert_eq!(encoded.content_type(), "application/msgpack");

        let decoded: Greeting = handler.decode_typed(Some(encoded.content_type()), encoded.body()).unwrap();
        assert_eq!(decoded, greeting);
    }

    #[test]
    fn test_send_response_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_CHARSET, HeaderValue::from_static("iso-8859-1"));

        let response = handler().send_response(&headers, &Value::from("café")).unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json; charset=windows-1252");
        assert_eq!(response.headers()[VARY], "Accept, Accept-Charset");
        assert_eq!(response.body().as_ref(), b"\"caf\xe9\"");
    }

    #[test]
    fn test_send_response_joins_accept_lines() {
        let request = Request::builder()
            .header(ACCEPT, "text/html;q=0.9")
            .header(ACCEPT, "application/x-www-form-urlencoded")
            .body(())
            .unwrap();

        let value: Value = [("q", "rust")].into_iter().collect();
        let response = handler().send_response(&request, &value).unwrap();

        assert_eq!(response.headers()[CONTENT_TYPE], "application/x-www-form-urlencoded; charset=utf-8");
        assert_eq!(response.headers()[VARY], "Accept");
        assert_eq!(response.body().as_ref(), b"q=rust");
    }

    #[test]
    fn test_response_content_type() {
        let negotiated = handler().response_content_type(None).unwrap();
        assert_eq!(negotiated.content_type().mime_type(), "application/json");
    }

    #[tokio::test]
    async fn test_read_request() {
        let request = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Full::new(Bytes::from_static(br#"{"name":"zava","times":2}"#)))
            .unwrap();

        let value = handler().read_request(request).await.unwrap();
        assert_eq!(value.get("times"), Some(&Value::Integer(2)));
    }

    #[tokio::test]
    async fn test_read_request_without_content_type() {
        let request = Request::builder().method("POST").body(Full::new(Bytes::from_static(b"a=1"))).unwrap();

        let error = handler().read_request(request).await.unwrap_err();
        assert!(matches!(error, ContentError::MalformedContentType { .. }));
    }

    #[test]
    fn test_handler_is_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<ContentHandler>();
    }
}
