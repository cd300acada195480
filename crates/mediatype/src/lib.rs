//! Content negotiation and body transcoding for HTTP servers
//!
//! This crate decides, per request, which serialization format and character encoding to use
//! for an incoming request body and an outgoing response body, and delegates the byte level
//! work to transcoders registered per content type.
//!
//! # Features
//!
//! - `Content-Type`, `Accept` and `Accept-Charset` negotiation with quality weights and
//!   specificity
//! - A registry of transcoders keyed by mime type, see [`ContentSettings`]
//! - Bundled JSON, form-urlencoded and MessagePack (`msgpack` feature) transcoders
//! - Text transcoders in any charset known to `encoding_rs`
//! - Works on raw header strings or on `http` requests and responses
//!
//! # Example
//!
//! ```
//! use http::Request;
//! use micro_mediatype::{ContentHandler, ContentSettings, Value};
//!
//! let handler = ContentHandler::new(ContentSettings::standard().unwrap());
//!
//! let request = Request::builder()
//!     .header("content-type", "application/json")
//!     .header("accept", "application/x-www-form-urlencoded, application/json;q=0.5")
//!     .body(())
//!     .unwrap();
//!
//! let value = handler.get_request_body(&request, br#"{"name": "zava"}"#).unwrap();
//! assert_eq!(value.get("name"), Some(&Value::from("zava")));
//!
//! let response = handler.send_response(&request, &value).unwrap();
//! assert_eq!(response.headers()["content-type"], "application/x-www-form-urlencoded; charset=utf-8");
//! assert_eq!(response.body().as_ref(), b"name=zava");
//! ```

mod content_type;
mod error;
mod handler;
mod settings;
mod value;

pub mod charset;
pub mod negotiate;
pub mod transcoder;

pub use content_type::ContentType;
pub use content_type::normalize;
pub use error::ContentError;
pub use error::DecodeError;
pub use error::EncodeError;
pub use handler::ContentHandler;
pub use handler::EncodedBody;
pub use handler::HasHeaders;
pub use handler::Vary;
pub use negotiate::Negotiated;
pub use settings::ContentSettings;
pub use value::Map;
pub use value::Value;
