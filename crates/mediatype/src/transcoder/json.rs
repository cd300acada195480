//! JSON transcoder.
//!
//! Values are dumped as compact JSON text. Variants that JSON has no representation for
//! ([`Value::Bytes`] and [`Value::DateTime`]) are handed to a [`DumpObject`] hook, the default hook
//! renders:
//!
//! | Value               | JSON                                                        |
//! |---------------------|-------------------------------------------------------------|
//! | `Value::Bytes`      | base64 encoded string                                       |
//! | `Value::DateTime`   | ISO-8601 string with milliseconds and timezone designator   |
//!
//! Loading follows the JSON grammar: integers become [`Value::Integer`], numbers with a fraction
//! or an exponent become [`Value::Float`].

use crate::error::{ContentError, DecodeError, EncodeError};
use crate::transcoder::{TextFormat, TextTranscoder};
use crate::value::{Value, iso_format};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::sync::Arc;

pub type JsonTranscoder = TextTranscoder<JsonFormat>;

/// Called for values that have no native JSON representation.
pub trait DumpObject: Send + Sync {
    fn dump_object(&self, value: &Value) -> Result<serde_json::Value, EncodeError>;
}

impl<F> DumpObject for F
where
    F: Fn(&Value) -> Result<serde_json::Value, EncodeError> + Send + Sync,
{
    fn dump_object(&self, value: &Value) -> Result<serde_json::Value, EncodeError> {
        (self)(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDumpObject;

impl DumpObject for DefaultDumpObject {
    fn dump_object(&self, value: &Value) -> Result<serde_json::Value, EncodeError> {
        match value {
            Value::Bytes(bytes) => Ok(serde_json::Value::String(STANDARD.encode(bytes))),
            Value::DateTime(timestamp) => Ok(serde_json::Value::String(iso_format(timestamp))),
            other => Err(EncodeError::unsupported_value(other.kind(), "JSON")),
        }
    }
}

#[derive(Clone)]
pub struct JsonFormat {
    hook: Arc<dyn DumpObject>,
}

impl JsonFormat {
    pub fn new() -> Self {
        Self { hook: Arc::new(DefaultDumpObject) }
    }

    /// Replaces the hook used for values JSON cannot express.
    #[must_use]
    pub fn with_hook(mut self, hook: impl DumpObject + 'static) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    fn to_json(&self, value: &Value) -> Result<serde_json::Value, EncodeError> {
        Ok(match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| EncodeError::new(format!("{f} is not JSON serializable")).with_kind(value.kind()))?,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(|item| self.to_json(item)).collect::<Result<_, _>>()?),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| self.to_json(v).map(|json| (k.clone(), json))).collect::<Result<_, _>>()?,
            ),
            Value::Bytes(_) | Value::DateTime(_) => self.hook.dump_object(value)?,
        })
    }
}

impl fmt::Debug for JsonFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFormat").finish_non_exhaustive()
    }
}

impl Default for JsonFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl TextFormat for JsonFormat {
    fn dumps(&self, value: &Value) -> Result<String, EncodeError> {
        let json = self.to_json(value)?;
        serde_json::to_string(&json).map_err(EncodeError::new)
    }

    fn loads(&self, text: &str) -> Result<Value, DecodeError> {
        serde_json::from_str(text).map_err(|e| DecodeError::new(format!("invalid JSON: {e}")))
    }
}

/// The `application/json` transcoder with the default hook and `utf-8` default encoding.
///
/// # Errors
///
/// Never fails for the built-in content type, the `Result` mirrors the other constructors.
pub fn json_transcoder() -> Result<JsonTranscoder, ContentError> {
    TextTranscoder::new(mime::APPLICATION_JSON.essence_str(), JsonFormat::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::Transcoder;
    use bytes::Bytes;
    use chrono::DateTime;
    use indoc::indoc;

    #[test]
    fn test_dump_compact() {
        let value: Value = [("x", Value::from(1))].into_iter().collect();
        let (content_type, bytes) = json_transcoder().unwrap().to_bytes(&value, None).unwrap();

        assert_eq!(content_type, "application/json; charset=utf-8");
        assert_eq!(bytes.as_ref(), br#"{"x":1}"#);
    }

    #[test]
    fn test_load_structure() {
        let text = indoc! {r#"
            {
                "int": 42,
                "float": 42.0,
                "exp": 1e3,
                "list": [1, "two", null, false],
                "nested": {"k": "v"}
            }
        "#};

        let value = JsonFormat::new().loads(text).unwrap();

        assert_eq!(value.get("int"), Some(&Value::Integer(42)));
        assert_eq!(value.get("float"), Some(&Value::Float(42.0)));
        assert_eq!(value.get("exp"), Some(&Value::Float(1000.0)));
        assert_eq!(
            value.get("list"),
            Some(&Value::Array(vec![Value::Integer(1), Value::from("two"), Value::Null, Value::Bool(false)]))
        );
        assert_eq!(value.get("nested").and_then(|n| n.get("k")), Some(&Value::from("v")));
    }

    #[test]
    fn test_load_invalid() {
        let error = json_transcoder().unwrap().from_bytes(b"{\"a\":", None).unwrap_err();
        assert!(error.reason().starts_with("invalid JSON"));

        assert!(JsonFormat::new().loads("{} trailing").is_err());
    }

    #[test]
    fn test_default_hook() {
        let timestamp = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z").unwrap();
        let value: Value =
            [("at", Value::DateTime(timestamp)), ("raw", Value::Bytes(Bytes::from_static(b"hello")))].into_iter().collect();

        let text = JsonFormat::new().dumps(&value).unwrap();
        assert_eq!(text, r#"{"at":"2024-01-02T03:04:05.000Z","raw":"aGVsbG8="}"#);
    }

    #[test]
    fn test_custom_hook() {
        let format = JsonFormat::new().with_hook(|value: &Value| match value {
            Value::Bytes(bytes) => Ok(serde_json::Value::from(bytes.len())),
            other => DefaultDumpObject.dump_object(other),
        });

        let text = format.dumps(&Value::Array(vec![Value::Bytes(Bytes::from_static(b"abc"))])).unwrap();
        assert_eq!(text, "[3]");
    }

    #[test]
    fn test_load_unsigned_beyond_i64() {
        let value = json_transcoder().unwrap().from_bytes(br#"{"n": 18446744073709551615, "m": 9223372036854775807}"#, None).unwrap();

        assert_eq!(value.get("n"), Some(&Value::Float(1.844_674_407_370_955_2e19)));
        assert_eq!(value.get("m"), Some(&Value::Integer(i64::MAX)));
    }

    #[test]
    fn test_non_finite_float() {
        let error = JsonFormat::new().dumps(&Value::Float(f64::NAN)).unwrap_err();
        assert_eq!(error.kind(), Some("float"));
    }

    #[test]
    fn test_round_trip_in_latin1() {
        let transcoder = json_transcoder().unwrap();
        let value: Value = [("name", Value::from("José")), ("score", Value::Float(9.5))].into_iter().collect();

        let (content_type, bytes) = transcoder.to_bytes(&value, Some("iso-8859-1")).unwrap();
        assert_eq!(content_type, "application/json; charset=windows-1252");
        assert_eq!(transcoder.from_bytes(&bytes, Some("iso-8859-1")).unwrap(), value);
    }
}
