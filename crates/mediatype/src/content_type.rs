//! Canonical content type representation.
//!
//! [`ContentType`] is the normalized form of a `Content-Type` header value, or of a single
//! `Accept` media range. The grammar is parsed by [`mime::Mime`]; this module only canonicalizes
//! the result so that registry lookups can be exact matches:
//!
//! - type and subtype are lower-cased
//! - parameter names are lower-cased, values keep their case except `charset`
//! - parameters are kept sorted by name
//!
//! # Example
//! ```
//! use micro_mediatype::ContentType;
//!
//! let content_type: ContentType = "Application/JSON; Charset=UTF-8".parse().unwrap();
//! assert_eq!(content_type.mime_type(), "application/json");
//! assert_eq!(content_type.charset(), Some("utf-8"));
//! assert_eq!(content_type.to_string(), "application/json; charset=utf-8");
//! ```

use crate::error::ContentError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentType {
    mime_type: String,
    slash: usize,
    parameters: BTreeMap<String, String>,
}

impl ContentType {
    /// Parses and normalizes a raw content type string.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::MalformedContentType`] if `raw` is not a `type/subtype[;param=value]*`
    /// production.
    pub fn parse(raw: &str) -> Result<Self, ContentError> {
        let trimmed = raw.trim();
        let mime = trimmed.parse::<mime::Mime>().map_err(|e| ContentError::malformed_content_type(raw, e))?;

        let main_type = mime.type_().as_str().to_ascii_lowercase();
        let subtype = mime.subtype().as_str().to_ascii_lowercase();
        if main_type.is_empty() || subtype.is_empty() {
            return Err(ContentError::malformed_content_type(raw, "empty type or subtype"));
        }

        let mut mime_type = String::with_capacity(main_type.len() + subtype.len() + 16);
        mime_type.push_str(&main_type);
        mime_type.push('/');
        mime_type.push_str(&subtype);
        if let Some(suffix) = mime.suffix() {
            mime_type.push('+');
            mime_type.push_str(&suffix.as_str().to_ascii_lowercase());
        }

        let parameters = mime
            .params()
            .map(|(name, value)| {
                let name = name.as_str().to_ascii_lowercase();
                let value = unquote(value.as_str());
                let value = if name == "charset" { value.to_ascii_lowercase() } else { value.to_string() };
                (name, value)
            })
            .collect();

        Ok(Self { mime_type, slash: main_type.len(), parameters })
    }

    /// The `type/subtype` part, lower-cased.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn main_type(&self) -> &str {
        &self.mime_type[..self.slash]
    }

    /// The subtype, including a structured syntax suffix such as `+json`.
    pub fn subtype(&self) -> &str {
        &self.mime_type[self.slash + 1..]
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Looks up a parameter, `name` is matched case-insensitively.
    pub fn param(&self, name: &str) -> Option<&str> {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.parameters.get(&name.to_ascii_lowercase()).map(String::as_str)
        } else {
            self.parameters.get(name).map(String::as_str)
        }
    }

    /// The `charset` parameter, lower-cased.
    pub fn charset(&self) -> Option<&str> {
        self.param("charset").filter(|charset| !charset.is_empty())
    }

    /// Returns a copy without the named parameter.
    #[must_use]
    pub fn without_param(&self, name: &str) -> Self {
        let mut copy = self.clone();
        copy.parameters.remove(&name.to_ascii_lowercase());
        copy
    }

    /// Returns a copy that only keeps the `type/subtype` part.
    #[must_use]
    pub fn essence(&self) -> Self {
        Self { mime_type: self.mime_type.clone(), slash: self.slash, parameters: BTreeMap::new() }
    }

    pub(crate) fn take_param(&mut self, name: &str) -> Option<String> {
        self.parameters.remove(name)
    }
}

/// Free function form of [`ContentType::parse`].
///
/// # Errors
///
/// See [`ContentType::parse`].
pub fn normalize(raw: &str) -> Result<ContentType, ContentError> {
    ContentType::parse(raw)
}

impl FromStr for ContentType {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mime_type)?;
        for (name, value) in &self.parameters {
            if !value.is_empty() && value.bytes().all(is_token_byte) {
                write!(f, "; {name}={value}")?;
            } else {
                write!(f, "; {name}=\"")?;
                for c in value.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"")?;
            }
        }
        Ok(())
    }
}

fn unquote(value: &str) -> &str {
    value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value)
}

// RFC 7230 tchar
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_cases_type_and_names() {
        let content_type = ContentType::parse("Text/HTML; Level=1; CHARSET=ISO-8859-1").unwrap();

        assert_eq!(content_type.mime_type(), "text/html");
        assert_eq!(content_type.main_type(), "text");
        assert_eq!(content_type.subtype(), "html");
        assert_eq!(content_type.param("level"), Some("1"));
        assert_eq!(content_type.param("Level"), Some("1"));
        assert_eq!(content_type.charset(), Some("iso-8859-1"));
    }

    #[test]
    fn test_parameters_are_sorted() {
        let content_type = ContentType::parse("application/json;version=2;charset=utf-8").unwrap();

        assert_eq!(content_type.to_string(), "application/json; charset=utf-8; version=2");
    }

    #[test]
    fn test_suffix_is_part_of_subtype() {
        let content_type = ContentType::parse("application/vnd.api+json").unwrap();

        assert_eq!(content_type.mime_type(), "application/vnd.api+json");
        assert_eq!(content_type.subtype(), "vnd.api+json");
    }

    #[test]
    fn test_surrounding_whitespace() {
        let content_type = ContentType::parse("  application/msgpack ").unwrap();
        assert_eq!(content_type.mime_type(), "application/msgpack");
    }

    #[test]
    fn test_quoted_parameter() {
        let content_type = ContentType::parse("text/plain; charset=\"utf-8\"").unwrap();
        assert_eq!(content_type.charset(), Some("utf-8"));
    }

    #[test]
    fn test_malformed() {
        for raw in ["not-a-mime-type", "", "/json", "application/"] {
            match ContentType::parse(raw) {
                Err(ContentError::MalformedContentType { value, .. }) => assert_eq!(value, raw),
                other => panic!("expected malformed content type for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_without_param_and_essence() {
        let content_type = ContentType::parse("text/plain; charset=utf-8; format=flowed").unwrap();

        assert_eq!(content_type.without_param("CHARSET").to_string(), "text/plain; format=flowed");
        assert_eq!(content_type.essence().to_string(), "text/plain");
    }

    #[test]
    fn test_display_quotes_non_tokens() {
        let mut content_type = ContentType::parse("multipart/form-data").unwrap();
        content_type.parameters.insert("boundary".into(), "a b\"c".into());

        assert_eq!(content_type.to_string(), "multipart/form-data; boundary=\"a b\\\"c\"");
    }
}
