//! Content negotiation against a [`ContentSettings`] registry.
//!
//! - [`negotiate_request`] picks the transcoder and charset for an incoming body from its
//!   `Content-Type`
//! - [`negotiate_response`] picks the transcoder and charset for an outgoing body from the
//!   `Accept` and `Accept-Charset` headers
//!
//! Both are pure functions of the header values and the registry.
//!
//! # Response selection
//!
//! Every registered content type is scored by the most specific `Accept` range that matches it,
//! header order breaking ties between equally specific ranges. The candidate with the highest
//! quality wins, then the one matched more specifically, then the one registered first. A
//! quality of `0` excludes a candidate.
//!
//! ```
//! use micro_mediatype::ContentSettings;
//! use micro_mediatype::negotiate::negotiate_response;
//!
//! let settings = ContentSettings::standard().unwrap();
//! let negotiated =
//!     negotiate_response(&settings, Some("application/*;q=0.5, application/x-www-form-urlencoded"), None).unwrap();
//!
//! assert_eq!(negotiated.content_type().mime_type(), "application/x-www-form-urlencoded");
//! ```

mod accept;

pub use accept::{CharsetRange, MediaRange, Quality, parse_accept, parse_accept_charset};

use crate::charset;
use crate::content_type::ContentType;
use crate::error::ContentError;
use crate::settings::ContentSettings;
use crate::transcoder::Transcoder;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// The outcome of negotiating one request or response body.
#[derive(Clone)]
pub struct Negotiated {
    content_type: ContentType,
    transcoder: Arc<dyn Transcoder>,
    charset: Option<String>,
    vary_charset: bool,
}

impl Negotiated {
    /// The selected content type, for a request the parsed `Content-Type` header.
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub fn transcoder(&self) -> &Arc<dyn Transcoder> {
        &self.transcoder
    }

    /// The charset to hand to the transcoder, `None` leaves the choice to the transcoder's default.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Whether `Accept-Charset` decided the charset.
    pub fn vary_charset(&self) -> bool {
        self.vary_charset
    }
}

impl fmt::Debug for Negotiated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Negotiated")
            .field("content_type", &self.content_type.to_string())
            .field("transcoder", &self.transcoder.content_type())
            .field("charset", &self.charset)
            .field("vary_charset", &self.vary_charset)
            .finish()
    }
}

/// Selects the transcoder for a request body.
///
/// The charset is the one of the header, else the registry default encoding. When neither is
/// set the transcoder's own default applies.
///
/// # Errors
///
/// - [`ContentError::MalformedContentType`] if the header is absent, blank or cannot be parsed
/// - [`ContentError::UnsupportedMediaType`] if no transcoder is registered for the mime type, or
///   the `charset` parameter names an unknown encoding
pub fn negotiate_request(settings: &ContentSettings, content_type: Option<&str>) -> Result<Negotiated, ContentError> {
    let raw = content_type.map(str::trim).filter(|raw| !raw.is_empty()).ok_or_else(ContentError::missing_content_type)?;
    let content_type = ContentType::parse(raw)?;

    let transcoder = settings
        .get(content_type.mime_type())
        .ok_or_else(|| ContentError::unsupported_media_type(content_type.mime_type()))?;

    let charset = match content_type.charset() {
        Some(label) => {
            let encoding =
                charset::lookup(label).ok_or_else(|| ContentError::unsupported_charset(content_type.mime_type(), label))?;
            Some(charset::canonical_name(encoding))
        }
        None => settings.default_encoding().map(charset::canonical_name),
    };

    trace!(content_type = %content_type, charset = ?charset, "negotiated request body");
    Ok(Negotiated { transcoder: Arc::clone(transcoder), content_type, charset, vary_charset: false })
}

/// Selects the transcoder and charset for a response body.
///
/// An absent `Accept` header, or one without a single valid range, selects the registered
/// default content type, else the first registered one.
///
/// # Errors
///
/// [`ContentError::NotAcceptable`] if nothing is registered, or no registered content type is
/// acceptable.
pub fn negotiate_response(
    settings: &ContentSettings,
    accept: Option<&str>,
    accept_charset: Option<&str>,
) -> Result<Negotiated, ContentError> {
    let candidates = settings.available_content_types();
    let ranges = accept.map(parse_accept).unwrap_or_default();

    let (content_type, range) = if ranges.is_empty() {
        let fallback = settings
            .default_content_type()
            .filter(|content_type| settings.get(content_type.mime_type()).is_some())
            .or_else(|| candidates.first())
            .ok_or_else(|| ContentError::not_acceptable(accept.unwrap_or_default()))?;
        (fallback, None)
    } else {
        let (content_type, range) =
            select(candidates, &ranges).ok_or_else(|| ContentError::not_acceptable(accept.unwrap_or_default()))?;
        (content_type, Some(range))
    };

    let transcoder = settings
        .get(content_type.mime_type())
        .ok_or_else(|| ContentError::not_acceptable(accept.unwrap_or_default()))?;

    let range_charset = range.and_then(MediaRange::charset).and_then(charset::lookup);
    let (charset, vary_charset) = match range_charset {
        Some(encoding) => (Some(charset::canonical_name(encoding)), false),
        None => match accept_charset.and_then(|header| preferred_charset(settings, header)) {
            Some(preferred) => (Some(preferred), true),
            None => (settings.default_encoding().map(charset::canonical_name), false),
        },
    };

    trace!(content_type = %content_type, charset = ?charset, "negotiated response body");
    Ok(Negotiated { content_type: content_type.clone(), transcoder: Arc::clone(transcoder), charset, vary_charset })
}

fn select<'a>(candidates: &'a [ContentType], ranges: &'a [MediaRange]) -> Option<(&'a ContentType, &'a MediaRange)> {
    let mut best: Option<(Quality, u32, &ContentType, &MediaRange)> = None;

    for candidate in candidates {
        let mut matched: Option<(u32, &MediaRange)> = None;
        for range in ranges {
            if let Some(specificity) = range.specificity(candidate)
                && matched.is_none_or(|(current, _)| specificity > current)
            {
                matched = Some((specificity, range));
            }
        }

        let Some((specificity, range)) = matched else {
            continue;
        };
        if range.quality().is_zero() {
            continue;
        }
        if best.is_none_or(|(quality, current, _, _)| (range.quality(), specificity) > (quality, current)) {
            best = Some((range.quality(), specificity, candidate, range));
        }
    }

    best.map(|(_, _, candidate, range)| (candidate, range))
}

/// The best usable charset of an `Accept-Charset` header, `*` standing for the default.
fn preferred_charset(settings: &ContentSettings, header: &str) -> Option<String> {
    let mut best: Option<(Quality, String)> = None;

    for range in parse_accept_charset(header) {
        if range.quality().is_zero() || best.as_ref().is_some_and(|(quality, _)| range.quality() <= *quality) {
            continue;
        }

        let encoding = if range.is_wildcard() {
            settings.default_encoding().unwrap_or(encoding_rs::UTF_8)
        } else {
            match charset::lookup(range.charset()) {
                Some(encoding) => encoding,
                None => continue,
            }
        };
        best = Some((range.quality(), charset::canonical_name(encoding)));
    }

    best.map(|(_, charset)| charset)
}
