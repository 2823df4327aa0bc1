//! Picks the representation a handler should answer with.
//!
//! An exact `Content-Type` wins; otherwise `Accept` is negotiated with
//! quality weights against the supported set. HTML is first in preference
//! order and the default when nothing usable was sent.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

/// A representation the application can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Json,
}

/// Supported media types in preference order.
const SUPPORTED: [(&str, &str); 2] = [("text", "html"), ("application", "json")];

impl ContentType {
    fn from_media(kind: &str, subtype: &str) -> Option<Self> {
        match (kind, subtype) {
            ("text", "html") => Some(ContentType::Html),
            ("application", "json") => Some(ContentType::Json),
            _ => None,
        }
    }
}

/// Negotiates the response representation from request headers.
pub fn content_type(headers: &HeaderMap) -> ContentType {
    if let Some(declared) = header_str(headers, header::CONTENT_TYPE)
        .and_then(|value| parse_range(value))
        .and_then(|range| ContentType::from_media(&range.kind, &range.subtype))
    {
        return declared;
    }

    let Some(accept) = header_str(headers, header::ACCEPT) else {
        return ContentType::Html;
    };

    let ranges: Vec<MediaRange> = accept.split(',').filter_map(parse_range).collect();

    let mut best: Option<((&str, &str), f32)> = None;
    for supported in SUPPORTED {
        let weight = weight_for(&ranges, supported);
        if weight > 0.0 && best.is_none_or(|(_, w)| weight > w) {
            best = Some((supported, weight));
        }
    }

    match best {
        None => ContentType::Html,
        Some(((kind, subtype), _)) => ContentType::from_media(kind, subtype)
            .unwrap_or_else(|| unreachable!("negotiated {kind}/{subtype} outside the supported set")),
    }
}

/// Axum extractor for the negotiated [`ContentType`].
#[derive(Clone, Copy, Debug)]
pub struct Negotiated(pub ContentType);

impl<S> FromRequestParts<S> for Negotiated
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Negotiated(content_type(&parts.headers)))
    }
}

struct MediaRange {
    kind: String,
    subtype: String,
    quality: f32,
}

impl MediaRange {
    /// Higher is more specific; `None` when the range does not cover the type.
    fn specificity(&self, (kind, subtype): (&str, &str)) -> Option<u8> {
        match (self.kind.as_str(), self.subtype.as_str()) {
            ("*", "*") => Some(0),
            (k, "*") if k == kind => Some(1),
            (k, s) if k == kind && s == subtype => Some(2),
            _ => None,
        }
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_range(raw: &str) -> Option<MediaRange> {
    let mut parts = raw.split(';');
    let (kind, subtype) = parts.next()?.trim().split_once('/')?;
    let (kind, subtype) = (kind.trim().to_ascii_lowercase(), subtype.trim().to_ascii_lowercase());
    if kind.is_empty() || subtype.is_empty() {
        return None;
    }

    let mut quality = 1.0;
    for param in parts {
        if let Some((name, value)) = param.split_once('=') {
            if name.trim().eq_ignore_ascii_case("q") {
                quality = value
                    .trim()
                    .parse::<f32>()
                    .ok()
                    .filter(|q| (0.0..=1.0).contains(q))
                    .unwrap_or(0.0);
            }
        }
    }

    Some(MediaRange {
        kind,
        subtype,
        quality,
    })
}

/// Quality of the most specific range covering `supported`, 0 if none does.
fn weight_for(ranges: &[MediaRange], supported: (&str, &str)) -> f32 {
    ranges
        .iter()
        .filter_map(|range| range.specificity(supported).map(|s| (s, range.quality)))
        .max_by_key(|(specificity, _)| *specificity)
        .map(|(_, quality)| quality)
        .unwrap_or(0.0)
}
