//! Inbound request parameter parsing.
//!
//! # Responsibilities
//! - Extract and validate the target URL from the query string
//! - Resolve target format, quality, and grayscale flags
//!
//! # Design Decisions
//! - FetchRequest is immutable once constructed
//! - Invalid quality values fall back to the configured default rather than
//!   failing the request
//! - Grayscale defaults ON unless `bw=0`, matching the service's observed
//!   contract (clients rely on `bw=0` to opt out)

use std::borrow::Cow;

use thiserror::Error;
use url::Url;

use crate::pipeline::TargetFormat;

/// Error type for request parsing; both variants answer 400.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("missing url parameter")]
    MissingUrl,

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
}

/// Everything the proxy needs to know about one inbound request, parsed
/// from the query string.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub format: TargetFormat,
    pub quality: u8,
    pub grayscale: bool,
}

impl FetchRequest {
    /// Parse the inbound query string.
    ///
    /// Recognized parameters: `url` (required, absolute http/https),
    /// `jpeg` (presence selects JPEG over the default WEBP), `bw`
    /// (`bw=0` disables grayscale), `l` or `quality` (1-100).
    pub fn parse(query: Option<&str>, default_quality: u8) -> Result<Self, RequestError> {
        let mut url: Option<Cow<'_, str>> = None;
        let mut jpeg = false;
        let mut grayscale = true;
        let mut quality = None;

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "url" => url = Some(value),
                "jpeg" => jpeg = true,
                "bw" => grayscale = value != "0",
                "l" | "quality" => quality = Some(value),
                _ => {}
            }
        }

        let raw = url.ok_or(RequestError::MissingUrl)?;
        let url = Url::parse(&raw)?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(RequestError::UnsupportedScheme(other.to_string())),
        }

        let quality = quality
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|q| (1..=100).contains(q))
            .unwrap_or(default_quality);

        Ok(Self {
            url,
            format: if jpeg {
                TargetFormat::Jpeg
            } else {
                TargetFormat::Webp
            },
            quality,
            grayscale,
        })
    }
}
