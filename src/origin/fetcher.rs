//! Origin fetch: the outbound leg of the proxy.
//!
//! # Responsibilities
//! - Issue the GET to the resolved image URL with streaming body
//! - Forward only the allowlisted request headers
//! - Set identifying headers (neutral user-agent, via-marker, forwarded-for)
//! - Refuse requests that would loop back through this proxy
//!
//! # Design Decisions
//! - Redirects are never followed: an upstream 3xx must reach the response
//!   writer, which turns it into the single fallback redirect instead of
//!   chaining into the upstream's target
//! - Connect and request timeouts are mandatory; a hung origin surfaces as
//!   a fetch error, not a hung client connection

use std::net::IpAddr;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use thiserror::Error;
use url::Url;

use crate::config::{OriginConfig, TimeoutConfig};

/// Via header value identifying this proxy. An inbound request carrying it
/// came through us already.
pub const VIA_MARKER: &str = "1.1 image-proxy";

/// Request headers forwarded to the origin; everything else is dropped.
const REQUEST_ALLOWLIST: [header::HeaderName; 4] = [
    header::COOKIE,
    header::DNT,
    header::REFERER,
    header::RANGE,
];

/// Error type for origin fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build origin client: {0}")]
    Client(reqwest::Error),

    #[error("origin request failed: {0}")]
    Request(reqwest::Error),

    #[error("origin body read failed: {0}")]
    Body(reqwest::Error),
}

/// What the origin answered: status, the metadata the policy needs, the
/// full header map, and the body as a lazy byte stream.
///
/// The body is not restartable; whichever path consumes it takes the whole
/// value by move, so exactly one consumer ever reads it.
pub struct OriginResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub content_length: u64,
    headers: HeaderMap,
    body: BoxStream<'static, Result<Bytes, FetchError>>,
}

impl OriginResponse {
    pub(crate) fn new(
        status: StatusCode,
        content_type: String,
        content_length: u64,
        headers: HeaderMap,
        body: BoxStream<'static, Result<Bytes, FetchError>>,
    ) -> Self {
        Self {
            status,
            content_type,
            content_length,
            headers,
            body,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// True when the origin answered with an error status or an upstream
    /// redirect; both surface to the client as the fallback redirect.
    pub fn is_rejected(&self) -> bool {
        self.status.as_u16() >= 400
            || (self.status.is_redirection() && self.headers.contains_key(header::LOCATION))
    }

    /// Consume the response, yielding its headers and body stream.
    pub fn into_parts(self) -> (HeaderMap, BoxStream<'static, Result<Bytes, FetchError>>) {
        (self.headers, self.body)
    }
}

/// Streaming HTTP client for origin images.
pub struct OriginFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl OriginFetcher {
    pub fn new(origin: &OriginConfig, timeouts: &TimeoutConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.origin_secs))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            user_agent: origin.user_agent.clone(),
        })
    }

    /// Fetch the image at `url`, forwarding the allowlisted headers from the
    /// inbound request and identifying this proxy on the outbound one.
    pub async fn fetch(
        &self,
        url: &Url,
        inbound: &HeaderMap,
        peer: IpAddr,
    ) -> Result<OriginResponse, FetchError> {
        let headers = self.outbound_headers(inbound, peer);

        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(FetchError::Request)?;

        let status = response.status();
        let headers = response.headers().clone();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let content_length = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Ok(OriginResponse {
            status,
            content_type,
            content_length,
            headers,
            body: response.bytes_stream().map_err(FetchError::Body).boxed(),
        })
    }

    fn outbound_headers(&self, inbound: &HeaderMap, peer: IpAddr) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for name in REQUEST_ALLOWLIST {
            if let Some(value) = inbound.get(&name) {
                headers.insert(name, value.clone());
            }
        }

        if let Ok(agent) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(header::USER_AGENT, agent);
        }
        headers.insert(header::VIA, HeaderValue::from_static(VIA_MARKER));

        let forwarded_for = inbound
            .get("x-forwarded-for")
            .cloned()
            .or_else(|| HeaderValue::from_str(&peer.to_string()).ok());
        if let Some(value) = forwarded_for {
            headers.insert("x-forwarded-for", value);
        }

        headers
    }
}

/// Loop prevention: an inbound request that already carries our via-marker
/// and originates from a loopback address is this proxy calling itself.
pub fn is_proxy_loop(inbound: &HeaderMap, peer: IpAddr) -> bool {
    let marked = inbound
        .get(header::VIA)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == VIA_MARKER);
    if !marked {
        return false;
    }

    match inbound
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        Some(forwarded) => forwarded
            .split(',')
            .next()
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
            .is_some_and(|ip| ip.is_loopback()),
        None => peer.is_loopback(),
    }
}
