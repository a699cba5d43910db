//! Response writer and fallback controller.
//!
//! # Responsibilities
//! - Produce exactly one terminal response per request: bypass, transformed,
//!   or the fallback redirect
//! - Project origin headers on the bypass path; report sizes on the
//!   transform path
//!
//! # Design Decisions
//! - Responses are assembled atomically before any body byte moves, so the
//!   status line and headers are fixed exactly once
//! - The fallback redirect is deliberately bare: a 302 to the original URL
//!   with an empty body and no caching headers, asking the client to fetch
//!   the origin directly

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Response, StatusCode};
use url::Url;

use crate::http::headers::{
    project_origin_headers, X_BYTES_SAVED, X_ORIGINAL_SIZE, X_PROXY_BYPASS,
};
use crate::origin::OriginResponse;
use crate::pipeline::{TargetFormat, TransformedImage};

/// The uniform failure response: a 302 back to the original URL with an
/// empty body. Works for every failure that occurs before a body stream has
/// been handed to the client, which is every failure this crate can produce.
pub fn fallback_redirect(url: &Url) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    // Url serializes percent-encoded ASCII, so this only fails on a
    // pathological URL; the redirect then degrades to a bare 302.
    if let Ok(location) = HeaderValue::from_str(url.as_str()) {
        response.headers_mut().insert(header::LOCATION, location);
    }
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    response
}

/// Pipe the origin response through untouched: allowlisted headers, origin
/// status (so ranged 206 responses keep their semantics), and the original
/// body stream, byte for byte.
pub fn bypass(origin: OriginResponse) -> Response<Body> {
    let status = origin.status;
    let (headers, body) = origin.into_parts();

    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;
    project_origin_headers(&headers, response.headers_mut());
    response.headers_mut().insert(
        HeaderName::from_static(X_PROXY_BYPASS),
        HeaderValue::from_static("1"),
    );
    response
}

/// Stream a successfully transformed image to the client with its exact
/// encoded size and the informational size accounting.
pub fn transformed(
    format: TargetFormat,
    original_size: u64,
    image: TransformedImage,
) -> Response<Body> {
    let encoded_size = image.size_bytes();
    // Informational; negative when re-encoding grew the image.
    let saved = original_size as i64 - encoded_size as i64;

    let mut response = Response::new(Body::from_stream(image.into_stream()));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(encoded_size));
    headers.insert(
        HeaderName::from_static(X_ORIGINAL_SIZE),
        HeaderValue::from(original_size),
    );
    headers.insert(HeaderName::from_static(X_BYTES_SAVED), HeaderValue::from(saved));
    response
}
