//! Response header projection.
//!
//! # Responsibilities
//! - Project the allowlisted origin headers onto bypass responses
//! - Define the proxy's informational header names
//!
//! # Design Decisions
//! - Projection is an allowlist, never a copy-everything: origin-internal
//!   and encoding-sensitive headers must not leak through the proxy

use axum::http::{header, HeaderMap};

/// Marks a response that was piped through without transformation.
pub const X_PROXY_BYPASS: &str = "x-proxy-bypass";

/// Size of the origin image in bytes, reported on transformed responses.
pub const X_ORIGINAL_SIZE: &str = "x-original-size";

/// Origin size minus encoded size; negative when re-encoding grew the image.
pub const X_BYTES_SAVED: &str = "x-bytes-saved";

/// Origin response headers projected onto bypass responses.
const RESPONSE_ALLOWLIST: [header::HeaderName; 4] = [
    header::ACCEPT_RANGES,
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
];

/// Copy the allowlisted headers from the origin response into `target`.
pub fn project_origin_headers(origin: &HeaderMap, target: &mut HeaderMap) {
    for name in RESPONSE_ALLOWLIST {
        if let Some(value) = origin.get(&name) {
            target.insert(name, value.clone());
        }
    }
}
