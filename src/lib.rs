//! HTTP image-compression proxy library.
//!
//! Fetches a source image over HTTP, decides whether re-encoding pays for
//! itself, and either streams a transformed (resized, optionally grayscale,
//! WEBP/JPEG re-encoded) image to the client or pipes the original bytes
//! through. Every failure after the request is accepted collapses into one
//! fallback action: a 302 back to the original URL.

pub mod config;
pub mod http;
pub mod observability;
pub mod origin;
pub mod pipeline;
pub mod policy;

pub use config::ProxyConfig;
pub use http::HttpServer;
