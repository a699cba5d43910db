//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, proxy handler)
//!     → params.rs (query string → FetchRequest)
//!     → [origin fetch, policy decision]
//!     → response.rs (bypass | transformed | fallback redirect)
//!     → headers.rs (projection allowlist)
//!     → Send to client
//! ```

pub mod headers;
pub mod params;
pub mod request;
pub mod response;
pub mod server;

pub use params::{FetchRequest, RequestError};
pub use request::{RequestIdLayer, X_REQUEST_ID};
pub use server::HttpServer;
