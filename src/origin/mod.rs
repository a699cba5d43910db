//! Origin fetch subsystem.
//!
//! # Data Flow
//! ```text
//! validated target URL + inbound headers
//!     → fetcher.rs (allowlist forwarding, identifying headers, loop check)
//!     → OriginResponse (status, metadata, streaming body)
//!     → consumed by exactly one of: transform pipeline, bypass stream
//! ```

pub mod fetcher;

pub use fetcher::{is_proxy_loop, FetchError, OriginFetcher, OriginResponse, VIA_MARKER};
