//! Transform pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! origin byte stream
//!     → transform.rs (bounded channel, backpressure, blocking task)
//!     → codec.rs (decode → resize cap → grayscale → encode)
//!     → TransformedImage (exact size + chunked output stream)
//! ```
//!
//! # Design Decisions
//! - Codec configuration is per-invocation; no process-global codec state
//! - Any stage failure surfaces as one PipelineError before output exists,
//!   leaving the fallback redirect available to the response writer

pub mod codec;
pub mod transform;

pub use codec::{TargetFormat, TransformSpec};
pub use transform::{PipelineError, TransformPipeline, TransformedImage};
