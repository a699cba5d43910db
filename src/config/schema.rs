//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so the binary runs with no file at all.

use serde::{Deserialize, Serialize};

/// Root configuration for the image proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Origin fetch settings (identifying headers).
    pub origin: OriginConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Compression policy thresholds and default quality.
    pub compression: CompressionConfig,

    /// Codec settings handed to each transform pipeline invocation.
    pub codec: CodecConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Origin fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// User-agent presented to origins. Neutral browser string so that
    /// image hosts serve the same bytes they would serve a browser.
    pub user_agent: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36"
                .to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Origin connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Origin request timeout (headers plus body read) in seconds.
    pub origin_secs: u64,

    /// Total time allowed to produce a response to the client in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            origin_secs: 30,
            request_secs: 60,
        }
    }
}

/// Compression policy configuration.
///
/// The decision rules are fixed; the thresholds that drive them are not.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Minimum origin size in bytes before a WEBP re-encode pays for itself.
    pub min_compress_bytes: u64,

    /// Minimum origin size in bytes before a PNG/GIF is re-encoded to JPEG.
    /// Below this, small transparent art would lose its alpha channel for
    /// negligible savings.
    pub min_transparent_bytes: u64,

    /// Encoder quality (1-100) used when the client does not request one.
    pub default_quality: u8,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_compress_bytes: 10_000,
            min_transparent_bytes: 50_000,
            default_quality: 80,
        }
    }
}

/// Codec configuration, passed to each transform pipeline invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Images taller than this are resized down to it (aspect preserved).
    /// Images at or below it are never enlarged.
    pub max_height: u32,

    /// Capacity, in chunks, of the bounded channel feeding origin bytes to
    /// the codec. This bounds pipeline memory and is what suspends the
    /// origin read when the codec falls behind.
    pub feed_chunks: usize,

    /// Size of the chunks in which encoded output is streamed to the client.
    pub write_chunk_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_height: 16_383,
            feed_chunks: 8,
            write_chunk_bytes: 64 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
