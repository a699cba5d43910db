//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (quality 1-100, timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a valid socket address")]
    BindAddress(String),

    #[error("observability.metrics_address {0:?} is not a valid socket address")]
    MetricsAddress(String),

    #[error("compression.default_quality must be 1-100, got {0}")]
    DefaultQuality(u8),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let quality = config.compression.default_quality;
    if !(1..=100).contains(&quality) {
        errors.push(ValidationError::DefaultQuality(quality));
    }

    let nonzero = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.origin_secs", config.timeouts.origin_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        (
            "compression.min_compress_bytes",
            config.compression.min_compress_bytes,
        ),
        (
            "compression.min_transparent_bytes",
            config.compression.min_transparent_bytes,
        ),
        ("codec.max_height", u64::from(config.codec.max_height)),
        ("codec.feed_chunks", config.codec.feed_chunks as u64),
        (
            "codec.write_chunk_bytes",
            config.codec.write_chunk_bytes as u64,
        ),
    ];
    for (name, value) in nonzero {
        if value == 0 {
            errors.push(ValidationError::Zero(name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
