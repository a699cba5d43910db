//! Compression decision policy.
//!
//! # Responsibilities
//! - Decide, per request, whether the origin image is worth re-encoding
//!
//! # Design Decisions
//! - Pure function over origin metadata and request parameters: no I/O,
//!   deterministic, recomputed per request
//! - Thresholds come from configuration; there is exactly one policy

use crate::config::CompressionConfig;
use crate::pipeline::TargetFormat;

/// Decide whether the origin image should be re-encoded.
///
/// Rules, first match wins:
/// 1. Non-image content is never transformed.
/// 2. Unknown or zero length: pass through rather than re-encode a stream
///    of unknown size.
/// 3. Ranged requests: partial content is incompatible with re-encoding.
/// 4. Small PNG/GIF going to JPEG: likely transparent art; re-encoding
///    drops the alpha channel for negligible gain.
/// 5. Small images going to WEBP: encoder overhead outweighs savings.
pub fn should_compress(
    content_type: &str,
    content_length: u64,
    range_requested: bool,
    format: TargetFormat,
    config: &CompressionConfig,
) -> bool {
    if !content_type.starts_with("image") {
        return false;
    }
    if content_length == 0 || range_requested {
        return false;
    }

    let transparent = content_type.ends_with("png") || content_type.ends_with("gif");
    if format != TargetFormat::Webp
        && transparent
        && content_length < config.min_transparent_bytes
    {
        return false;
    }

    if format == TargetFormat::Webp && content_length < config.min_compress_bytes {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CompressionConfig {
        CompressionConfig::default()
    }

    #[test]
    fn non_image_content_is_never_compressed() {
        for content_type in ["text/html", "application/json", "video/mp4", ""] {
            assert!(!should_compress(
                content_type,
                1_000_000,
                false,
                TargetFormat::Webp,
                &config()
            ));
        }
    }

    #[test]
    fn unknown_length_is_never_compressed() {
        assert!(!should_compress(
            "image/jpeg",
            0,
            false,
            TargetFormat::Webp,
            &config()
        ));
    }

    #[test]
    fn ranged_requests_are_never_compressed() {
        assert!(!should_compress(
            "image/jpeg",
            1_000_000,
            true,
            TargetFormat::Webp,
            &config()
        ));
    }

    #[test]
    fn small_png_to_jpeg_keeps_transparency() {
        assert!(!should_compress(
            "image/png",
            20_000,
            false,
            TargetFormat::Jpeg,
            &config()
        ));
        assert!(should_compress(
            "image/png",
            60_000,
            false,
            TargetFormat::Jpeg,
            &config()
        ));
    }

    #[test]
    fn gif_follows_the_transparency_threshold() {
        assert!(!should_compress(
            "image/gif",
            49_999,
            false,
            TargetFormat::Jpeg,
            &config()
        ));
        assert!(should_compress(
            "image/gif",
            50_000,
            false,
            TargetFormat::Jpeg,
            &config()
        ));
    }

    #[test]
    fn tiny_images_skip_webp() {
        assert!(!should_compress(
            "image/jpeg",
            5_000,
            false,
            TargetFormat::Webp,
            &config()
        ));
        assert!(should_compress(
            "image/jpeg",
            15_000,
            false,
            TargetFormat::Webp,
            &config()
        ));
    }

    #[test]
    fn small_png_to_webp_uses_the_small_threshold() {
        // The transparency threshold only guards the JPEG target.
        assert!(should_compress(
            "image/png",
            20_000,
            false,
            TargetFormat::Webp,
            &config()
        ));
    }

    #[test]
    fn decision_is_idempotent() {
        let args = ("image/png", 60_000, false, TargetFormat::Jpeg);
        let first = should_compress(args.0, args.1, args.2, args.3, &config());
        let second = should_compress(args.0, args.1, args.2, args.3, &config());
        assert_eq!(first, second);
    }

    #[test]
    fn thresholds_come_from_configuration() {
        let config = CompressionConfig {
            min_compress_bytes: 100,
            min_transparent_bytes: 200,
            default_quality: 80,
        };
        assert!(should_compress(
            "image/jpeg",
            150,
            false,
            TargetFormat::Webp,
            &config
        ));
        assert!(!should_compress(
            "image/png",
            150,
            false,
            TargetFormat::Jpeg,
            &config
        ));
    }
}
