//! Blocking codec work: decode, bounded resize, grayscale, re-encode.
//!
//! # Responsibilities
//! - Spool inbound bytes to an anonymous temp file (the decoders need Seek)
//! - Decode and read image metadata
//! - Resize down to the height cap, never enlarging
//! - Apply grayscale when requested
//! - Encode to the target format at the requested quality, low effort
//!
//! # Design Decisions
//! - Everything here is synchronous and runs on the blocking thread pool;
//!   the async side lives in transform.rs
//! - Encoded output is spooled to a second temp file so the response can
//!   carry an exact content-length while the body streams in chunks
//! - Single-threaded per image: per-request CPU stays predictable under
//!   concurrent load

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};

use crate::config::CodecConfig;
use crate::pipeline::PipelineError;

/// Output format of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Webp,
    Jpeg,
}

impl TargetFormat {
    /// Short format name, as used in the response content-type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Webp => "webp",
            TargetFormat::Jpeg => "jpeg",
        }
    }

    /// The content-type of a transformed response.
    pub fn content_type(&self) -> &'static str {
        match self {
            TargetFormat::Webp => "image/webp",
            TargetFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Requested transform parameters, fixed per request.
#[derive(Debug, Clone, Copy)]
pub struct TransformSpec {
    pub format: TargetFormat,
    pub quality: u8,
    pub grayscale: bool,
}

/// Consume the full input, transform it, and return the encoded spool file
/// together with its exact size in bytes.
///
/// The reader is pulled incrementally; with a channel-backed reader this is
/// what propagates backpressure to the origin fetch.
pub(crate) fn transform_blocking(
    mut input: impl Read,
    spec: TransformSpec,
    config: &CodecConfig,
) -> Result<(File, u64), PipelineError> {
    let mut spool = tempfile::tempfile()?;
    io::copy(&mut input, &mut spool)?;
    spool.seek(SeekFrom::Start(0))?;

    let reader = ImageReader::new(BufReader::new(spool)).with_guessed_format()?;
    let image = reader.decode().map_err(PipelineError::Decode)?;

    let image = resize_to_cap(image, config.max_height);
    let image = if spec.grayscale {
        image.grayscale()
    } else {
        image
    };

    let mut output = tempfile::tempfile()?;
    encode(image, spec, &mut output)?;

    let size = output.seek(SeekFrom::End(0))?;
    output.seek(SeekFrom::Start(0))?;
    Ok((output, size))
}

/// Resize down to the height cap, preserving aspect ratio. Images at or
/// below the cap pass through untouched, so nothing is ever upscaled.
fn resize_to_cap(image: DynamicImage, max_height: u32) -> DynamicImage {
    if image.height() <= max_height {
        return image;
    }
    let width = (u64::from(image.width()) * u64::from(max_height) / u64::from(image.height()))
        .max(1) as u32;
    image.resize_exact(width, max_height, FilterType::Lanczos3)
}

fn encode(
    image: DynamicImage,
    spec: TransformSpec,
    output: &mut File,
) -> Result<(), PipelineError> {
    match spec.format {
        TargetFormat::Jpeg => {
            // JPEG has no alpha channel; flatten to a supported color type.
            let image = match image {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
                DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) => {
                    DynamicImage::ImageLuma8(image.to_luma8())
                }
                _ => DynamicImage::ImageRgb8(image.to_rgb8()),
            };
            let encoder = JpegEncoder::new_with_quality(output, spec.quality);
            image
                .write_with_encoder(encoder)
                .map_err(|e| PipelineError::Encode(e.to_string()))?;
        }
        TargetFormat::Webp => {
            let rgba = image.to_rgba8();
            let encoder = webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height());
            let mut params = webp::WebPConfig::new()
                .map_err(|_| PipelineError::Encode("webp encoder configuration".to_string()))?;
            params.quality = f32::from(spec.quality);
            // Latency-sensitive path: cheapest effort setting, not best ratio.
            params.method = 0;
            let encoded = encoder
                .encode_advanced(&params)
                .map_err(|e| PipelineError::Encode(format!("{e:?}")))?;
            output.write_all(&encoded)?;
        }
    }
    Ok(())
}
