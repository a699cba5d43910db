//! Streaming transform pipeline.
//!
//! # Data Flow
//! ```text
//! origin body stream
//!     → bounded mpsc channel (suspends the origin read when full)
//!     → blocking codec task (spool → decode → resize → grayscale → encode)
//!     → encoded temp-file spool
//!     → ReaderStream chunks, pulled as the client drains
//! ```
//!
//! # Design Decisions
//! - The feed future runs inside the request task, not detached: dropping
//!   the request drops the feed and the origin connection with it
//! - The channel capacity is the only in-memory buffer between origin and
//!   codec; pipeline memory stays bounded regardless of image size
//! - No output byte exists before encoding has finished, so the fallback
//!   redirect is always still possible when the pipeline fails

use std::io::{self, Read};

use bytes::{Buf, Bytes};
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;

use crate::config::CodecConfig;
use crate::pipeline::codec::{transform_blocking, TransformSpec};

/// Error raised by any stage of the transform pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("image decode failed: {0}")]
    Decode(image::ImageError),

    #[error("image encode failed: {0}")]
    Encode(String),

    #[error("pipeline i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("codec task failed: {0}")]
    Task(tokio::task::JoinError),
}

/// A successfully transformed image: its exact encoded size and a chunked
/// stream over the encoded bytes.
pub struct TransformedImage {
    size_bytes: u64,
    reader: ReaderStream<tokio::fs::File>,
}

impl TransformedImage {
    /// Exact size of the encoded image in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// The encoded bytes as a chunked stream, read as the consumer drains.
    pub fn into_stream(self) -> ReaderStream<tokio::fs::File> {
        self.reader
    }
}

/// The streaming transform pipeline. Holds only configuration; one value
/// can serve any number of concurrent invocations, each with independent
/// channels, spools, and codec state.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    config: CodecConfig,
}

impl TransformPipeline {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Run one transform: consume the input stream, produce the encoded
    /// image. Aborts with an error if the input stream fails, the image
    /// cannot be decoded, or encoding fails; the caller then still owns an
    /// untouched client response.
    pub async fn run<S>(
        &self,
        input: S,
        spec: TransformSpec,
    ) -> Result<TransformedImage, PipelineError>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(self.config.feed_chunks);
        let config = self.config.clone();

        let codec = tokio::task::spawn_blocking(move || {
            let reader = ChannelReader::new(rx);
            transform_blocking(reader, spec, &config)
        });

        let ((), joined) = tokio::join!(feed(input, tx), codec);
        let (file, size_bytes) = joined.map_err(PipelineError::Task)??;

        let file = tokio::fs::File::from_std(file);
        Ok(TransformedImage {
            size_bytes,
            reader: ReaderStream::with_capacity(file, self.config.write_chunk_bytes),
        })
    }
}

/// Forward input chunks into the bounded channel. Stops at end of input, at
/// the first input error (forwarded to the codec side), or as soon as the
/// codec hangs up.
async fn feed<S>(input: S, tx: mpsc::Sender<io::Result<Bytes>>)
where
    S: Stream<Item = io::Result<Bytes>> + Send,
{
    futures_util::pin_mut!(input);
    while let Some(chunk) = input.next().await {
        let failed = chunk.is_err();
        if tx.send(chunk).await.is_err() || failed {
            break;
        }
    }
}

/// Blocking `Read` over the feed channel, used from the codec task.
struct ChannelReader {
    rx: mpsc::Receiver<io::Result<Bytes>>,
    current: Bytes,
}

impl ChannelReader {
    fn new(rx: mpsc::Receiver<io::Result<Bytes>>) -> Self {
        Self {
            rx,
            current: Bytes::new(),
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.current.is_empty() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::codec::TargetFormat;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 0])
        });
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn chunked(bytes: Vec<u8>, chunk: usize) -> impl Stream<Item = io::Result<Bytes>> {
        let chunks: Vec<io::Result<Bytes>> = bytes
            .chunks(chunk)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        futures_util::stream::iter(chunks)
    }

    fn spec() -> TransformSpec {
        TransformSpec {
            format: TargetFormat::Webp,
            quality: 80,
            grayscale: false,
        }
    }

    async fn collect(image: TransformedImage) -> Vec<u8> {
        let mut stream = image.into_stream();
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        bytes
    }

    #[tokio::test]
    async fn transforms_chunked_input() {
        let pipeline = TransformPipeline::new(CodecConfig::default());
        let input = chunked(png_bytes(40, 30), 512);

        let transformed = pipeline.run(input, spec()).await.unwrap();
        let size = transformed.size_bytes();
        let bytes = collect(transformed).await;

        assert_eq!(bytes.len() as u64, size);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[tokio::test]
    async fn output_is_streamed_in_bounded_chunks() {
        let config = CodecConfig {
            write_chunk_bytes: 128,
            ..CodecConfig::default()
        };
        let pipeline = TransformPipeline::new(config);
        let input = chunked(png_bytes(64, 64), 1024);

        let transformed = pipeline.run(input, spec()).await.unwrap();
        let mut stream = transformed.into_stream();
        while let Some(chunk) = stream.next().await {
            assert!(chunk.unwrap().len() <= 128);
        }
    }

    #[tokio::test]
    async fn input_error_aborts_the_pipeline() {
        let pipeline = TransformPipeline::new(CodecConfig::default());
        let mut head = png_bytes(40, 30);
        head.truncate(100);
        let input = futures_util::stream::iter(vec![
            Ok(Bytes::from(head)),
            Err(io::Error::other("origin reset")),
        ]);

        let result = pipeline.run(input, spec()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn truncated_input_fails_decode() {
        let pipeline = TransformPipeline::new(CodecConfig::default());
        let mut bytes = png_bytes(40, 30);
        bytes.truncate(bytes.len() / 2);

        let result = pipeline.run(chunked(bytes, 64), spec()).await;
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }

    /// The defining property of the feed side: with the codec stalled, at
    /// most `feed_chunks` chunks are pulled off the origin stream before the
    /// feed suspends, and it resumes once the codec drains.
    #[tokio::test]
    async fn feed_suspends_when_the_codec_stalls() {
        let capacity = 4;
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let input = futures_util::stream::iter(
            (0..100).map(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from_static(&[0u8; 16]))
            }),
        );

        let (tx, mut rx) = mpsc::channel::<io::Result<Bytes>>(capacity);
        let feeder = tokio::spawn(feed(input, tx));

        // Nobody is receiving: the feed must stall at the channel bound.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), capacity + 1);

        // Drain two chunks; exactly two more get pulled.
        rx.recv().await.unwrap().unwrap();
        rx.recv().await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), capacity + 3);

        drop(rx);
        feeder.await.unwrap();
    }

    /// Dropping the receive side (codec gone) stops the feed promptly.
    #[tokio::test]
    async fn feed_stops_when_the_codec_hangs_up() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let input = futures_util::stream::iter(
            (0..1000).map(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from_static(&[0u8; 16]))
            }),
        );

        let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(2);
        drop(rx);
        feed(input, tx).await;

        assert!(pulled.load(Ordering::SeqCst) <= 2);
    }
}
