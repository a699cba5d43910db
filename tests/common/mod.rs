//! Shared utilities for integration testing.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use image_proxy::config::ProxyConfig;
use image_proxy::http::HttpServer;

/// A canned origin response.
#[derive(Clone)]
pub struct OriginScript {
    pub status: u16,
    pub reason: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl OriginScript {
    /// A 200 response with the given content type and an accurate
    /// content-length.
    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            reason: "OK",
            headers: vec![
                ("content-type".to_string(), content_type.to_string()),
                ("content-length".to_string(), body.len().to_string()),
            ],
            body,
        }
    }

    /// An error response with a small text body.
    pub fn error(status: u16, reason: &'static str) -> Self {
        let body = b"no".to_vec();
        Self {
            status,
            reason,
            headers: vec![
                ("content-type".to_string(), "text/plain".to_string()),
                ("content-length".to_string(), body.len().to_string()),
            ],
            body,
        }
    }
}

/// Start a mock origin answering every request with the same canned
/// response. Returns its address and a connection counter.
pub async fn start_origin(script: OriginScript) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let script = script.clone();
                    tokio::spawn(async move {
                        // Read the request head before answering.
                        let mut buf = vec![0u8; 4096];
                        let mut head = Vec::new();
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) => break,
                                Ok(n) => {
                                    head.extend_from_slice(&buf[..n]);
                                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                                        break;
                                    }
                                }
                                Err(_) => return,
                            }
                        }

                        let mut response =
                            format!("HTTP/1.1 {} {}\r\n", script.status, script.reason);
                        for (name, value) in &script.headers {
                            response.push_str(&format!("{name}: {value}\r\n"));
                        }
                        response.push_str("connection: close\r\n\r\n");
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.write_all(&script.body).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, hits)
}

/// Start the proxy with the given configuration on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    addr
}

/// Test client that does not follow redirects, so fallback 302s are
/// observable.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// A JPEG of per-pixel pseudorandom noise: compresses poorly, so even a
/// modest size comfortably clears the compression thresholds.
#[allow(dead_code)]
pub fn noise_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut seed = 0x2545_f491_4f6c_dd1du64;
    let image = image::RgbImage::from_fn(width, height, |_, _| {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let v = (seed >> 33) as u32;
        image::Rgb([(v & 0xff) as u8, ((v >> 8) & 0xff) as u8, ((v >> 16) & 0xff) as u8])
    });
    encode(image::DynamicImage::ImageRgb8(image), image::ImageFormat::Jpeg)
}

/// A red-dominant JPEG with noise confined to the blue channel: still large,
/// but with a channel split that survives lossy re-encoding, so grayscale
/// conversion is observable in the output pixels.
#[allow(dead_code)]
pub fn red_noise_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut seed = 0x9e37_79b9_7f4a_7c15u64;
    let image = image::RgbImage::from_fn(width, height, |_, _| {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        image::Rgb([200, 0, (seed >> 33) as u8])
    });
    encode(image::DynamicImage::ImageRgb8(image), image::ImageFormat::Jpeg)
}

/// A small flat PNG, well under every compression threshold.
#[allow(dead_code)]
pub fn small_png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([10, 200, 30]));
    encode(image::DynamicImage::ImageRgb8(image), image::ImageFormat::Png)
}

fn encode(image: image::DynamicImage, format: image::ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}
