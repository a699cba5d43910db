//! HTTP image-compression proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────┐
//!                      │                 IMAGE PROXY                     │
//!                      │                                                 │
//!   Client GET ?url=   │  ┌────────┐   ┌────────┐   ┌─────────────┐     │
//!   ───────────────────┼─▶│  http  │──▶│ origin │──▶│   policy    │     │
//!                      │  │ server │   │ fetch  │   │  decision   │     │
//!                      │  └────────┘   └────────┘   └──────┬──────┘     │
//!                      │                                    │            │
//!                      │               compress?            ▼            │
//!                      │        ┌──────────────┐    ┌──────────────┐    │
//!   Client Response    │        │   bypass     │    │  transform   │    │
//!   ◀──────────────────┼────────│ passthrough  │ or │   pipeline   │    │
//!                      │        └──────────────┘    └──────┬───────┘    │
//!                      │                                    │            │
//!                      │              any failure ──▶ 302 fallback       │
//!                      │                                                 │
//!                      │  ┌──────────────────────────────────────────┐  │
//!                      │  │   config · observability · timeouts      │  │
//!                      │  └──────────────────────────────────────────┘  │
//!                      └────────────────────────────────────────────────┘
//! ```

use tokio::net::TcpListener;

use image_proxy::config;
use image_proxy::http::HttpServer;
use image_proxy::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_from_env()?;

    logging::init_logging(&config.observability);
    tracing::info!("image-proxy v0.1.0 starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        connect_timeout_secs = config.timeouts.connect_secs,
        origin_timeout_secs = config.timeouts.origin_secs,
        default_quality = config.compression.default_quality,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
