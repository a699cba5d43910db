//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum router and wire up middleware (trace, timeout,
//!   request ID)
//! - Parse inbound parameters and refuse loops
//! - Fetch the origin image and classify the answer
//! - Dispatch to exactly one of: transform, bypass, fallback redirect
//! - Record request metrics at every terminal outcome

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, Response, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{CompressionConfig, ProxyConfig};
use crate::http::params::FetchRequest;
use crate::http::request::{RequestIdLayer, X_REQUEST_ID};
use crate::http::response;
use crate::observability::metrics;
use crate::origin::{is_proxy_loop, FetchError, OriginFetcher};
use crate::pipeline::{PipelineError, TransformPipeline, TransformSpec};
use crate::policy::should_compress;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<OriginFetcher>,
    pub pipeline: TransformPipeline,
    pub compression: CompressionConfig,
}

/// HTTP server for the image proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, FetchError> {
        let fetcher = Arc::new(OriginFetcher::new(&config.origin, &config.timeouts)?);

        let state = AppState {
            fetcher,
            pipeline: TransformPipeline::new(config.codec.clone()),
            compression: config.compression.clone(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(proxy_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Main proxy handler.
///
/// Produces exactly one terminal response: a transformed image, the origin
/// bytes piped through, the fallback redirect, or an explicit error status.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let params = match FetchRequest::parse(
        request.uri().query(),
        state.compression.default_quality,
    ) {
        Ok(params) => params,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejecting request");
            metrics::record_request("invalid", 400, start);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let range_requested = request.headers().contains_key(header::RANGE);

    if is_proxy_loop(request.headers(), addr.ip()) {
        tracing::warn!(request_id = %request_id, url = %params.url, "Refusing proxy loop");
        metrics::record_request("fallback", 302, start);
        return response::fallback_redirect(&params.url);
    }

    tracing::debug!(
        request_id = %request_id,
        url = %params.url,
        format = params.format.as_str(),
        "Fetching origin"
    );

    let origin = match state
        .fetcher
        .fetch(&params.url, request.headers(), addr.ip())
        .await
    {
        Ok(origin) => origin,
        Err(e) => {
            tracing::warn!(request_id = %request_id, url = %params.url, error = %e, "Origin fetch failed");
            metrics::record_request("fallback", 302, start);
            return response::fallback_redirect(&params.url);
        }
    };

    if origin.is_rejected() {
        tracing::info!(
            request_id = %request_id,
            url = %params.url,
            origin_status = origin.status.as_u16(),
            "Origin rejected the request"
        );
        metrics::record_request("fallback", 302, start);
        return response::fallback_redirect(&params.url);
    }

    let compress = should_compress(
        &origin.content_type,
        origin.content_length,
        range_requested,
        params.format,
        &state.compression,
    );

    if !compress {
        tracing::debug!(
            request_id = %request_id,
            content_type = %origin.content_type,
            content_length = origin.content_length,
            "Bypassing compression"
        );
        metrics::record_request("bypass", origin.status.as_u16(), start);
        return response::bypass(origin);
    }

    let original_size = origin.content_length;
    let (_, body) = origin.into_parts();
    let input = body.map(|chunk| chunk.map_err(io::Error::other));
    let spec = TransformSpec {
        format: params.format,
        quality: params.quality,
        grayscale: params.grayscale,
    };

    match state.pipeline.run(input, spec).await {
        Ok(image) => {
            tracing::debug!(
                request_id = %request_id,
                original_size,
                encoded_size = image.size_bytes(),
                "Image transformed"
            );
            metrics::record_request("transform", 200, start);
            metrics::record_bytes_saved(original_size as i64 - image.size_bytes() as i64);
            response::transformed(params.format, original_size, image)
        }
        Err(PipelineError::Task(e)) => {
            tracing::error!(request_id = %request_id, error = %e, "Codec task failed");
            metrics::record_request("error", 500, start);
            (StatusCode::INTERNAL_SERVER_ERROR, "image processing failed").into_response()
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, url = %params.url, error = %e, "Transform failed");
            metrics::record_request("fallback", 302, start);
            response::fallback_redirect(&params.url)
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
