use std::time::Instant;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

/// One structured event per request. Server errors are logged at `warn`.
pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let content_length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        warn!(
            method = %method,
            url = %uri,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP request failed"
        );
    } else {
        info!(
            method = %method,
            url = %uri,
            status = status.as_u16(),
            length = content_length,
            elapsed_ms,
            "HTTP request"
        );
    }

    response
}
