//! Per-request tracing for the rendering routes.

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::public::CACHE_STATUS_HEADER;

/// Echoed on every response; taken from the request when a proxy set one.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Run the request inside a span carrying its id, then log the outcome.
///
/// Rendered pages are logged at debug with their cache status. Failed
/// requests are logged with the [`ErrorReport`] the handler attached, which
/// names the stage that rejected them (`request::classify` for URLs the
/// classifier refused).
pub async fn trace_requests(request: Request<Body>, next: Next) -> Response {
    let request_id = inbound_request_id(request.headers())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = info_span!(
        "http_request",
        request_id = %request_id,
        method = %method,
        path = %path
    );
    let started = Instant::now();

    let mut response = next.run(request).instrument(span.clone()).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    span.in_scope(|| log_outcome(&mut response, started));
    response
}

fn log_outcome(response: &mut Response, started: Instant) {
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();

    if status.is_success() {
        let cache = response
            .headers()
            .get(CACHE_STATUS_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("NONE");
        debug!(status = status.as_u16(), cache, elapsed_ms, "request served");
        return;
    }

    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        if status.is_client_error() || status.is_server_error() {
            warn!(status = status.as_u16(), elapsed_ms, "request failed without report");
        }
        return;
    };
    let detail = report.messages.first().map(String::as_str).unwrap_or("");

    if status.is_server_error() {
        error!(
            status = status.as_u16(),
            stage = report.source,
            detail,
            chain = ?report.messages,
            elapsed_ms,
            "request failed"
        );
    } else {
        warn!(
            status = status.as_u16(),
            stage = report.source,
            detail,
            elapsed_ms,
            "request rejected"
        );
    }
}

fn inbound_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= 128)
        .map(str::to_string)
}
