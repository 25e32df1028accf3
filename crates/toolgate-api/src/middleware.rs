//! Tower/axum middleware: request-id propagation, a tracing span per
//! request, CORS, body-size limits, request timeout, and the admin
//! bearer-key check. Rate limiting is expected to sit in front of this
//! facade rather than inside it, so no rate-limit layer lives here.

use axum::{
    extract::{Request, State},
    response::Response,
};
use std::time::Instant;

use crate::error::ApiError;
use crate::state::AppState;

/// Admin-route authentication. Mounted only on the `/admin/*` sub-router.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: axum::middleware::Next,
) -> Result<Response, ApiError> {
    match state.admin_auth() {
        Some(auth) => {
            auth.check(request.headers())?;
            Ok(next.run(request).await)
        }
        None => Err(ApiError::ServiceUnavailable(
            "admin routes are disabled (TOOLGATE_ADMIN_KEY not set)".to_string(),
        )),
    }
}

/// Request tracing middleware: opens one span per request and records
/// status/latency into it and into the telemetry recorder.
pub async fn tracing_middleware(
    State(state): State<AppState>,
    request: Request,
    next: axum::middleware::Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        request_id = %request_id,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let response = {
        let _enter = span.enter();
        next.run(request).await
    };

    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status();

    state.recorder().increment_counter(
        "toolgate_http_requests_total",
        &[("path", path.as_str()), ("status", status.as_str())],
    );
    state
        .recorder()
        .record_duration_ms("toolgate_http_request_duration_ms", latency_ms, &[("path", path.as_str())]);

    tracing::info!(
        method = %method,
        path = %path,
        status = %status.as_u16(),
        latency_ms,
        "request completed"
    );

    response
}

/// Request ID middleware: generates an id if the client didn't supply one,
/// and echoes it back on `X-Request-ID`.
pub async fn request_id_middleware(mut request: Request, next: axum::middleware::Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("X-Request-ID", value);
    }
    response
}

#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Builds the CORS layer from `TOOLGATE_CORS_ORIGINS` (comma-separated
/// allow-list). A configured `*` is rejected when credentials would be
/// implied, so a wildcard is accepted but cookies/auth
/// headers are never echoed back to it.
pub fn cors_layer() -> tower_http::cors::CorsLayer {
    use axum::http::header;
    use tower_http::cors::{AllowOrigin, CorsLayer};

    let origins = std::env::var("TOOLGATE_CORS_ORIGINS").unwrap_or_default();

    let allow_origin = if origins.trim() == "*" {
        tracing::warn!("TOOLGATE_CORS_ORIGINS is '*': allowing any origin, credentials are never echoed");
        AllowOrigin::any()
    } else if !origins.is_empty() {
        let parsed: Vec<axum::http::HeaderValue> = origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        if parsed.is_empty() {
            tracing::warn!("TOOLGATE_CORS_ORIGINS set but no valid origins parsed, denying cross-origin requests");
            AllowOrigin::list(Vec::new())
        } else {
            AllowOrigin::list(parsed)
        }
    } else {
        tracing::warn!("TOOLGATE_CORS_ORIGINS not set, denying cross-origin requests by default");
        AllowOrigin::list(Vec::new())
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

#[allow(deprecated)]
pub fn timeout_layer(duration: std::time::Duration) -> tower_http::timeout::TimeoutLayer {
    tower_http::timeout::TimeoutLayer::new(duration)
}

pub fn body_limit_layer(limit: usize) -> tower_http::limit::RequestBodyLimitLayer {
    tower_http::limit::RequestBodyLimitLayer::new(limit)
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_request_id_uniqueness() {
        let id1 = uuid::Uuid::new_v4().to_string();
        let id2 = uuid::Uuid::new_v4().to_string();
        assert_ne!(id1, id2);
    }
}
