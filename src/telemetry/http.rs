use std::time::Duration;

use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use opentelemetry::KeyValue;
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::Span;

use super::metrics::{HTTP_REQUEST_DURATION, HTTP_REQUESTS_TOTAL};

fn header<'a, B>(request: &'a Request<B>, name: &str) -> &'a str {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Names server spans after the matched route so both submit paths and the
/// health check aggregate cleanly.
#[derive(Clone)]
pub struct HttpMakeSpan;

impl<B> MakeSpan<B> for HttpMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let method = request.method().as_str();
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str)
            .unwrap_or_else(|| request.uri().path());

        tracing::info_span!(
            "HTTP request",
            otel.name = %format!("{method} {route}"),
            otel.kind = "server",
            http.request.method = %method,
            http.route = %route,
            url.path = %request.uri().path(),
            user_agent.original = header(request, "user-agent"),
            http.request_id = header(request, "x-request-id"),
            http.response.status_code = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
        )
    }
}

#[derive(Clone)]
pub struct HttpOnResponse;

impl<B> OnResponse<B> for HttpOnResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        let code = status.as_u16();
        let latency_ms = latency.as_secs_f64() * 1000.0;

        span.record("http.response.status_code", i64::from(code));
        span.record(
            "otel.status_code",
            if status.is_server_error() { "ERROR" } else { "OK" },
        );

        let attrs = [
            KeyValue::new("http.response.status_code", i64::from(code)),
            KeyValue::new("http.status_class", format!("{}xx", code / 100)),
        ];
        HTTP_REQUESTS_TOTAL.add(1, &attrs);
        HTTP_REQUEST_DURATION.record(latency_ms, &attrs);

        if status.is_server_error() {
            tracing::error!(http.response.status_code = code, latency_ms, "request failed");
        } else if status.is_client_error() {
            tracing::warn!(http.response.status_code = code, latency_ms, "request rejected");
        } else {
            tracing::info!(http.response.status_code = code, latency_ms, "request completed");
        }
    }
}
