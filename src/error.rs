use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Errors that abort the whole request. Downstream failures never end up here;
/// they are folded into a stage result instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Only POST requests are allowed")]
    MethodNotAllowed,

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        email: Option<String>,
    },
}

/// Failure of a single downstream stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("{0}")]
    MissingInput(&'static str),

    #[error("{message}")]
    DownstreamHttp {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("{0}")]
    DownstreamTransport(#[from] reqwest::Error),

    #[error("unreadable response")]
    UnrecognizedResponseShape,
}

impl StageError {
    /// Coarse category used for span and metric attributes.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::NotConfigured(_) => "not_configured",
            StageError::MissingInput(_) => "missing_input",
            StageError::DownstreamHttp { status, .. } => match status.as_u16() {
                429 => "rate_limit",
                401 | 403 => "auth_error",
                400..=499 => "invalid_request",
                _ => "server_error",
            },
            StageError::DownstreamTransport(e) if e.is_timeout() => "timeout",
            StageError::DownstreamTransport(e) if e.is_connect() => "network_error",
            StageError::DownstreamTransport(_) => "transport_error",
            StageError::UnrecognizedResponseShape => "unrecognized_response",
        }
    }
}

fn get_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let mut body = Map::new();
        match &self {
            AppError::MethodNotAllowed => {
                body.insert("message".into(), json!(self.to_string()));
            }
            AppError::MalformedRequest(detail) => {
                tracing::warn!(error = %detail, "Rejected malformed request");
                body.insert("message".into(), json!("Malformed request body"));
                body.insert("error".into(), json!(detail));
            }
            AppError::Internal { message, email } => {
                tracing::error!(error = %message, "Internal error");
                body.insert(
                    "message".into(),
                    json!("Error processing your request"),
                );
                body.insert("error".into(), json!(message));
                if let Some(email) = email {
                    body.insert("email".into(), json!(email));
                }
            }
        }
        body.insert("status".into(), json!(status.as_u16()));
        if let Some(trace_id) = get_trace_id() {
            body.insert("trace_id".into(), json!(trace_id));
        }

        (status, Json(Value::Object(body))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: AppError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::MethodNotAllowed.to_string(),
            "Only POST requests are allowed"
        );
        assert_eq!(
            AppError::MalformedRequest("bad json".into()).to_string(),
            "Malformed request: bad json"
        );
        assert_eq!(
            StageError::NotConfigured("generation service").to_string(),
            "generation service not configured"
        );
        assert_eq!(
            StageError::UnrecognizedResponseShape.to_string(),
            "unreadable response"
        );
    }

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (AppError::MethodNotAllowed, StatusCode::METHOD_NOT_ALLOWED),
            (
                AppError::MalformedRequest("test".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Internal {
                    message: "test".into(),
                    email: None,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected_status) in test_cases {
            assert_eq!(error.into_response().status(), expected_status);
        }
    }

    #[tokio::test]
    async fn test_method_not_allowed_body() {
        let (status, body) = body_json(AppError::MethodNotAllowed).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["message"], "Only POST requests are allowed");
        assert_eq!(body["status"], 405);
    }

    #[tokio::test]
    async fn test_internal_error_carries_email() {
        let (status, body) = body_json(AppError::Internal {
            message: "boom".into(),
            email: Some("a@b.com".into()),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "boom");
        assert_eq!(body["email"], "a@b.com");
    }

    #[tokio::test]
    async fn test_internal_error_without_email() {
        let (_, body) = body_json(AppError::Internal {
            message: "boom".into(),
            email: None,
        })
        .await;
        assert!(body.get("email").is_none());
    }

    #[test]
    fn test_stage_error_kinds() {
        let cases = vec![
            (reqwest::StatusCode::TOO_MANY_REQUESTS, "rate_limit"),
            (reqwest::StatusCode::UNAUTHORIZED, "auth_error"),
            (reqwest::StatusCode::FORBIDDEN, "auth_error"),
            (reqwest::StatusCode::BAD_REQUEST, "invalid_request"),
            (reqwest::StatusCode::BAD_GATEWAY, "server_error"),
        ];

        for (status, expected) in cases {
            let err = StageError::DownstreamHttp {
                status,
                message: String::new(),
            };
            assert_eq!(err.kind(), expected, "kind for {status}");
        }
        assert_eq!(StageError::MissingInput("x").kind(), "missing_input");
        assert_eq!(StageError::NotConfigured("x").kind(), "not_configured");
    }
}
