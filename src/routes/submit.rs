use axum::{Json, body::Bytes, extract::State, http::Method};
use serde_json::Value;

use crate::AppState;
use crate::error::AppResult;
use crate::pipeline::{parse_submission, process_submission};

/// Accepts every method so that non-POST requests get the JSON 405 body
/// rather than axum's empty default.
pub async fn submit_lead(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let submission = parse_submission(&method, &body)?;

    tracing::info!(
        has_email = submission.email.is_some(),
        has_inputs = submission.calculator_inputs.is_some(),
        role = submission
            .calculator_inputs
            .as_ref()
            .and_then(|i| i.role.as_deref())
            .unwrap_or(""),
        "Lead submission received"
    );

    let response = process_submission(&state.pipeline, &submission).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use crate::config::Config;
    use crate::pipeline::LeadPipeline;

    fn state() -> AppState {
        let config = Config::from_lookup(|_| None).unwrap();
        let pipeline = LeadPipeline::from_config(&config).unwrap();
        AppState {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        let response = submit_lead(State(state()), Method::GET, Bytes::new())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_garbage_is_bad_request() {
        let response = submit_lead(State(state()), Method::POST, Bytes::from_static(b"<xml/>"))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unconfigured_pipeline_still_answers_ok() {
        let response = submit_lead(
            State(state()),
            Method::POST,
            Bytes::from_static(br#"{"email": "a@b.com"}"#),
        )
        .await
        .unwrap();

        assert_eq!(response.0["googleResponse"]["status"], "skipped");
        assert_eq!(response.0["mailgunResponse"]["status"], "not_attempted");
        assert_eq!(
            response.0["aiReportPreview"],
            "Error generating report: generation service not configured"
        );
    }
}
