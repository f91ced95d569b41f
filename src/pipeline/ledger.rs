use serde_json::Value;

use crate::error::StageError;

use super::stage::StageResult;
use super::submission::Submission;

/// Posts every submission to the spreadsheet logging endpoint. Its outcome is
/// reported to the caller but never gates the later stages.
pub struct LedgerForwarder {
    client: reqwest::Client,
    url: Option<String>,
}

impl LedgerForwarder {
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self { client, url }
    }

    #[tracing::instrument(
        name = "pipeline_stage ledger",
        skip(self, submission),
        fields(pipeline.stage = "ledger", stage.status, error.type)
    )]
    pub async fn forward(&self, submission: &Submission) -> StageResult<Value> {
        let span = tracing::Span::current();

        let Some(url) = self.url.as_deref() else {
            tracing::debug!("Ledger endpoint not configured, skipping");
            span.record("stage.status", "skipped");
            return StageResult::skipped("not configured");
        };

        let result = self.post(url, &submission.raw).await;
        if let Err(err) = &result {
            span.record("error.type", err.kind());
            tracing::warn!(error = %err, "Ledger forward failed");
        }

        let result = StageResult::from(result);
        span.record("stage.status", result.status());
        result
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, StageError> {
        let response = self.client.post(url).json(body).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(StageError::DownstreamHttp {
                status,
                message: text,
            });
        }

        tracing::debug!(%status, "Ledger accepted submission");
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::pipeline::submission::parse_submission;

    fn submission() -> Submission {
        parse_submission(
            &Method::POST,
            br#"{"email": "a@b.com", "calculatorInputs": {"role": "Engineer"}}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unconfigured_is_skipped() {
        let forwarder = LedgerForwarder::new(reqwest::Client::new(), None);
        assert_eq!(
            forwarder.forward(&submission()).await,
            StageResult::skipped("not configured")
        );
    }

    #[tokio::test]
    async fn test_forwards_raw_body_and_keeps_json_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exec"))
            .and(body_json(json!({"email": "a@b.com", "calculatorInputs": {"role": "Engineer"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "success", "row": 12})))
            .expect(1)
            .mount(&server)
            .await;

        let forwarder =
            LedgerForwarder::new(reqwest::Client::new(), Some(format!("{}/exec", server.uri())));
        assert_eq!(
            forwarder.forward(&submission()).await,
            StageResult::success(json!({"result": "success", "row": 12}))
        );
    }

    #[tokio::test]
    async fn test_plain_text_reply_is_kept_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("logged"))
            .mount(&server)
            .await;

        let forwarder = LedgerForwarder::new(reqwest::Client::new(), Some(server.uri()));
        assert_eq!(
            forwarder.forward(&submission()).await,
            StageResult::success(json!("logged"))
        );
    }

    #[tokio::test]
    async fn test_error_body_captured_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Script function not found: doPost"))
            .expect(1)
            .mount(&server)
            .await;

        let forwarder = LedgerForwarder::new(reqwest::Client::new(), Some(server.uri()));
        assert_eq!(
            forwarder.forward(&submission()).await,
            StageResult::error("Script function not found: doPost")
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        // Nothing listens on port 1.
        let forwarder = LedgerForwarder::new(
            reqwest::Client::new(),
            Some("http://127.0.0.1:1/exec".to_string()),
        );
        let result = forwarder.forward(&submission()).await;
        assert_eq!(result.status(), "error");
    }
}
