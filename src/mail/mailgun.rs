use serde::Deserialize;
use serde_json::Value;

use super::{Mailer, OutboundMessage};
use crate::error::StageError;

pub struct MailgunMailer {
    client: reqwest::Client,
    api_key: String,
    domain: String,
    api_base: String,
    sender_name: String,
}

#[derive(Deserialize)]
struct MailgunError {
    message: String,
}

impl MailgunMailer {
    pub fn new(
        client: reqwest::Client,
        api_key: &str,
        domain: &str,
        api_base: &str,
        sender_name: &str,
    ) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            domain: domain.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            sender_name: sender_name.to_string(),
        }
    }

    pub fn sender(&self) -> String {
        format!("{} <mailgun@{}>", self.sender_name, self.domain)
    }

    fn messages_url(&self) -> String {
        format!("{}/v3/{}/messages", self.api_base, self.domain)
    }
}

#[async_trait::async_trait]
impl Mailer for MailgunMailer {
    #[tracing::instrument(
        name = "mailgun send",
        skip(self, message),
        fields(otel.kind = "client", mail.domain = %self.domain, http.response.status_code)
    )]
    async fn send(&self, message: &OutboundMessage) -> Result<Value, StageError> {
        let sender = self.sender();
        let form = [
            ("from", sender.as_str()),
            ("to", message.to.as_str()),
            ("subject", message.subject.as_str()),
            ("html", message.html.as_str()),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth("api", Some(&self.api_key))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        tracing::Span::current().record("http.response.status_code", status.as_u16());

        let body = response.text().await?;
        if !status.is_success() {
            let message = match serde_json::from_str::<MailgunError>(&body) {
                Ok(err) => err.message,
                Err(_) if body.trim().is_empty() => status.to_string(),
                Err(_) => body,
            };
            return Err(StageError::DownstreamHttp { status, message });
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    fn name(&self) -> &str {
        "mailgun"
    }
}
