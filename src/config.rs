use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};

use crate::render::ReportFormat;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub request_timeout_secs: u64,
    pub ledger_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    pub report_format: ReportFormat,
    pub mailgun_api_key: Option<String>,
    pub mailgun_domain: Option<String>,
    pub mailgun_api_base: String,
    pub mail_sender_name: String,
    pub mail_subject: String,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            port: parse_var(&get, "APP_PORT", 8080)?,
            environment: get_or("APP_ENVIRONMENT", "development"),
            request_timeout_secs: parse_var(&get, "REQUEST_TIMEOUT_SECS", 120)?,
            ledger_url: get("LEDGER_URL"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            llm_model: get_or("LLM_MODEL", "gpt-4o-mini"),
            llm_max_tokens: parse_var(&get, "LLM_MAX_TOKENS", 1500)?,
            llm_temperature: parse_var(&get, "LLM_TEMPERATURE", 0.7)?,
            report_format: match get("REPORT_FORMAT") {
                Some(raw) => raw
                    .parse()
                    .map_err(|e: String| anyhow!(e))
                    .context("REPORT_FORMAT must be `markdown` or `text`")?,
                None => ReportFormat::default(),
            },
            mailgun_api_key: get("MAILGUN_API_KEY"),
            mailgun_domain: get("MAILGUN_DOMAIN"),
            mailgun_api_base: get_or("MAILGUN_API_BASE", "https://api.mailgun.net"),
            mail_sender_name: get_or("MAIL_SENDER_NAME", "Turnover Cost Calculator"),
            mail_subject: get_or("MAIL_SUBJECT", "Your Personalized Turnover Cost Report"),
            otel_service_name: get_or("OTEL_SERVICE_NAME", "lead-report-service"),
            otel_exporter_endpoint: get_or("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn ledger_configured(&self) -> bool {
        self.ledger_url.is_some()
    }

    pub fn generation_configured(&self) -> bool {
        self.openai_api_key.is_some()
    }

    pub fn mail_configured(&self) -> bool {
        self.mailgun_api_key.is_some() && self.mailgun_domain.is_some()
    }
}

fn parse_var<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, "development");
        assert_eq!(config.llm_max_tokens, 1500);
        assert_eq!(config.report_format, ReportFormat::Markdown);
        assert_eq!(config.mailgun_api_base, "https://api.mailgun.net");
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert!(!config.ledger_configured());
        assert!(!config.generation_configured());
        assert!(!config.mail_configured());
        assert!(!config.is_production());
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = config_from(&[("OPENAI_API_KEY", "  "), ("LEDGER_URL", "")]).unwrap();
        assert!(config.openai_api_key.is_none());
        assert!(config.ledger_url.is_none());
    }

    #[test]
    fn test_mail_requires_key_and_domain() {
        let key_only = config_from(&[("MAILGUN_API_KEY", "key-123")]).unwrap();
        assert!(!key_only.mail_configured());

        let both = config_from(&[
            ("MAILGUN_API_KEY", "key-123"),
            ("MAILGUN_DOMAIN", "mg.example.com"),
        ])
        .unwrap();
        assert!(both.mail_configured());
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = config_from(&[("APP_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("APP_PORT"));
    }

    #[test]
    fn test_report_format_override() {
        let config = config_from(&[("REPORT_FORMAT", "text")]).unwrap();
        assert_eq!(config.report_format, ReportFormat::PlainText);
        assert!(config_from(&[("REPORT_FORMAT", "pdf")]).is_err());
    }
}
