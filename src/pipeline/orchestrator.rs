use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use serde_json::Value;

use crate::config::Config;
use crate::error::AppError;
use crate::llm::openai::OpenAIProvider;
use crate::llm::LlmClient;
use crate::mail::{Mailer, MailgunMailer};
use crate::telemetry::metrics::{LEAD_PIPELINE_DURATION, LEAD_STAGE_OUTCOMES};

use super::compose;
use super::ledger::LedgerForwarder;
use super::notify::Notifier;
use super::report::{GenerationSettings, ReportGenerator};
use super::stage::StageResult;
use super::submission::Submission;

/// The three downstream stages, wired once at startup and shared by every
/// request.
pub struct LeadPipeline {
    ledger: LedgerForwarder,
    reporter: ReportGenerator,
    notifier: Notifier,
}

impl LeadPipeline {
    pub fn new(ledger: LedgerForwarder, reporter: ReportGenerator, notifier: Notifier) -> Self {
        Self {
            ledger,
            reporter,
            notifier,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let ledger = LedgerForwarder::new(client.clone(), config.ledger_url.clone());

        let llm = config.openai_api_key.as_deref().map(|key| {
            Arc::new(LlmClient::new(Arc::new(OpenAIProvider::new(
                client.clone(),
                key,
                &config.openai_base_url,
            ))))
        });
        let reporter = ReportGenerator::new(
            llm,
            GenerationSettings {
                model: config.llm_model.clone(),
                max_tokens: config.llm_max_tokens,
                temperature: config.llm_temperature,
                format: config.report_format,
            },
        );

        let mailer: Option<Arc<dyn Mailer>> =
            match (config.mailgun_api_key.as_deref(), config.mailgun_domain.as_deref()) {
                (Some(key), Some(domain)) => Some(Arc::new(MailgunMailer::new(
                    client,
                    key,
                    domain,
                    &config.mailgun_api_base,
                    &config.mail_sender_name,
                ))),
                _ => None,
            };
        let notifier = Notifier::new(mailer, config.report_format, &config.mail_subject);

        Ok(Self::new(ledger, reporter, notifier))
    }
}

#[tracing::instrument(
    name = "pipeline lead",
    skip(pipeline, submission),
    fields(
        lead.has_email = submission.email.is_some(),
        lead.has_inputs = submission.calculator_inputs.is_some(),
        lead.ledger,
        lead.report,
        lead.notify,
        lead.duration_ms,
    )
)]
pub async fn process_submission(
    pipeline: &LeadPipeline,
    submission: &Submission,
) -> Result<Value, AppError> {
    let start = Instant::now();
    let span = tracing::Span::current();

    // Stage 1: log the raw submission to the ledger
    let ledger = pipeline.ledger.forward(submission).await;
    record_stage(&span, Stage::Ledger, &ledger);

    // Stage 2: generate the report
    let report = pipeline
        .reporter
        .generate(submission.calculator_inputs.as_ref())
        .await;
    record_stage(&span, Stage::Report, &report);

    // Stage 3: email it
    let notify = pipeline
        .notifier
        .notify(submission.email.as_deref(), &report)
        .await;
    record_stage(&span, Stage::Notify, &notify);

    let duration = start.elapsed();
    LEAD_PIPELINE_DURATION.record(duration.as_secs_f64(), &[]);
    span.record("lead.duration_ms", duration.as_millis() as u64);

    tracing::info!(
        ledger = ledger.status(),
        report = report.status(),
        notify = notify.status(),
        "Lead submission processed"
    );

    let response = compose::compose(ledger, &report, notify);
    serde_json::to_value(&response).map_err(|e| AppError::Internal {
        message: format!("failed to compose response: {e}"),
        email: submission.email.clone(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Ledger,
    Report,
    Notify,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Stage::Ledger => "ledger",
            Stage::Report => "report",
            Stage::Notify => "notify",
        }
    }

    /// Field on the `pipeline lead` span holding this stage's status.
    fn span_field(self) -> &'static str {
        match self {
            Stage::Ledger => "lead.ledger",
            Stage::Report => "lead.report",
            Stage::Notify => "lead.notify",
        }
    }
}

fn record_stage<T>(span: &tracing::Span, stage: Stage, result: &StageResult<T>) {
    span.record(stage.span_field(), result.status());

    LEAD_STAGE_OUTCOMES.add(
        1,
        &[
            KeyValue::new("lead.stage", stage.name()),
            KeyValue::new("lead.stage.status", result.status()),
        ],
    );
}
