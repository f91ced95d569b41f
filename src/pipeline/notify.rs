use std::sync::Arc;

use serde_json::Value;

use crate::mail::{Mailer, OutboundMessage};
use crate::render::{self, ReportFormat};

use super::stage::StageResult;

pub struct Notifier {
    mailer: Option<Arc<dyn Mailer>>,
    format: ReportFormat,
    subject: String,
}

impl Notifier {
    pub fn new(mailer: Option<Arc<dyn Mailer>>, format: ReportFormat, subject: &str) -> Self {
        Self {
            mailer,
            format,
            subject: subject.to_string(),
        }
    }

    /// Emails the report when there is somewhere to send it and something to
    /// send. Checks run in order: transport configured, address present,
    /// report generated.
    #[tracing::instrument(
        name = "pipeline_stage notify",
        skip(self, email, report),
        fields(pipeline.stage = "notify", stage.status, error.type)
    )]
    pub async fn notify(&self, email: Option<&str>, report: &StageResult<String>) -> StageResult<Value> {
        let span = tracing::Span::current();

        let result = match (self.mailer.as_ref(), email, report) {
            (None, _, _) => {
                tracing::debug!("Mail transport not configured, not attempting");
                StageResult::NotAttempted
            }
            (Some(_), None, _) => StageResult::skipped("no email provided"),
            (Some(mailer), Some(to), StageResult::Success { data: report }) => {
                let message = OutboundMessage {
                    to: to.to_string(),
                    subject: self.subject.clone(),
                    html: render::email_envelope(&render::render_report(self.format, report)),
                };

                let sent = mailer.send(&message).await;
                match &sent {
                    Ok(_) => tracing::info!(mailer = mailer.name(), "Report email sent"),
                    Err(err) => {
                        span.record("error.type", err.kind());
                        tracing::warn!(mailer = mailer.name(), error = %err, "Report email failed");
                    }
                }
                StageResult::from(sent)
            }
            (Some(_), Some(_), _) => StageResult::skipped("report not available"),
        };

        span.record("stage.status", result.status());
        result
    }
}
