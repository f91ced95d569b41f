use serde::Serialize;
use serde_json::Value;

use super::stage::StageResult;

pub const PREVIEW_CHARS: usize = 200;
pub const REPORT_ERROR_PREFIX: &str = "Error generating report: ";
pub const NO_REPORT_PLACEHOLDER: &str = "No report generated.";

/// Body returned to the caller once the pipeline has run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadResponse {
    pub message: String,
    pub google_response: StageResult<Value>,
    pub ai_report_preview: String,
    pub mailgun_response: StageResult<Value>,
}

pub fn compose(
    ledger: StageResult<Value>,
    report: &StageResult<String>,
    notify: StageResult<Value>,
) -> LeadResponse {
    let message = if notify.is_success() {
        "Submission received. Your report is on its way."
    } else {
        "Submission received."
    };

    LeadResponse {
        message: message.to_string(),
        google_response: ledger,
        ai_report_preview: report_preview(report),
        mailgun_response: notify,
    }
}

pub fn report_preview(report: &StageResult<String>) -> String {
    match report {
        StageResult::Success { data } => {
            let mut chars = data.chars();
            let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
            if chars.next().is_some() {
                format!("{head}...")
            } else {
                head
            }
        }
        StageResult::Error { message } => format!("{REPORT_ERROR_PREFIX}{message}"),
        StageResult::NotAttempted | StageResult::Skipped { .. } => {
            NO_REPORT_PLACEHOLDER.to_string()
        }
    }
}
