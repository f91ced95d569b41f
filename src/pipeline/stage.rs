use serde::Serialize;

use crate::error::StageError;

/// Outcome of one downstream stage. Every stage produces exactly one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageResult<T> {
    NotAttempted,
    Skipped { reason: String },
    Success { data: T },
    Error { message: String },
}

impl<T> StageResult<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StageResult::Skipped {
            reason: reason.into(),
        }
    }

    pub fn success(data: T) -> Self {
        StageResult::Success { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StageResult::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            StageResult::NotAttempted => "not_attempted",
            StageResult::Skipped { .. } => "skipped",
            StageResult::Success { .. } => "success",
            StageResult::Error { .. } => "error",
        }
    }
}

impl<T> From<Result<T, StageError>> for StageResult<T> {
    fn from(result: Result<T, StageError>) -> Self {
        match result {
            Ok(data) => StageResult::success(data),
            Err(err) => StageResult::error(err.to_string()),
        }
    }
}
