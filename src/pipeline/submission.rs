use axum::http::Method;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::AppError;

/// Inbound lead-capture payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_inputs")]
    pub calculator_inputs: Option<CalculatorInputs>,
    /// The body exactly as received, forwarded untouched to the ledger.
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorInputs {
    #[serde(default, deserialize_with = "lenient_text")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub avg_salary: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub num_exits: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub fixed_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cost_percent: Option<f64>,
}

impl CalculatorInputs {
    /// `numExits × (fixedCost + avgSalary × costPercent / 100)`, when every
    /// term is known.
    pub fn estimated_total(&self) -> Option<f64> {
        let salary = self.avg_salary?;
        let exits = self.num_exits?;
        let fixed = self.fixed_cost?;
        let percent = self.cost_percent?;
        Some(exits * (fixed + salary * percent / 100.0)).filter(|total| total.is_finite())
    }
}

/// Checks the method, then parses the body. The method check happens first so
/// that a wrong verb is reported even when the body is garbage.
pub fn parse_submission(method: &Method, body: &[u8]) -> Result<Submission, AppError> {
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let raw: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::MalformedRequest(format!("body is not valid JSON: {e}")))?;
    if !raw.is_object() {
        return Err(AppError::MalformedRequest(
            "body must be a JSON object".to_string(),
        ));
    }

    let mut submission = Submission::deserialize(&raw)
        .map_err(|e| AppError::MalformedRequest(format!("invalid submission: {e}")))?;
    submission.raw = raw;
    Ok(submission)
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// A non-object `calculatorInputs` is dropped rather than failing the whole
// submission; the lead still reaches the ledger.
fn lenient_inputs<'de, D>(deserializer: D) -> Result<Option<CalculatorInputs>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => {
            CalculatorInputs::deserialize(value).map(Some).map_err(serde::de::Error::custom)
        }
        _ => Ok(None),
    }
}

// Form fields often arrive as strings ("90,000"); anything non-numeric is
// treated as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, ',' | '$' | '%' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()))
}
