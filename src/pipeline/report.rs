use std::sync::Arc;

use crate::error::StageError;
use crate::llm::{GenerateRequest, LlmClient};
use crate::render::ReportFormat;

use super::stage::StageResult;
use super::submission::CalculatorInputs;

const NOT_PROVIDED: &str = "Not provided";

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub format: ReportFormat,
}

/// Turns calculator inputs into a personalized report through the generation
/// service. `llm` is `None` when no credential is configured.
pub struct ReportGenerator {
    llm: Option<Arc<LlmClient>>,
    settings: GenerationSettings,
}

impl ReportGenerator {
    pub fn new(llm: Option<Arc<LlmClient>>, settings: GenerationSettings) -> Self {
        Self { llm, settings }
    }

    #[tracing::instrument(
        name = "pipeline_stage report",
        skip(self, inputs),
        fields(
            pipeline.stage = "report",
            report.provider,
            stage.status,
            report.length,
            error.type,
        )
    )]
    pub async fn generate(&self, inputs: Option<&CalculatorInputs>) -> StageResult<String> {
        let span = tracing::Span::current();

        let result = self.try_generate(inputs).await;
        match &result {
            Ok(report) => {
                span.record("report.length", report.len());
            }
            Err(err) => {
                span.record("error.type", err.kind());
                tracing::warn!(error = %err, "Report generation failed");
            }
        }

        let result = StageResult::from(result);
        span.record("stage.status", result.status());
        result
    }

    async fn try_generate(&self, inputs: Option<&CalculatorInputs>) -> Result<String, StageError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or(StageError::NotConfigured("generation service"))?;
        tracing::Span::current().record("report.provider", llm.provider_name());
        let inputs = inputs.ok_or(StageError::MissingInput("calculator inputs missing"))?;

        let resp = llm
            .generate(&GenerateRequest {
                model: self.settings.model.clone(),
                system: build_instructions(self.settings.format),
                prompt: build_data_block(inputs),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
                stage: "report".to_string(),
            })
            .await?;

        let report = resp.content.trim();
        if report.is_empty() {
            return Err(StageError::UnrecognizedResponseShape);
        }
        Ok(report.to_string())
    }
}

pub fn build_instructions(format: ReportFormat) -> String {
    let formatting = match format {
        ReportFormat::Markdown => {
            "Format the report in Markdown: use `##` headings for each section, \
             numbered lists for recommendations and **bold** for key figures."
        }
        ReportFormat::PlainText => {
            "Format the report as plain text with short headings on their own lines. \
             Do not use Markdown syntax."
        }
    };

    format!(
        "You are an HR and workforce-cost consultant writing a personalized employee \
         turnover cost report for a business leader who just used a turnover cost calculator.\n\n\
         Structure the report as follows:\n\
         1. Confirmation of inputs: restate the role and the numbers the user entered.\n\
         2. Cost-driver analysis: explain what drives turnover cost for this role \
         (recruiting, onboarding, lost productivity, knowledge loss) in terms of the inputs.\n\
         3. Recommendations: give 3-5 prioritized, practical recommendations to reduce \
         turnover for this role, most impactful first.\n\
         4. Validation of the total: check the estimated total turnover cost \
         (exits x (fixed cost + salary x cost percentage)) and comment on whether it is realistic.\n\
         5. Call to action: close with one clear next step the reader can take this week.\n\n\
         Be specific, concise and encouraging. If an input is marked \"{NOT_PROVIDED}\", \
         say so and work with reasonable industry assumptions.\n\n\
         {formatting}"
    )
}

/// Lists every calculator field, with a placeholder for anything missing.
pub fn build_data_block(inputs: &CalculatorInputs) -> String {
    let mut block = String::from("Calculator inputs submitted by the user:\n");
    block.push_str(&format!(
        "- Role: {}\n",
        inputs.role.as_deref().unwrap_or(NOT_PROVIDED)
    ));
    block.push_str(&format!(
        "- Average annual salary: {}\n",
        or_placeholder(inputs.avg_salary, format_money)
    ));
    block.push_str(&format!(
        "- Number of employee exits per year: {}\n",
        or_placeholder(inputs.num_exits, format_number)
    ));
    block.push_str(&format!(
        "- Fixed cost per exit (recruiting, onboarding): {}\n",
        or_placeholder(inputs.fixed_cost, format_money)
    ));
    block.push_str(&format!(
        "- Salary-based cost per exit (% of salary): {}\n",
        or_placeholder(inputs.cost_percent, |p| format!("{}%", format_number(p)))
    ));
    if let Some(total) = inputs.estimated_total() {
        block.push_str(&format!(
            "- Estimated total annual turnover cost: {}\n",
            format_money(total)
        ));
    }
    block
}

fn or_placeholder(value: Option<f64>, render: impl Fn(f64) -> String) -> String {
    value.map(render).unwrap_or_else(|| NOT_PROVIDED.to_string())
}

fn format_money(value: f64) -> String {
    if value < 0.0 {
        format!("-${}", format_number(-value))
    } else {
        format!("${}", format_number(value))
    }
}

/// en-US grouping (`1,234,567.5`), at most two decimals. Works on the decimal
/// text so magnitudes beyond `u64` keep every digit.
pub fn format_number(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (digits, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut grouped = String::with_capacity(fixed.len() + digits.len() / 3 + 1);
    if value < 0.0 && (digits != "0" || !fraction.is_empty()) {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if !fraction.is_empty() {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::llm::{GenerateResponse, Provider};
    use std::sync::Mutex;

    struct CannedProvider {
        reply: Result<String, reqwest::StatusCode>,
        seen: Mutex<Vec<GenerateRequest>>,
    }

    #[async_trait::async_trait]
    impl Provider for CannedProvider {
        async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, StageError> {
            self.seen.lock().unwrap().push(req.clone());
            match &self.reply {
                Ok(content) => Ok(GenerateResponse {
                    content: content.clone(),
                    model: req.model.clone(),
                    input_tokens: 10,
                    output_tokens: 20,
                    finish_reason: "stop".to_string(),
                }),
                Err(status) => Err(StageError::DownstreamHttp {
                    status: *status,
                    message: "model overloaded".to_string(),
                }),
            }
        }

        fn name(&self) -> &str {
            "canned"
        }

        fn base_url(&self) -> &str {
            "https://api.openai.com/v1"
        }
    }

    fn settings() -> GenerationSettings {
        GenerationSettings {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1500,
            temperature: 0.7,
            format: ReportFormat::Markdown,
        }
    }

    fn inputs() -> CalculatorInputs {
        CalculatorInputs {
            role: Some("Engineer".to_string()),
            avg_salary: Some(90000.0),
            num_exits: Some(3.0),
            fixed_cost: Some(2000.0),
            cost_percent: Some(50.0),
        }
    }

    fn generator(reply: Result<String, reqwest::StatusCode>) -> (ReportGenerator, Arc<CannedProvider>) {
        let provider = Arc::new(CannedProvider {
            reply,
            seen: Mutex::new(Vec::new()),
        });
        let llm = Arc::new(LlmClient::new(provider.clone()));
        (ReportGenerator::new(Some(llm), settings()), provider)
    }

    #[test]
    fn test_format_number() {
        let cases = vec![
            (0.0, "0"),
            (7.0, "7"),
            (999.0, "999"),
            (1000.0, "1,000"),
            (90000.0, "90,000"),
            (1234567.0, "1,234,567"),
            (1234.5, "1,234.5"),
            (1234.567, "1,234.57"),
            (0.05, "0.05"),
            (-2500.0, "-2,500"),
            (-0.001, "0"),
            (2e17, "200,000,000,000,000,000"),
            (1e20, "100,000,000,000,000,000,000"),
        ];
        for (value, expected) in cases {
            assert_eq!(format_number(value), expected, "format_number({value})");
        }
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(141000.0), "$141,000");
        assert_eq!(format_money(-50.0), "-$50");
    }

    #[test]
    fn test_data_block_lists_every_field() {
        let block = build_data_block(&inputs());
        assert!(block.contains("- Role: Engineer"));
        assert!(block.contains("- Average annual salary: $90,000"));
        assert!(block.contains("- Number of employee exits per year: 3"));
        assert!(block.contains("- Fixed cost per exit (recruiting, onboarding): $2,000"));
        assert!(block.contains("- Salary-based cost per exit (% of salary): 50%"));
        assert!(block.contains("- Estimated total annual turnover cost: $141,000"));
    }

    #[test]
    fn test_data_block_keeps_huge_figures() {
        let block = build_data_block(&CalculatorInputs {
            avg_salary: Some(1e20),
            num_exits: Some(2.0),
            fixed_cost: Some(0.0),
            cost_percent: Some(100.0),
            ..inputs()
        });
        assert!(block.contains("- Average annual salary: $100,000,000,000,000,000,000\n"));
        assert!(block.contains("- Estimated total annual turnover cost: $200,000,000,000,000,000,000\n"));
        assert!(!block.contains("184,467,440,737"));
    }

    #[test]
    fn test_data_block_placeholders() {
        let block = build_data_block(&CalculatorInputs::default());
        assert_eq!(block.matches(NOT_PROVIDED).count(), 5);
        assert!(block.contains("- Role: Not provided"));
        assert!(!block.contains("Estimated total"));
    }

    #[test]
    fn test_instructions_describe_report_structure() {
        let md = build_instructions(ReportFormat::Markdown);
        for section in [
            "Confirmation of inputs",
            "Cost-driver analysis",
            "3-5 prioritized",
            "Validation of the total",
            "Call to action",
        ] {
            assert!(md.contains(section), "missing {section:?}");
        }
        assert!(md.contains("Markdown"));
        assert!(build_instructions(ReportFormat::PlainText).contains("Do not use Markdown"));
    }

    #[tokio::test]
    async fn test_missing_credential_is_an_error() {
        let generator = ReportGenerator::new(None, settings());
        assert_eq!(
            generator.generate(Some(&inputs())).await,
            StageResult::error("generation service not configured")
        );
    }

    #[tokio::test]
    async fn test_credential_checked_before_inputs() {
        let generator = ReportGenerator::new(None, settings());
        assert_eq!(
            generator.generate(None).await,
            StageResult::error("generation service not configured")
        );
    }

    #[tokio::test]
    async fn test_missing_inputs_skip_the_call() {
        let (generator, provider) = generator(Ok("report".to_string()));
        assert_eq!(
            generator.generate(None).await,
            StageResult::error("calculator inputs missing")
        );
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_is_trimmed() {
        let (generator, provider) = generator(Ok("\n  ## Your report\nDetails  \n".to_string()));
        assert_eq!(
            generator.generate(Some(&inputs())).await,
            StageResult::success("## Your report\nDetails".to_string())
        );

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].max_tokens, 1500);
        assert!(seen[0].prompt.contains("$90,000"));
        assert!(seen[0].system.contains("Recommendations"));
    }

    #[tokio::test]
    async fn test_blank_completion_is_unreadable() {
        let (generator, _) = generator(Ok("   ".to_string()));
        assert_eq!(
            generator.generate(Some(&inputs())).await,
            StageResult::error("unreadable response")
        );
    }

    #[tokio::test]
    async fn test_downstream_error_message_is_kept() {
        let (generator, _) = generator(Err(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(
            generator.generate(Some(&inputs())).await,
            StageResult::error("model overloaded")
        );
    }
}
