use std::fmt;
use std::str::FromStr;

use pulldown_cmark::{Options, Parser, html};

/// Shape of the text the generation service is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Markdown,
    PlainText,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "text" | "plain" | "plaintext" => Ok(Self::PlainText),
            other => Err(format!("unknown report format {other:?}")),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markdown => f.write_str("markdown"),
            Self::PlainText => f.write_str("text"),
        }
    }
}

pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

pub fn plain_text_to_html(text: &str) -> String {
    format!(
        "<p style=\"white-space: pre-wrap;\">{}</p>",
        escape_html(text)
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    pulldown_cmark_escape::escape_html(&mut escaped, raw)
        .expect("writing to a String is infallible");
    escaped
}

pub fn render_report(format: ReportFormat, report: &str) -> String {
    match format {
        ReportFormat::Markdown => markdown_to_html(report),
        ReportFormat::PlainText => plain_text_to_html(report),
    }
}

/// Wraps an already-rendered report body in the fixed email layout.
pub fn email_envelope(report_html: &str) -> String {
    format!(
        "<div style=\"font-family: Arial, Helvetica, sans-serif; font-size: 15px; \
         line-height: 1.5; color: #222; max-width: 680px;\">\
         <p>Hi there,</p>\
         <p>Thanks for using the Employee Turnover Cost Calculator. \
         Here is the personalized report based on the numbers you entered:</p>\
         <hr style=\"border: none; border-top: 1px solid #ddd; margin: 24px 0;\">\
         {report_html}\
         <hr style=\"border: none; border-top: 1px solid #ddd; margin: 24px 0;\">\
         <p>If you would like help putting these recommendations into practice, \
         just reply to this email.</p>\
         <p>Best regards,<br>The Turnover Cost Calculator Team</p>\
         </div>"
    )
}
