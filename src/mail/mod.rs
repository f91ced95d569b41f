pub mod mailgun;

pub use mailgun::MailgunMailer;

use serde_json::Value;

use crate::error::StageError;

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Transactional email transport. Implementations send exactly one message per
/// call and return the provider's confirmation payload.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<Value, StageError>;
    fn name(&self) -> &str;
}
