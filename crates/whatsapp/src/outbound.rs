use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use cartline_core::config::WhatsAppConfig;
use thiserror::Error;
use tracing::{info, warn};

pub const CONTINUATION_NOTICE: &str = "\n\n... (message continues, please ask for more details)";
pub const FALLBACK_MESSAGE: &str = "I processed your request, but couldn't send the full response. Please type 'status' to see your cart.";
pub const TURN_FAILURE_MESSAGE: &str = "Sorry, something went wrong. Please try again.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport connection failed: {0}")]
    Connection(String),
    #[error("transport request timed out: {0}")]
    Timeout(String),
    #[error("provider rejected message with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("transport is not configured: {0}")]
    NotConfigured(String),
}

impl TransportError {
    /// Only connection and timeout failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("delivery to `{to}` failed after {attempts} attempt(s) and fallback: {last_error}")]
    Exhausted { to: String, attempts: u32, last_error: TransportError },
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends one message and returns the provider message id.
    async fn send(&self, to: &str, body: &str) -> Result<String, TransportError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub max_message_chars: usize,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self { max_message_chars: 3000, max_attempts: 3, base_delay_ms: 2_000 }
    }
}

impl DeliveryPolicy {
    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self {
            max_message_chars: config.max_message_chars,
            max_attempts: config.max_send_attempts.max(1),
            base_delay_ms: config.retry_base_delay_ms,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = u64::from(attempt) + 1;
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier))
    }
}

/// Cuts `text` to `max_chars` characters and appends the continuation notice.
pub fn truncate_message(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (format!("{}{CONTINUATION_NOTICE}", &text[..cut]), true),
        None => (text.to_owned(), false),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryReport {
    Delivered { message_sid: String, attempts: u32, truncated: bool },
    FellBack { message_sid: String, attempts: u32, error: TransportError },
}

pub struct Deliverer {
    sender: Arc<dyn MessageSender>,
    policy: DeliveryPolicy,
}

impl Deliverer {
    pub fn new(sender: Arc<dyn MessageSender>, policy: DeliveryPolicy) -> Self {
        Self { sender, policy }
    }

    pub async fn deliver(
        &self,
        to: &str,
        text: &str,
        correlation_id: &str,
    ) -> Result<DeliveryReport, DeliveryError> {
        let (body, truncated) = truncate_message(text, self.policy.max_message_chars);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0;

        let last_error = loop {
            match self.sender.send(to, &body).await {
                Ok(message_sid) => {
                    info!(
                        event_name = "egress.whatsapp.delivered",
                        correlation_id,
                        attempts = attempts + 1,
                        truncated,
                        message_sid = %message_sid,
                        "whatsapp message delivered"
                    );
                    return Ok(DeliveryReport::Delivered {
                        message_sid,
                        attempts: attempts + 1,
                        truncated,
                    });
                }
                Err(error) => {
                    attempts += 1;
                    warn!(
                        event_name = "egress.whatsapp.send_failed",
                        correlation_id,
                        attempt = attempts,
                        max_attempts,
                        transient = error.is_transient(),
                        error = %error,
                        "whatsapp send failed"
                    );

                    if !error.is_transient() || attempts >= max_attempts {
                        break error;
                    }

                    let delay = self.policy.backoff(attempts - 1);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        };

        match self.sender.send(to, FALLBACK_MESSAGE).await {
            Ok(message_sid) => {
                warn!(
                    event_name = "egress.whatsapp.fallback_sent",
                    correlation_id,
                    attempts,
                    "full response undeliverable; fallback message sent"
                );
                Ok(DeliveryReport::FellBack { message_sid, attempts, error: last_error })
            }
            Err(fallback_error) => {
                warn!(
                    event_name = "egress.whatsapp.fallback_failed",
                    correlation_id,
                    attempts,
                    error = %fallback_error,
                    "fallback message could not be delivered"
                );
                Err(DeliveryError::Exhausted { to: to.to_owned(), attempts, last_error })
            }
        }
    }
}
