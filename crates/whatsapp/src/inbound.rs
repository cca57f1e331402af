use serde::Deserialize;
use thiserror::Error;

/// Body returned to the webhook caller so nothing is echoed back inline.
pub const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

const CHANNEL_PREFIX: &str = "whatsapp:";

/// Form fields posted by the messaging provider.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookForm {
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "MessageSid", default)]
    pub message_sid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender number without the channel prefix, e.g. `+15550001111`.
    pub phone: String,
    pub body: String,
    pub message_sid: Option<String>,
}

impl InboundMessage {
    /// Address to reply to on the WhatsApp channel.
    pub fn reply_address(&self) -> String {
        format!("{CHANNEL_PREFIX}{}", self.phone)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InboundError {
    #[error("webhook payload is missing `From`")]
    MissingSender,
    #[error("webhook payload has an empty `Body`")]
    EmptyBody,
}

pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_prefix(CHANNEL_PREFIX).unwrap_or(trimmed).trim().to_owned()
}

impl TryFrom<WebhookForm> for InboundMessage {
    type Error = InboundError;

    fn try_from(form: WebhookForm) -> Result<Self, Self::Error> {
        let phone = form
            .from
            .as_deref()
            .map(normalize_phone)
            .filter(|phone| !phone.is_empty())
            .ok_or(InboundError::MissingSender)?;
        let body = form
            .body
            .map(|body| body.trim().to_owned())
            .filter(|body| !body.is_empty())
            .ok_or(InboundError::EmptyBody)?;

        Ok(Self { phone, body, message_sid: form.message_sid.filter(|sid| !sid.is_empty()) })
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_phone, InboundError, InboundMessage, WebhookForm};

    #[test]
    fn parses_provider_form_fields() {
        let message = InboundMessage::try_from(WebhookForm {
            body: Some("  show me watches ".to_owned()),
            from: Some("whatsapp:+15550001111".to_owned()),
            message_sid: Some("SM123".to_owned()),
        })
        .expect("valid payload");

        assert_eq!(message.phone, "+15550001111");
        assert_eq!(message.body, "show me watches");
        assert_eq!(message.reply_address(), "whatsapp:+15550001111");
        assert_eq!(message.message_sid.as_deref(), Some("SM123"));
    }

    #[test]
    fn rejects_missing_sender_and_blank_body() {
        let missing_sender = InboundMessage::try_from(WebhookForm {
            body: Some("hi".to_owned()),
            ..WebhookForm::default()
        });
        assert_eq!(missing_sender, Err(InboundError::MissingSender));

        let blank_body = InboundMessage::try_from(WebhookForm {
            body: Some("   ".to_owned()),
            from: Some("whatsapp:+1555".to_owned()),
            message_sid: None,
        });
        assert_eq!(blank_body, Err(InboundError::EmptyBody));
    }

    #[test]
    fn normalize_leaves_plain_numbers_alone() {
        assert_eq!(normalize_phone("+15550001111"), "+15550001111");
        assert_eq!(normalize_phone("whatsapp:+15550001111"), "+15550001111");
    }
}
