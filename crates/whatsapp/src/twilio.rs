use std::time::Duration;

use async_trait::async_trait;
use cartline_core::config::WhatsAppConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::outbound::{MessageSender, TransportError};

/// Sends WhatsApp messages through the Twilio Messages REST resource.
pub struct TwilioSender {
    client: Client,
    api_base_url: String,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

impl TwilioSender {
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, TransportError> {
        let account_sid = config
            .account_sid
            .clone()
            .ok_or_else(|| TransportError::NotConfigured("whatsapp.account_sid".to_owned()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs.max(1)))
            .build()
            .map_err(|error| TransportError::NotConfigured(error.to_string()))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            account_sid,
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}/Messages.json", self.api_base_url, self.account_sid)
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    async fn send(&self, to: &str, body: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected { status: status.as_u16(), detail });
        }

        let resource: MessageResource = response.json().await.map_err(|error| {
            TransportError::Rejected { status: status.as_u16(), detail: error.to_string() }
        })?;
        Ok(resource.sid)
    }
}

fn classify_request_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else {
        TransportError::Connection(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use cartline_core::config::AppConfig;

    use super::TwilioSender;
    use crate::outbound::TransportError;

    #[test]
    fn requires_account_sid() {
        let config = AppConfig::default();
        let result = TwilioSender::from_config(&config.whatsapp);
        assert!(matches!(result, Err(TransportError::NotConfigured(ref key)) if key == "whatsapp.account_sid"));
    }

    #[test]
    fn builds_messages_endpoint_from_base_url() {
        let mut config = AppConfig::default();
        config.whatsapp.account_sid = Some("AC123".to_owned());
        config.whatsapp.api_base_url = "https://api.twilio.com/".to_owned();

        let sender = TwilioSender::from_config(&config.whatsapp).expect("configured");
        assert_eq!(
            sender.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }
}
