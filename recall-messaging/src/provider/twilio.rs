//! Twilio SMS client

use async_trait::async_trait;
use recall_core::MessagingProvider;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{SmsClient, SmsMessage, TwilioCredentials};
use crate::error::{MessagingError, MessagingResult};

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Twilio Programmable Messaging client bound to one account
pub struct TwilioSmsClient {
    credentials: TwilioCredentials,
    base_url: String,
    provider: MessagingProvider,
    http: reqwest::Client,
}

impl TwilioSmsClient {
    pub fn new(
        credentials: TwilioCredentials,
        base_url: &str,
        timeout: Duration,
        provider: MessagingProvider,
    ) -> MessagingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MessagingError::configuration(provider, e.to_string()))?;
        Ok(Self {
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            provider,
            http,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.credentials.account_sid
        )
    }
}

#[async_trait]
impl SmsClient for TwilioSmsClient {
    async fn send_sms(&self, message: &SmsMessage) -> MessagingResult<String> {
        let mut form = vec![
            ("To", message.to.as_str()),
            ("From", self.credentials.phone_number.as_str()),
            ("Body", message.body.as_str()),
        ];
        if let Some(callback) = &message.status_callback {
            form.push(("StatusCallback", callback.as_str()));
        }

        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(
                &self.credentials.account_sid,
                Some(self.credentials.auth_token.as_str()),
            )
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MessagingError::Timeout(e.to_string())
                } else {
                    MessagingError::provider(self.provider, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = match response.json::<ErrorResponse>().await {
                Ok(ErrorResponse {
                    code: Some(code),
                    message: Some(text),
                }) => format!("{} (code {})", text, code),
                Ok(ErrorResponse {
                    message: Some(text),
                    ..
                }) => text,
                _ => format!("HTTP {}", status),
            };
            return Err(MessagingError::provider(self.provider, detail));
        }

        let body: MessageResponse = response
            .json()
            .await
            .map_err(|e| MessagingError::provider(self.provider, e.to_string()))?;

        debug!(to = %message.to, message_id = %body.sid, "Twilio accepted message");
        Ok(body.sid)
    }

    fn from_number(&self) -> &str {
        &self.credentials.phone_number
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}
