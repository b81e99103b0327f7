//! SendGrid email client

use async_trait::async_trait;
use recall_core::MessagingProvider;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{EmailClient, EmailMessage, SendGridCredentials};
use crate::error::{MessagingError, MessagingResult};

/// SendGrid v3 Mail Send client bound to one API key
pub struct SendGridEmailClient {
    credentials: SendGridCredentials,
    base_url: String,
    provider: MessagingProvider,
    http: reqwest::Client,
}

impl SendGridEmailClient {
    pub fn new(
        credentials: SendGridCredentials,
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

    fn request_body(&self, message: &EmailMessage) -> serde_json::Value {
        let mut from = json!({ "email": self.credentials.from_email });
        if let Some(name) = &self.credentials.from_name {
            from["name"] = json!(name);
        }

        let mut content = vec![json!({ "type": "text/plain", "value": message.text_body })];
        if let Some(html) = &message.html_body {
            content.push(json!({ "type": "text/html", "value": html }));
        }

        let mut body = json!({
            "personalizations": [{
                "to": [{ "email": message.to }],
                "custom_args": message.custom_args,
            }],
            "from": from,
            "subject": message.subject,
            "content": content,
            "tracking_settings": {
                "click_tracking": { "enable": message.tracking },
                "open_tracking": { "enable": message.tracking },
            },
        });
        if let Some(url) = &message.unsubscribe_url {
            body["headers"] = json!({ "List-Unsubscribe": format!("<{}>", url) });
        }
        body
    }
}

#[async_trait]
impl EmailClient for SendGridEmailClient {
    async fn send_email(&self, message: &EmailMessage) -> MessagingResult<Option<String>> {
        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(self.credentials.api_key.as_str())
            .json(&self.request_body(message))
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
            let text = response.text().await.unwrap_or_default();
            return Err(MessagingError::provider(
                self.provider,
                format!("HTTP {}: {}", status, text),
            ));
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if message_id.is_none() {
            warn!(to = %message.to, "SendGrid response carried no x-message-id");
        }

        debug!(to = %message.to, message_id = ?message_id, "SendGrid accepted message");
        Ok(message_id)
    }

    fn from_email(&self) -> &str {
        &self.credentials.from_email
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}
