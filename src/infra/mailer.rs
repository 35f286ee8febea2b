use anyhow::{anyhow, Result};
use serde_json::json;

use crate::config::AppConfig;

/// Thin client for a SendGrid-compatible mail API. Sending is always
/// best-effort: callers log failures and move on, the primary write never
/// depends on the mail round-trip.
#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from_email: String,
}

impl Mailer {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.mail_endpoint.clone(),
            api_key: config.mail_api_key.clone(),
            from_email: config.mail_from_email.clone(),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("mail API key not configured"))?;

        let payload = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from_email },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }],
        });

        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.endpoint))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("mail API returned {}: {}", status, body));
        }

        tracing::info!(to, subject, "email sent");
        Ok(())
    }
}
