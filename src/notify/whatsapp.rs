use async_trait::async_trait;
use serde_json::json;

use super::{Notifier, NotifyError, normalize_phone};

/// Sends text messages through an Evolution-style WhatsApp gateway:
/// `POST {base}/message/sendText/{instance}` with an `apikey` header.
pub struct WhatsAppNotifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    instance: String,
    country_code: String,
}

impl WhatsAppNotifier {
    pub fn new(base_url: String, api_key: String, instance: String, country_code: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            instance,
            country_code,
        }
    }
}

#[async_trait]
impl Notifier for WhatsAppNotifier {
    async fn send(&self, phone: &str, text: &str) -> Result<(), NotifyError> {
        let number = normalize_phone(phone, &self.country_code);
        let url = format!("{}/message/sendText/{}", self.base_url, self.instance);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&json!({
                "number": number,
                "text": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }

        Ok(())
    }
}
