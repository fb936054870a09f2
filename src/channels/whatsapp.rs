use crate::channels::traits::{NotificationChannel, OutboundMessage};
use crate::config::WhatsAppConfig;
use async_trait::async_trait;

/// WhatsApp Business Cloud API channel.
///
/// Sender credentials come from the config file; the recipient number comes
/// from the settings row.
#[derive(Clone)]
pub struct WhatsAppChannel {
    api_base: String,
    access_token: String,
    phone_number_id: String,
    recipient: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(config: &WhatsAppConfig, recipient: &str, client: reqwest::Client) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            access_token: config.access_token.trim().to_owned(),
            phone_number_id: config.phone_number_id.trim().to_owned(),
            recipient: normalize_number(recipient),
            client,
        }
    }

    /// `true` when sender credentials are present.
    pub fn has_credentials(config: &WhatsAppConfig) -> bool {
        !config.access_token.trim().is_empty() && !config.phone_number_id.trim().is_empty()
    }
}

/// Cloud API expects digits only, without `+`, spaces or dashes.
fn normalize_number(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

// WhatsApp renders `*bold*` the same way Telegram Markdown does.
#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn id(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        if self.access_token.is_empty() {
            anyhow::bail!("whatsapp access token is empty");
        }
        if self.phone_number_id.is_empty() {
            anyhow::bail!("whatsapp phone_number_id is empty");
        }
        if self.recipient.is_empty() {
            anyhow::bail!("whatsapp recipient number is empty");
        }

        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": self.recipient,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": message.text
            }
        });
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("whatsapp send failed ({status}): {body}");
        }

        Ok(())
    }
}
