use crate::channels::traits::{NotificationChannel, OutboundMessage};
use crate::config::TelegramConfig;
use async_trait::async_trait;

/// Telegram Bot API channel.
///
/// Sends Markdown-formatted messages to a single chat.
#[derive(Clone)]
pub struct TelegramChannel {
    api_base: String,
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

#[derive(serde::Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramChannel {
    pub fn new(
        config: &TelegramConfig,
        bot_token: &str,
        chat_id: &str,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            bot_token: bot_token.trim().to_owned(),
            chat_id: chat_id.trim().to_owned(),
            client,
        }
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn id(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        if self.bot_token.is_empty() {
            anyhow::bail!("telegram bot token is empty");
        }
        if self.chat_id.is_empty() {
            anyhow::bail!("telegram chat id is empty");
        }

        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": message.text,
            "parse_mode": "Markdown"
        });
        let response = self.client.post(self.send_url()).json(&body).send().await?;

        let status = response.status();
        let raw = response.text().await.unwrap_or_default();
        // Telegram reports API errors both as non-2xx and as `ok: false`.
        match serde_json::from_str::<TelegramResponse>(&raw) {
            Ok(parsed) if parsed.ok && status.is_success() => Ok(()),
            Ok(parsed) => anyhow::bail!(
                "telegram send failed ({status}): {}",
                parsed.description.unwrap_or(raw)
            ),
            Err(_) => anyhow::bail!("telegram send failed ({status}): {raw}"),
        }
    }
}
