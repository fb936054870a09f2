//! Outbound reminder channels (Telegram, WhatsApp).
//!
//! Channel-specific adapters are pluggable behind [`NotificationChannel`].
//! Which channels are active is decided per dispatcher run from the settings
//! row, so edits to credentials take effect on the next run.

pub mod telegram;
pub mod traits;
pub mod whatsapp;

use std::sync::Arc;

use crate::config::{TelegramConfig, WhatsAppConfig};
use crate::store::Settings;

pub use telegram::TelegramChannel;
pub use traits::{NotificationChannel, OutboundMessage};
pub use whatsapp::WhatsAppChannel;

/// Endpoint and credential configuration for all channels.
#[derive(Debug, Clone, Default)]
pub struct ChannelEndpoints {
    pub telegram: TelegramConfig,
    pub whatsapp: WhatsAppConfig,
}

/// Channels enabled by `settings`, plus a note for each one the method asks
/// for but that is missing credentials.
pub fn build_channels(
    settings: &Settings,
    endpoints: &ChannelEndpoints,
    client: &reqwest::Client,
) -> (Vec<Arc<dyn NotificationChannel>>, Vec<String>) {
    let method = settings.notification_method;
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
    let mut skipped = Vec::new();

    if method.includes_telegram() {
        match (
            present(&settings.telegram_bot_token),
            present(&settings.telegram_chat_id),
        ) {
            (Some(token), Some(chat_id)) => channels.push(Arc::new(TelegramChannel::new(
                &endpoints.telegram,
                token,
                chat_id,
                client.clone(),
            ))),
            _ => skipped.push("telegram not configured (bot token and chat id required)".to_owned()),
        }
    }

    if method.includes_whatsapp() {
        match present(&settings.whatsapp_number) {
            Some(number) if WhatsAppChannel::has_credentials(&endpoints.whatsapp) => {
                channels.push(Arc::new(WhatsAppChannel::new(
                    &endpoints.whatsapp,
                    number,
                    client.clone(),
                )));
            }
            Some(_) => skipped.push(
                "whatsapp not configured (access token and phone number id required)".to_owned(),
            ),
            None => skipped.push("whatsapp not configured (recipient number required)".to_owned()),
        }
    }

    (channels, skipped)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
