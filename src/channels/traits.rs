use async_trait::async_trait;

/// Reminder text ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
}

impl OutboundMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Delivery channel contract. New channels only need to implement this trait.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Stable channel identifier (e.g. `telegram`, `whatsapp`).
    fn id(&self) -> &'static str;

    /// Deliver one message to the channel's configured recipient.
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()>;
}
