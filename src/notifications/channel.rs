use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::notifications::error::NotificationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    WhatsApp,
    Push,
    Slack,
    Discord,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Email,
        Channel::Sms,
        Channel::WhatsApp,
        Channel::Push,
        Channel::Slack,
        Channel::Discord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::WhatsApp => "whatsapp",
            Channel::Push => "push",
            Channel::Slack => "slack",
            Channel::Discord => "discord",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| NotificationError::UnknownChannel(s.to_string()))
    }
}

/// A rendered message addressed to one recipient on one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub channel: Channel,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
}

impl OutboundMessage {
    pub fn new(channel: Channel, recipient: impl Into<String>, subject: Option<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            recipient: recipient.into(),
            subject,
            body: body.into(),
        }
    }

    /// Subject on its own line (bold in chat markup) followed by the body
    pub fn as_chat_text(&self) -> String {
        match &self.subject {
            Some(subject) => format!("*{}*\n{}", subject, self.body),
            None => self.body.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: Uuid,
    pub channel: Channel,
    pub delivered_at: DateTime<Utc>,
}

impl DeliveryReceipt {
    pub fn for_message(message: &OutboundMessage) -> Self {
        Self {
            message_id: message.id,
            channel: message.channel,
            delivered_at: Utc::now(),
        }
    }
}

/// One delivery backend. Vendor integrations (SMTP, SMS, push) implement this.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, NotificationError>;
}

/// Posts to a Slack or Discord incoming webhook
pub struct WebhookChannel {
    channel: Channel,
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(channel: Channel, url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        if !matches!(channel, Channel::Slack | Channel::Discord) {
            return Err(NotificationError::delivery(
                channel,
                "incoming webhooks only exist for slack and discord",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::delivery(channel, e.to_string()))?;

        Ok(Self {
            channel,
            url: url.into(),
            client,
        })
    }

    pub fn slack(url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        Self::new(Channel::Slack, url, timeout)
    }

    pub fn discord(url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        Self::new(Channel::Discord, url, timeout)
    }

    fn payload(&self, message: &OutboundMessage) -> serde_json::Value {
        let text = message.as_chat_text();
        match self.channel {
            Channel::Discord => json!({ "content": text }),
            _ => json!({ "text": text }),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| NotificationError::delivery(self.channel, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::delivery(
                self.channel,
                format!("webhook returned {}: {}", status, body),
            ));
        }

        tracing::debug!(message_id = %message.id, channel = %self.channel, "Webhook accepted notification");
        Ok(DeliveryReceipt::for_message(message))
    }
}

/// Writes the notification to the log instead of delivering it
pub struct LogChannel {
    channel: Channel,
}

impl LogChannel {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, NotificationError> {
        tracing::info!(
            message_id = %message.id,
            channel = %self.channel,
            recipient = %message.recipient,
            subject = ?message.subject,
            "{}",
            message.body
        );
        Ok(DeliveryReceipt::for_message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
        assert_eq!("WhatsApp".parse::<Channel>().unwrap(), Channel::WhatsApp);
        assert_eq!(
            "pager".parse::<Channel>().unwrap_err(),
            NotificationError::UnknownChannel("pager".into())
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Channel::WhatsApp).unwrap(), "\"whatsapp\"");
        let parsed: Channel = serde_json::from_str("\"discord\"").unwrap();
        assert_eq!(parsed, Channel::Discord);
    }

    #[test]
    fn webhook_payload_shape_per_channel() {
        let message = OutboundMessage::new(Channel::Slack, "#ops", Some("Deploy".into()), "done");
        let slack = WebhookChannel::slack("http://localhost/hook", Duration::from_secs(1)).unwrap();
        assert_eq!(slack.payload(&message), json!({"text": "*Deploy*\ndone"}));

        let discord = WebhookChannel::discord("http://localhost/hook", Duration::from_secs(1)).unwrap();
        assert_eq!(discord.payload(&message), json!({"content": "*Deploy*\ndone"}));
    }

    #[test]
    fn webhook_channel_rejects_non_chat_channels() {
        assert!(WebhookChannel::new(Channel::Email, "http://x", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn log_channel_always_delivers() {
        let channel = LogChannel::new(Channel::Email);
        let message = OutboundMessage::new(Channel::Email, "a@b.c", None, "hi");
        let receipt = channel.send(&message).await.unwrap();
        assert_eq!(receipt.message_id, message.id);
        assert_eq!(receipt.channel, Channel::Email);
    }
}
