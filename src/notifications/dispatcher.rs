use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::NotificationConfig;
use crate::notifications::channel::{
    Channel, DeliveryReceipt, LogChannel, NotificationChannel, OutboundMessage, WebhookChannel,
};
use crate::notifications::error::NotificationError;
use crate::notifications::template::{RenderedMessage, TemplateRegistry};

/// What to say: a named template with variables, or literal text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotificationContent {
    Template {
        name: String,
        #[serde(default)]
        vars: Map<String, Value>,
    },
    Text {
        #[serde(default)]
        subject: Option<String>,
        body: String,
    },
}

/// A notification addressed to one recipient across one or more channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub channels: Vec<Channel>,
    pub recipient: String,
    pub content: NotificationContent,
    /// Duplicates with the same key are skipped by the queue
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Result of delivering to one channel; failures never hide other channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<DeliveryReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelOutcome {
    fn from_result(channel: Channel, result: Result<DeliveryReceipt, NotificationError>) -> Self {
        match result {
            Ok(receipt) => Self {
                channel,
                success: true,
                receipt: Some(receipt),
                error: None,
            },
            Err(e) => Self {
                channel,
                success: false,
                receipt: None,
                error: Some(e.to_string()),
            },
        }
    }
}

pub struct Notifier {
    templates: TemplateRegistry,
    channels: HashMap<Channel, Arc<dyn NotificationChannel>>,
}

impl Notifier {
    pub fn new(templates: TemplateRegistry) -> Self {
        Self {
            templates,
            channels: HashMap::new(),
        }
    }

    /// Slack and Discord webhooks when their URLs are configured; every
    /// other channel logs until a vendor backend is registered for it
    pub fn from_config(config: &NotificationConfig, templates: TemplateRegistry) -> Result<Self, NotificationError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let mut notifier = Self::new(templates);

        for channel in Channel::ALL {
            let url = match channel {
                Channel::Slack => config.slack_webhook_url.as_deref(),
                Channel::Discord => config.discord_webhook_url.as_deref(),
                _ => None,
            };
            match url {
                Some(url) => notifier.register_channel(Arc::new(WebhookChannel::new(channel, url, timeout)?)),
                None => notifier.register_channel(Arc::new(LogChannel::new(channel))),
            }
        }

        Ok(notifier)
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.register_channel(channel);
        self
    }

    /// Adds or replaces the backend for a channel
    pub fn register_channel(&mut self, channel: Arc<dyn NotificationChannel>) {
        tracing::debug!("Registered notification channel {}", channel.channel());
        self.channels.insert(channel.channel(), channel);
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.templates
    }

    pub fn configured_channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.channels.keys().copied().collect();
        channels.sort();
        channels
    }

    pub fn render(&self, content: &NotificationContent) -> Result<RenderedMessage, NotificationError> {
        match content {
            NotificationContent::Template { name, vars } => self.templates.render(name, vars),
            NotificationContent::Text { subject, body } => Ok(RenderedMessage {
                subject: subject.clone(),
                body: body.clone(),
            }),
        }
    }

    pub async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        message: &RenderedMessage,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let backend = self
            .channels
            .get(&channel)
            .ok_or(NotificationError::ChannelNotConfigured(channel))?;

        let outbound = OutboundMessage::new(channel, recipient, message.subject.clone(), message.body.clone());
        let result = backend.send(&outbound).await;

        match &result {
            Ok(_) => tracing::info!(message_id = %outbound.id, channel = %channel, "Notification delivered"),
            Err(e) => tracing::warn!(message_id = %outbound.id, channel = %channel, "Notification failed: {}", e),
        }
        result
    }

    pub async fn send_template(
        &self,
        channel: Channel,
        recipient: &str,
        template: &str,
        vars: &Map<String, Value>,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let message = self.templates.render(template, vars)?;
        self.send(channel, recipient, &message).await
    }

    /// Sends to every channel concurrently; one outcome per requested channel, in order
    pub async fn send_multi(&self, channels: &[Channel], recipient: &str, message: &RenderedMessage) -> Vec<ChannelOutcome> {
        let sends = channels.iter().map(|&channel| async move {
            ChannelOutcome::from_result(channel, self.send(channel, recipient, message).await)
        });
        join_all(sends).await
    }

    /// Render once, then fan out. Rendering errors fail the whole notification.
    pub async fn dispatch(&self, notification: &Notification) -> Result<Vec<ChannelOutcome>, NotificationError> {
        let message = self.render(&notification.content)?;
        Ok(self
            .send_multi(&notification.channels, &notification.recipient, &message)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryChannel;
    use serde_json::json;

    fn text(body: &str) -> RenderedMessage {
        RenderedMessage {
            subject: None,
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn send_uses_registered_backend() {
        let email = Arc::new(MemoryChannel::new(Channel::Email));
        let notifier = Notifier::new(TemplateRegistry::new()).with_channel(email.clone());

        notifier.send(Channel::Email, "a@b.c", &text("hi")).await.unwrap();

        let sent = email.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "a@b.c");
        assert_eq!(sent[0].body, "hi");
    }

    #[tokio::test]
    async fn unconfigured_channel_is_an_error() {
        let notifier = Notifier::new(TemplateRegistry::new());
        let err = notifier.send(Channel::Sms, "+55", &text("hi")).await.unwrap_err();
        assert_eq!(err, NotificationError::ChannelNotConfigured(Channel::Sms));
    }

    #[tokio::test]
    async fn send_template_renders_before_sending() {
        let slack = Arc::new(MemoryChannel::new(Channel::Slack));
        let notifier = Notifier::new(TemplateRegistry::with_defaults()).with_channel(slack.clone());

        let vars = json!({"amount": "25.00", "order_id": "42"});
        notifier
            .send_template(Channel::Slack, "#sales", "payment_received", vars.as_object().unwrap())
            .await
            .unwrap();

        assert_eq!(slack.sent()[0].body, "Payment of R$ 25.00 received for order 42.");
    }

    #[tokio::test]
    async fn multi_channel_reports_each_failure_separately() {
        let email = Arc::new(MemoryChannel::new(Channel::Email));
        let sms = Arc::new(MemoryChannel::failing(Channel::Sms));
        let notifier = Notifier::new(TemplateRegistry::new())
            .with_channel(email.clone())
            .with_channel(sms);

        let outcomes = notifier
            .send_multi(&[Channel::Email, Channel::Sms, Channel::Push], "user-1", &text("hello"))
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].channel, Channel::Email);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(outcomes[1].error.as_deref().unwrap().contains("sms"));
        assert!(!outcomes[2].success);
        assert_eq!(email.sent().len(), 1);
    }

    #[tokio::test]
    async fn dispatch_fails_whole_notification_on_render_error() {
        let notifier = Notifier::new(TemplateRegistry::with_defaults())
            .with_channel(Arc::new(MemoryChannel::new(Channel::Email)));
        let notification = Notification {
            channels: vec![Channel::Email],
            recipient: "a@b.c".into(),
            content: NotificationContent::Template {
                name: "welcome".into(),
                vars: Map::new(),
            },
            idempotency_key: None,
        };
        let err = notifier.dispatch(&notification).await.unwrap_err();
        assert!(matches!(err, NotificationError::MissingVariable { .. }));
    }

    #[test]
    fn from_config_falls_back_to_log_channels() {
        let config = NotificationConfig {
            queue_capacity: 10,
            dedup_window: 10,
            request_timeout_secs: 1,
            slack_webhook_url: Some("http://localhost:9/hook".into()),
            discord_webhook_url: None,
        };
        let notifier = Notifier::from_config(&config, TemplateRegistry::new()).unwrap();
        assert_eq!(notifier.configured_channels(), Channel::ALL.to_vec());
    }

    #[test]
    fn content_json_shape() {
        let content: NotificationContent =
            serde_json::from_value(json!({"type": "text", "body": "hi"})).unwrap();
        assert_eq!(
            content,
            NotificationContent::Text {
                subject: None,
                body: "hi".into()
            }
        );
    }
}
