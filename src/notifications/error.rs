use thiserror::Error;

use crate::notifications::channel::Channel;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template '{template}' references missing variable '{variable}'")]
    MissingVariable { template: String, variable: String },

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Channel not configured: {0}")]
    ChannelNotConfigured(Channel),

    #[error("Delivery via {channel} failed: {reason}")]
    Delivery { channel: Channel, reason: String },

    #[error("Notification queue is full")]
    QueueFull,

    #[error("Notification queue is closed")]
    QueueClosed,
}

impl NotificationError {
    pub fn delivery(channel: Channel, reason: impl Into<String>) -> Self {
        NotificationError::Delivery {
            channel,
            reason: reason.into(),
        }
    }
}
