// Notifications: templates, channel backends, multi-channel dispatch and the send queue

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod template;

pub use channel::{Channel, DeliveryReceipt, LogChannel, NotificationChannel, OutboundMessage, WebhookChannel};
pub use dispatcher::{ChannelOutcome, Notification, NotificationContent, Notifier};
pub use error::NotificationError;
pub use queue::{NotificationQueue, QueueStats};
pub use template::{RenderedMessage, Template, TemplateRegistry};
