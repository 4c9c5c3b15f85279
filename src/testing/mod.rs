// Test doubles shared by unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::{Notify, Semaphore};

use crate::integrations::{IntegrationError, WebhookEvent, WebhookHandler};
use crate::notifications::{Channel, DeliveryReceipt, NotificationChannel, NotificationError, OutboundMessage};

/// Records every message it is asked to send
pub struct MemoryChannel {
    channel: Channel,
    fail: bool,
    sent: Mutex<Vec<OutboundMessage>>,
    gate: Option<Gate>,
}

struct Gate {
    entered: Notify,
    open: Semaphore,
}

impl MemoryChannel {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            fail: false,
            sent: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Every send fails with a delivery error
    pub fn failing(channel: Channel) -> Self {
        Self {
            fail: true,
            ..Self::new(channel)
        }
    }

    /// Sends block until `release` is called
    pub fn blocked(channel: Channel) -> Self {
        Self {
            gate: Some(Gate {
                entered: Notify::new(),
                open: Semaphore::new(0),
            }),
            ..Self::new(channel)
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub async fn wait_until_blocked(&self) {
        if let Some(gate) = &self.gate {
            gate.entered.notified().await;
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            // A closed semaphore makes every pending and future acquire return at once
            gate.open.close();
        }
    }
}

#[async_trait]
impl NotificationChannel for MemoryChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, NotificationError> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            let _ = gate.open.acquire().await;
        }
        if self.fail {
            return Err(NotificationError::delivery(self.channel, "simulated outage"));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(DeliveryReceipt::for_message(message))
    }
}

/// Webhook handler that stores the events it receives
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<WebhookEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WebhookEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookHandler for RecordingHandler {
    async fn handle(&self, event: &WebhookEvent) -> Result<Value, IntegrationError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(serde_json::json!({ "recorded": true }))
    }
}

/// Lay out `manifest` under `root` the way `DirectorySource` expects; returns the version directory
pub fn publish(root: &std::path::Path, manifest: &crate::marketplace::ModuleManifest) -> std::path::PathBuf {
    let dir = root.join(&manifest.name).join(&manifest.version);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(crate::marketplace::MANIFEST_FILE),
        serde_json::to_string_pretty(manifest).unwrap(),
    )
    .unwrap();
    dir
}
