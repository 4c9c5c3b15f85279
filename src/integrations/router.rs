use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::IntegrationConfig;
use crate::integrations::error::IntegrationError;
use crate::integrations::signature::SignatureScheme;
use crate::notifications::{Channel, Notifier};

/// A verified, parsed webhook delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub source: String,
    pub event_type: Option<String>,
    pub delivery_id: Option<String>,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl WebhookEvent {
    fn from_request(source: &str, headers: &HeaderMap, payload: Value) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let event_type = header("x-github-event")
            .or_else(|| header("x-event-type"))
            .or_else(|| payload.get("type").and_then(Value::as_str).map(str::to_string))
            .or_else(|| payload.get("event").and_then(Value::as_str).map(str::to_string));

        Self {
            source: source.to_string(),
            event_type,
            delivery_id: header("x-github-delivery").or_else(|| header("x-request-id")),
            payload,
            received_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle(&self, event: &WebhookEvent) -> Result<Value, IntegrationError>;
}

/// Acknowledges and logs events that nothing else consumes
pub struct LogHandler;

#[async_trait]
impl WebhookHandler for LogHandler {
    async fn handle(&self, event: &WebhookEvent) -> Result<Value, IntegrationError> {
        tracing::info!(
            source = %event.source,
            event_type = ?event.event_type,
            delivery_id = ?event.delivery_id,
            "Webhook received"
        );
        Ok(json!({ "received": true }))
    }
}

/// Forwards each event to a notification channel using the `webhook_event` template
pub struct NotifyHandler {
    notifier: Arc<Notifier>,
    channel: Channel,
    recipient: String,
}

impl NotifyHandler {
    pub const TEMPLATE: &'static str = "webhook_event";

    pub fn new(notifier: Arc<Notifier>, channel: Channel, recipient: impl Into<String>) -> Self {
        Self {
            notifier,
            channel,
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl WebhookHandler for NotifyHandler {
    async fn handle(&self, event: &WebhookEvent) -> Result<Value, IntegrationError> {
        let mut vars = Map::new();
        vars.insert("source".into(), Value::String(event.source.clone()));
        vars.insert(
            "event".into(),
            Value::String(event.event_type.clone().unwrap_or_else(|| "event".to_string())),
        );

        let receipt = self
            .notifier
            .send_template(self.channel, &self.recipient, Self::TEMPLATE, &vars)
            .await
            .map_err(|e| IntegrationError::Handler(e.to_string()))?;

        Ok(json!({ "forwarded": true, "channel": self.channel, "message_id": receipt.message_id }))
    }
}

struct WebhookSource {
    secret: String,
    scheme: SignatureScheme,
    handler: Arc<dyn WebhookHandler>,
}

/// Webhook sources by name; each has its own secret, scheme and handler
pub struct WebhookRouter {
    sources: HashMap<String, WebhookSource>,
    tolerance_secs: i64,
}

impl WebhookRouter {
    pub fn new(tolerance_secs: i64) -> Self {
        Self {
            sources: HashMap::new(),
            tolerance_secs,
        }
    }

    /// Sources from config; those with `notify` set forward to that channel,
    /// the rest are logged
    pub fn from_config(config: &IntegrationConfig, notifier: Arc<Notifier>) -> Result<Self, IntegrationError> {
        let mut router = Self::new(config.slack_tolerance_secs);

        for source in &config.sources {
            let scheme: SignatureScheme = source.scheme.parse()?;
            let handler: Arc<dyn WebhookHandler> = match source.notify.as_deref() {
                Some(channel) => {
                    let channel: Channel = channel
                        .parse()
                        .map_err(|e: crate::notifications::NotificationError| IntegrationError::Configuration(e.to_string()))?;
                    Arc::new(NotifyHandler::new(notifier.clone(), channel, source.name.clone()))
                }
                None => Arc::new(LogHandler),
            };
            router.register(&source.name, &source.secret, scheme, handler)?;
        }

        Ok(router)
    }

    pub fn register(
        &mut self,
        name: &str,
        secret: &str,
        scheme: SignatureScheme,
        handler: Arc<dyn WebhookHandler>,
    ) -> Result<(), IntegrationError> {
        if self.sources.contains_key(name) {
            return Err(IntegrationError::DuplicateSource(name.to_string()));
        }
        if secret.is_empty() {
            return Err(IntegrationError::Configuration(format!("source '{}' has an empty secret", name)));
        }

        self.sources.insert(
            name.to_string(),
            WebhookSource {
                secret: secret.to_string(),
                scheme,
                handler,
            },
        );
        tracing::debug!("Registered webhook source '{}' ({})", name, scheme);
        Ok(())
    }

    pub fn sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn dispatch(&self, source: &str, headers: &HeaderMap, body: &[u8]) -> Result<Value, IntegrationError> {
        self.dispatch_at(source, headers, body, Utc::now().timestamp()).await
    }

    /// Verify, parse and hand off; `now` is the reference time for replay checks
    pub async fn dispatch_at(
        &self,
        source: &str,
        headers: &HeaderMap,
        body: &[u8],
        now: i64,
    ) -> Result<Value, IntegrationError> {
        let entry = self
            .sources
            .get(source)
            .ok_or_else(|| IntegrationError::UnknownSource(source.to_string()))?;

        if let Err(e) = entry
            .scheme
            .verify(entry.secret.as_bytes(), headers, body, now, self.tolerance_secs)
        {
            tracing::warn!(source, "Rejected webhook: {}", e);
            return Err(e);
        }

        let payload: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(body).map_err(|e| IntegrationError::InvalidPayload(e.to_string()))?
        };

        let event = WebhookEvent::from_request(source, headers, payload);
        entry.handler.handle(&event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebhookSourceConfig;
    use crate::notifications::TemplateRegistry;
    use crate::testing::{MemoryChannel, RecordingHandler};
    use axum::http::HeaderValue;

    const NOW: i64 = 1_700_000_000;

    fn signed(scheme: SignatureScheme, secret: &str, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in scheme.sign_headers(secret.as_bytes(), body, NOW) {
            headers.insert(k, HeaderValue::from_str(&v).unwrap());
        }
        headers
    }

    #[tokio::test]
    async fn verified_event_reaches_handler() {
        let handler = Arc::new(RecordingHandler::new());
        let mut router = WebhookRouter::new(300);
        router.register("github", "s3cret", SignatureScheme::GitHub, handler.clone()).unwrap();

        let body = br#"{"action":"opened"}"#;
        let mut headers = signed(SignatureScheme::GitHub, "s3cret", body);
        headers.insert("x-github-event", HeaderValue::from_static("pull_request"));
        headers.insert("x-github-delivery", HeaderValue::from_static("abc-1"));

        router.dispatch_at("github", &headers, body, NOW).await.unwrap();

        let events = handler.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_deref(), Some("pull_request"));
        assert_eq!(events[0].delivery_id.as_deref(), Some("abc-1"));
        assert_eq!(events[0].payload["action"], "opened");
    }

    #[tokio::test]
    async fn bad_signature_never_reaches_handler() {
        let handler = Arc::new(RecordingHandler::new());
        let mut router = WebhookRouter::new(300);
        router.register("billing", "right", SignatureScheme::Hex, handler.clone()).unwrap();

        let body = br#"{"type":"invoice.paid"}"#;
        let headers = signed(SignatureScheme::Hex, "wrong", body);
        let err = router.dispatch_at("billing", &headers, body, NOW).await.unwrap_err();

        assert_eq!(err, IntegrationError::InvalidSignature);
        assert!(handler.events().is_empty());
    }

    #[tokio::test]
    async fn unknown_source_and_bad_json() {
        let mut router = WebhookRouter::new(300);
        router
            .register("billing", "k", SignatureScheme::Hex, Arc::new(LogHandler))
            .unwrap();

        let err = router.dispatch_at("nope", &HeaderMap::new(), b"{}", NOW).await.unwrap_err();
        assert_eq!(err, IntegrationError::UnknownSource("nope".into()));

        let body = b"not json";
        let headers = signed(SignatureScheme::Hex, "k", body);
        let err = router.dispatch_at("billing", &headers, body, NOW).await.unwrap_err();
        assert!(matches!(err, IntegrationError::InvalidPayload(_)));
    }

    #[test]
    fn duplicate_and_empty_secret_registration() {
        let mut router = WebhookRouter::new(300);
        router.register("a", "k", SignatureScheme::Hex, Arc::new(LogHandler)).unwrap();
        assert_eq!(
            router.register("a", "k", SignatureScheme::Hex, Arc::new(LogHandler)),
            Err(IntegrationError::DuplicateSource("a".into()))
        );
        assert!(matches!(
            router.register("b", "", SignatureScheme::Hex, Arc::new(LogHandler)),
            Err(IntegrationError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn notify_handler_fans_out_to_channel() {
        let slack = Arc::new(MemoryChannel::new(Channel::Slack));
        let notifier = Arc::new(Notifier::new(TemplateRegistry::with_defaults()).with_channel(slack.clone()));

        let config = IntegrationConfig {
            sources: vec![WebhookSourceConfig {
                name: "billing".into(),
                secret: "k".into(),
                scheme: "hex".into(),
                notify: Some("slack".into()),
            }],
            slack_tolerance_secs: 300,
        };
        let router = WebhookRouter::from_config(&config, notifier).unwrap();

        let body = br#"{"type":"invoice.paid"}"#;
        let headers = signed(SignatureScheme::Hex, "k", body);
        let response = router.dispatch_at("billing", &headers, body, NOW).await.unwrap();

        assert_eq!(response["forwarded"], true);
        let sent = slack.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "[billing] invoice.paid");
    }

    #[test]
    fn from_config_rejects_unknown_channel() {
        let config = IntegrationConfig {
            sources: vec![WebhookSourceConfig {
                name: "x".into(),
                secret: "k".into(),
                scheme: "hex".into(),
                notify: Some("pager".into()),
            }],
            slack_tolerance_secs: 300,
        };
        let notifier = Arc::new(Notifier::new(TemplateRegistry::new()));
        assert!(matches!(
            WebhookRouter::from_config(&config, notifier),
            Err(IntegrationError::Configuration(_))
        ));
    }
}
