use serde_json::{json, Value};

use crate::integrations::WebhookRouter;
use crate::marketplace::Marketplace;
use crate::notifications::Notifier;
use crate::payments::PaymentService;
use crate::registry::Module;

pub const MODULE_VERSION: &str = env!("CARGO_PKG_VERSION");

impl Module for PaymentService {
    fn name(&self) -> &str {
        "payments"
    }

    fn describe(&self) -> Value {
        let config = self.config();
        json!({
            "provider": "pix",
            "merchant_name": config.merchant_name,
            "merchant_key_configured": !config.merchant_key.is_empty(),
            "ascii_only": config.ascii_only,
        })
    }
}

impl Module for Notifier {
    fn name(&self) -> &str {
        "notifications"
    }

    fn describe(&self) -> Value {
        json!({
            "channels": self.configured_channels(),
            "templates": self.templates().names(),
        })
    }
}

impl Module for WebhookRouter {
    fn name(&self) -> &str {
        "integrations"
    }

    fn describe(&self) -> Value {
        json!({ "sources": self.sources() })
    }
}

impl Module for Marketplace {
    fn name(&self) -> &str {
        "marketplace"
    }

    fn describe(&self) -> Value {
        match self.list() {
            Ok(installed) => json!({ "installed": installed }),
            Err(e) => json!({ "error": e.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PixConfig;
    use crate::notifications::{Channel, LogChannel, TemplateRegistry};
    use crate::registry::ModuleRegistry;
    use std::sync::Arc;

    #[test]
    fn builtin_modules_describe_themselves() {
        let registry = ModuleRegistry::new();
        registry
            .register_instance(Arc::new(PaymentService::new(PixConfig {
                merchant_key: "key@pix.com".into(),
                merchant_name: "LOJA".into(),
                ascii_only: true,
            })))
            .unwrap();
        registry
            .register_instance(Arc::new(
                Notifier::new(TemplateRegistry::with_defaults()).with_channel(Arc::new(LogChannel::new(Channel::Slack))),
            ))
            .unwrap();

        let payments = registry.get("payments").unwrap().describe();
        assert_eq!(payments["merchant_key_configured"], true);
        assert!(payments.get("merchant_key").is_none());

        let notifications = registry.get("notifications").unwrap().describe();
        assert_eq!(notifications["channels"], json!(["slack"]));
        assert_eq!(registry.get("notifications").unwrap().version(), MODULE_VERSION);
    }
}
