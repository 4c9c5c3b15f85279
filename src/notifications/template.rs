use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::notifications::error::NotificationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
}

impl Template {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subject: None,
            body: body.into(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Subject and body after variable substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub subject: Option<String>,
    pub body: String,
}

/// Named templates, owned by whoever builds the notifier
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Templates every deployment starts with
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            Template::new("welcome", "Hello {{name}}, welcome aboard!").with_subject("Welcome, {{name}}"),
        );
        registry.register(
            Template::new(
                "payment_received",
                "Payment of R$ {{amount}} received for order {{order_id}}.",
            )
            .with_subject("Payment confirmed"),
        );
        registry.register(Template::new("webhook_event", "[{{source}}] {{event}}"));
        registry
    }

    /// Adds or replaces a template
    pub fn register(&mut self, template: Template) {
        tracing::debug!("Registered notification template '{}'", template.name);
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn render(&self, name: &str, vars: &Map<String, Value>) -> Result<RenderedMessage, NotificationError> {
        let template = self
            .get(name)
            .ok_or_else(|| NotificationError::TemplateNotFound(name.to_string()))?;

        let subject = match &template.subject {
            Some(subject) => Some(interpolate(&template.name, subject, vars)?),
            None => None,
        };

        Ok(RenderedMessage {
            subject,
            body: interpolate(&template.name, &template.body, vars)?,
        })
    }
}

/// Replace every `{{ key }}` with the matching variable
///
/// Strings are inserted verbatim, other JSON values in their JSON form.
/// An opening `{{` without a closing `}}` is kept as literal text.
pub fn interpolate(template: &str, text: &str, vars: &Map<String, Value>) -> Result<String, NotificationError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            break;
        };

        out.push_str(&rest[..open]);
        let key = after_open[..close].trim();
        match vars.get(key) {
            Some(Value::String(s)) => out.push_str(s),
            Some(other) => out.push_str(&other.to_string()),
            None => {
                return Err(NotificationError::MissingVariable {
                    template: template.to_string(),
                    variable: key.to_string(),
                })
            }
        }
        rest = &after_open[close + 2..];
    }

    out.push_str(rest);
    Ok(out)
}
