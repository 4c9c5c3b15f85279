use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub pix: PixConfig,
    pub notifications: NotificationConfig,
    pub integrations: IntegrationConfig,
    pub marketplace: MarketplaceConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size_bytes: usize,
}

/// One year; longer lifetimes are refused
pub const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixConfig {
    pub merchant_key: String,
    pub merchant_name: String,
    pub ascii_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub queue_capacity: usize,
    pub dedup_window: usize,
    pub request_timeout_secs: u64,
    pub slack_webhook_url: Option<String>,
    pub discord_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSourceConfig {
    pub name: String,
    #[serde(skip_serializing)]
    pub secret: String,
    /// "github", "slack" or "hex"
    pub scheme: String,
    /// Channel to forward verified events to, if any
    pub notify: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub sources: Vec<WebhookSourceConfig>,
    pub slack_tolerance_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    pub source_dir: PathBuf,
    pub modules_dir: PathBuf,
    pub config_file: PathBuf,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} is not a valid URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("{0} must be set in {1:?}")]
    Required(&'static str, Environment),

    #[error("webhook source '{0}' has no secret")]
    MissingWebhookSecret(String),

    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(&lookup)
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(v) = lookup("NEXUS_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("NEXUS_PORT").or_else(|| lookup("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Some(v) = lookup("SERVER_MAX_REQUEST_SIZE_BYTES") {
            self.server.max_request_size_bytes = v.parse().unwrap_or(self.server.max_request_size_bytes);
        }

        // Security overrides
        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(v) = lookup("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Some(v) = lookup("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // PIX overrides
        if let Some(v) = lookup("PIX_MERCHANT_KEY") {
            self.pix.merchant_key = v;
        }
        if let Some(v) = lookup("PIX_MERCHANT_NAME") {
            self.pix.merchant_name = v;
        }
        if let Some(v) = lookup("PIX_ASCII_ONLY") {
            self.pix.ascii_only = v.parse().unwrap_or(self.pix.ascii_only);
        }

        // Notification overrides
        if let Some(v) = lookup("NOTIFY_QUEUE_CAPACITY") {
            self.notifications.queue_capacity = v.parse().unwrap_or(self.notifications.queue_capacity);
        }
        if let Some(v) = lookup("NOTIFY_DEDUP_WINDOW") {
            self.notifications.dedup_window = v.parse().unwrap_or(self.notifications.dedup_window);
        }
        if let Some(v) = lookup("NOTIFY_REQUEST_TIMEOUT_SECS") {
            self.notifications.request_timeout_secs = v.parse().unwrap_or(self.notifications.request_timeout_secs);
        }
        if let Some(v) = lookup("SLACK_WEBHOOK_URL") {
            self.notifications.slack_webhook_url = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("DISCORD_WEBHOOK_URL") {
            self.notifications.discord_webhook_url = Some(v).filter(|s| !s.is_empty());
        }

        // Integration overrides: WEBHOOK_SOURCES=github,billing then WEBHOOK_SECRET_GITHUB, ...
        if let Some(v) = lookup("WEBHOOK_SOURCES") {
            self.integrations.sources = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|name| {
                    let upper = name.to_ascii_uppercase();
                    WebhookSourceConfig {
                        name: name.to_string(),
                        secret: lookup(&format!("WEBHOOK_SECRET_{}", upper)).unwrap_or_default(),
                        scheme: lookup(&format!("WEBHOOK_SCHEME_{}", upper))
                            .unwrap_or_else(|| default_scheme(name).to_string()),
                        notify: lookup(&format!("WEBHOOK_NOTIFY_{}", upper)),
                    }
                })
                .collect();
        }
        if let Some(v) = lookup("WEBHOOK_SLACK_TOLERANCE_SECS") {
            self.integrations.slack_tolerance_secs = v.parse().unwrap_or(self.integrations.slack_tolerance_secs);
        }

        // Marketplace overrides
        if let Some(v) = lookup("MARKETPLACE_SOURCE_DIR") {
            self.marketplace.source_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MARKETPLACE_MODULES_DIR") {
            self.marketplace.modules_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MARKETPLACE_CONFIG_FILE") {
            self.marketplace.config_file = PathBuf::from(v);
        }

        self
    }

    /// Checks that cannot be expressed by defaults alone
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment == Environment::Production && self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Required("JWT_SECRET", self.environment));
        }
        if !(1..=MAX_JWT_EXPIRY_HOURS).contains(&self.security.jwt_expiry_hours) {
            return Err(ConfigError::InvalidValue("SECURITY_JWT_EXPIRY_HOURS"));
        }
        if self.notifications.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue("NOTIFY_QUEUE_CAPACITY"));
        }

        let urls = [
            ("SLACK_WEBHOOK_URL", &self.notifications.slack_webhook_url),
            ("DISCORD_WEBHOOK_URL", &self.notifications.discord_webhook_url),
        ];
        for (field, value) in urls {
            if let Some(raw) = value {
                url::Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
                    field,
                    reason: e.to_string(),
                })?;
            }
        }

        for source in &self.integrations.sources {
            if source.secret.is_empty() {
                return Err(ConfigError::MissingWebhookSecret(source.name.clone()));
            }
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "development-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            pix: PixConfig::default(),
            notifications: NotificationConfig {
                queue_capacity: 1000,
                dedup_window: 1000,
                request_timeout_secs: 10,
                slack_webhook_url: None,
                discord_webhook_url: None,
            },
            integrations: IntegrationConfig {
                sources: Vec::new(),
                slack_tolerance_secs: 300,
            },
            marketplace: MarketplaceConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_request_size_bytes: 512 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            pix: PixConfig {
                ascii_only: true,
                ..PixConfig::default()
            },
            notifications: NotificationConfig {
                queue_capacity: 5000,
                dedup_window: 10_000,
                request_timeout_secs: 10,
                slack_webhook_url: None,
                discord_webhook_url: None,
            },
            integrations: IntegrationConfig {
                sources: Vec::new(),
                slack_tolerance_secs: 300,
            },
            marketplace: MarketplaceConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_request_size_bytes: 256 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
            },
            pix: PixConfig {
                ascii_only: true,
                ..PixConfig::default()
            },
            notifications: NotificationConfig {
                queue_capacity: 10_000,
                dedup_window: 50_000,
                request_timeout_secs: 5,
                slack_webhook_url: None,
                discord_webhook_url: None,
            },
            integrations: IntegrationConfig {
                sources: Vec::new(),
                slack_tolerance_secs: 300,
            },
            marketplace: MarketplaceConfig::default(),
        }
    }
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("marketplace"),
            modules_dir: PathBuf::from("modules"),
            config_file: PathBuf::from("nexus.json"),
        }
    }
}

fn default_scheme(source: &str) -> &'static str {
    match source {
        "github" => "github",
        "slack" => "slack",
        _ => "hex",
    }
}
