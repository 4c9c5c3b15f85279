use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::JwtService;
use crate::config::{AppConfig, SecurityConfig};
use crate::handlers;
use crate::integrations::WebhookRouter;
use crate::marketplace::Marketplace;
use crate::middleware::jwt_auth_middleware;
use crate::notifications::{NotificationQueue, Notifier, TemplateRegistry};
use crate::payments::PaymentService;
use crate::registry::{Module, ModuleRegistry};

/// Everything a request handler can reach; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub payments: Arc<PaymentService>,
    pub notifier: Arc<Notifier>,
    pub queue: Arc<NotificationQueue>,
    pub webhooks: Arc<WebhookRouter>,
    pub registry: Arc<ModuleRegistry>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build every module from config. Spawns the notification worker, so it
    /// must run inside a tokio runtime.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let payments = Arc::new(PaymentService::new(config.pix.clone()));
        let notifier = Arc::new(Notifier::from_config(
            &config.notifications,
            TemplateRegistry::with_defaults(),
        )?);
        let queue = Arc::new(NotificationQueue::start(
            notifier.clone(),
            config.notifications.queue_capacity,
            config.notifications.dedup_window,
        ));
        let webhooks = Arc::new(WebhookRouter::from_config(&config.integrations, notifier.clone())?);

        let registry = Arc::new(ModuleRegistry::new());
        registry.register_instance(payments.clone())?;
        registry.register_instance(notifier.clone())?;
        registry.register_instance(webhooks.clone())?;

        let marketplace_config = config.marketplace.clone();
        registry.register("marketplace", move || {
            Ok(Arc::new(Marketplace::from_config(&marketplace_config)) as Arc<dyn Module>)
        })?;

        Ok(Self {
            jwt: JwtService::from_config(&config.security),
            config: Arc::new(config),
            payments,
            notifier,
            queue,
            webhooks,
            registry,
            started_at: Utc::now(),
        })
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/payments/pix", post(handlers::payments::create_charge))
        .route("/api/notifications", post(handlers::notifications::send))
        .route("/api/modules", get(handlers::modules::list))
        .route("/api/modules/:name", get(handlers::modules::show))
        .route("/api/auth/whoami", get(handlers::auth::whoami))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    let public = Router::new()
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        .route("/api/payments/pix/decode", post(handlers::payments::decode))
        .route("/api/webhooks/:source", post(handlers::webhooks::receive));

    let body_limit = state.config.server.max_request_size_bytes;
    let cors = cors_layer(&state.config.security);

    let app = Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    match cors {
        Some(cors) => app.layer(cors).layer(TraceLayer::new_for_http()),
        None => app.layer(TraceLayer::new_for_http()),
    }
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
