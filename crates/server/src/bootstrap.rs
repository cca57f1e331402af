use std::sync::Arc;

use axum::Router;
use cartline_agent::{
    AgentRuntime, BoundedPlanner, Capabilities, CapabilitySelector, HttpLlmClient,
    KeywordSelector, LlmCapabilitySelector, LlmClient, LlmError, RuntimeSettings,
};
use cartline_core::config::{AppConfig, ConfigError, LoadOptions};
use cartline_core::links::PendingLinkRegistry;
use cartline_core::ports::{CatalogSearch, OrderGateway, ProductListing};
use cartline_core::transcript::TranscriptStore;
use cartline_core::{InMemoryCatalog, InMemoryOrderGateway};
use cartline_db::{
    connect_with_settings, migrations, DbPool, PhoneLinkRepository, SqlPhoneLinkRepository,
    SqlSessionStore, SqlTranscriptStore,
};
use cartline_whatsapp::{Deliverer, DeliveryPolicy, TransportError, TwilioSender};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{self, ApiState};
use crate::crm::{SalesforceClient, SalesforceSetupError};
use crate::health::{self, HealthState};
use crate::storefront::{self, StorefrontState};
use crate::web_cart::WebCartStore;
use crate::webhook::{self, WebhookState};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
    pub web_carts: Arc<WebCartStore>,
    pub pending_links: Arc<PendingLinkRegistry>,
    pub phone_links: Arc<dyn PhoneLinkRepository>,
    pub transcripts: Arc<dyn TranscriptStore>,
    pub products: Arc<dyn ProductListing>,
    pub orders: Arc<dyn OrderGateway>,
    /// Present only when the WhatsApp channel is enabled.
    pub deliverer: Option<Arc<Deliverer>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("crm adapter setup failed: {0}")]
    Crm(#[from] SalesforceSetupError),
    #[error("llm client setup failed: {0}")]
    Llm(#[source] LlmError),
    #[error("whatsapp sender setup failed: {0}")]
    Transport(#[source] TransportError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        session_id = "unknown",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        session_id = "unknown",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        session_id = "unknown",
        "database migrations applied"
    );

    let (catalog, products, orders): (
        Arc<dyn CatalogSearch>,
        Arc<dyn ProductListing>,
        Arc<dyn OrderGateway>,
    ) = if config.crm.enabled {
        let client = Arc::new(SalesforceClient::from_config(&config.crm)?);
        (client.clone(), client.clone(), client)
    } else {
        let demo = Arc::new(InMemoryCatalog::demo());
        (demo.clone(), demo, Arc::new(InMemoryOrderGateway::default()))
    };

    let mut capabilities = Capabilities::new(catalog, orders.clone())
        .with_checkout_source(config.crm.checkout_source.clone());
    let selector: Arc<dyn CapabilitySelector> = if config.llm.enabled {
        let llm: Arc<dyn LlmClient> =
            Arc::new(HttpLlmClient::from_config(&config.llm).map_err(BootstrapError::Llm)?);
        capabilities = capabilities.with_listing_writer(llm.clone());
        Arc::new(LlmCapabilitySelector::new(llm))
    } else {
        Arc::new(KeywordSelector)
    };
    let planner = BoundedPlanner::new(selector, config.agent.planner_max_iterations);

    let web_carts = Arc::new(WebCartStore::default());
    let runtime = AgentRuntime::new(
        Arc::new(SqlSessionStore::new(db_pool.clone())),
        capabilities,
        planner,
        RuntimeSettings::from(&config.agent),
    )
    .with_cart_mirror(web_carts.clone());

    let deliverer = if config.whatsapp.enabled {
        let sender =
            TwilioSender::from_config(&config.whatsapp).map_err(BootstrapError::Transport)?;
        Some(Arc::new(Deliverer::new(
            Arc::new(sender),
            DeliveryPolicy::from_config(&config.whatsapp),
        )))
    } else {
        None
    };

    info!(
        event_name = "system.bootstrap.wired",
        correlation_id = "bootstrap",
        session_id = "unknown",
        crm_enabled = config.crm.enabled,
        llm_enabled = config.llm.enabled,
        whatsapp_enabled = config.whatsapp.enabled,
        "conversation engine wired"
    );

    Ok(Application {
        pending_links: Arc::new(PendingLinkRegistry::new(config.links.pending_ttl_secs)),
        phone_links: Arc::new(SqlPhoneLinkRepository::new(db_pool.clone())),
        transcripts: Arc::new(SqlTranscriptStore::new(db_pool.clone())),
        runtime: Arc::new(runtime),
        web_carts,
        products,
        orders,
        deliverer,
        db_pool,
        config,
    })
}

impl Application {
    pub fn router(&self) -> Router {
        let mut router = health::router(HealthState {
            db_pool: self.db_pool.clone(),
            whatsapp_enabled: self.deliverer.is_some(),
            crm_enabled: self.config.crm.enabled,
        })
        .merge(api::router(ApiState {
            runtime: self.runtime.clone(),
            web_carts: self.web_carts.clone(),
            pending_links: self.pending_links.clone(),
            phone_links: self.phone_links.clone(),
            transcripts: self.transcripts.clone(),
        }))
        .merge(storefront::router(StorefrontState {
            products: self.products.clone(),
            orders: self.orders.clone(),
            web_carts: self.web_carts.clone(),
        }));

        if let Some(deliverer) = &self.deliverer {
            router = router.merge(webhook::router(WebhookState {
                runtime: self.runtime.clone(),
                pending_links: self.pending_links.clone(),
                phone_links: self.phone_links.clone(),
                transcripts: self.transcripts.clone(),
                deliverer: deliverer.clone(),
            }));
        }

        router.layer(TraceLayer::new_for_http())
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use cartline_core::config::{ConfigOverrides, LoadOptions};
    use tower::ServiceExt;

    use crate::bootstrap::bootstrap;

    fn memory_options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_whatsapp_is_enabled_without_credentials() {
        let mut options = memory_options("sqlite::memory:");
        options.overrides.whatsapp_enabled = Some(true);

        let result = bootstrap(options).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("whatsapp.account_sid"));
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_crm_is_enabled_without_instance() {
        let mut options = memory_options("sqlite::memory:");
        options.overrides.crm_enabled = Some(true);

        let message = bootstrap(options).await.err().expect("error").to_string();
        assert!(message.contains("crm.instance_url"));
    }

    #[tokio::test]
    async fn offline_bootstrap_serves_health_chat_and_storefront_without_webhook() {
        let app = bootstrap(memory_options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with defaults");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
             AND name IN ('conversation_session', 'phone_session_link', 'transcript_message')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 3);
        assert!(app.deliverer.is_none());

        let router = app.router();
        let health = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health response");
        assert_eq!(health.status(), StatusCode::OK);

        let chat = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"session_id": "web-1", "message": "show me watches"}"#))
                    .expect("request"),
            )
            .await
            .expect("chat response");
        assert_eq!(chat.status(), StatusCode::OK);

        let categories_request =
            Request::builder().uri("/api/categories").body(Body::empty()).expect("request");
        let categories = router
            .clone()
            .oneshot(categories_request)
            .await
            .expect("categories response");
        assert_eq!(categories.status(), StatusCode::OK);

        let webhook = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("Body=hi&From=whatsapp%3A%2B15550001111"))
                    .expect("request"),
            )
            .await
            .expect("webhook response");
        assert_eq!(webhook.status(), StatusCode::NOT_FOUND);

        app.db_pool.close().await;
    }
}
