use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use event_moderation_server::config::Config;
use event_moderation_server::moderation::ModerationService;
use event_moderation_server::notify::{LogNotifier, Notifier, WebhookNotifier};
use event_moderation_server::routes::create_routes;
use event_moderation_server::state::AppState;
use event_moderation_server::store::{EventStore, MemoryStore, PgEventStore};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let store: Arc<dyn EventStore> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Successfully connected to database");

            if config.run_migrations {
                sqlx::migrate!()
                    .run(&pool)
                    .await
                    .expect("Failed to run migrations");

                tracing::info!("Migrations run successfully");
            } else {
                tracing::info!(tables = ?config.tables, "Migrations disabled, using existing tables");
            }

            Arc::new(PgEventStore::new(pool, config.tables.clone()))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is not persisted)");
            Arc::new(MemoryStore::new())
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Notifications delivered via webhook");
            Arc::new(WebhookNotifier::new(url.clone()).expect("Failed to build notification client"))
        }
        None => {
            tracing::info!("NOTIFY_WEBHOOK_URL not set, notifications are only logged");
            Arc::new(LogNotifier)
        }
    };

    let state = AppState::new(ModerationService::new(store, notifier));
    let app = create_routes(state, &config);

    let addr = config.bind_addr();
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
