//! chat-relay server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use chat_relay::app_state::AppState;
use chat_relay::auth::StaticTokenVerifier;
use chat_relay::config::RelayConfig;
use chat_relay::domain::{EventBus, SessionRegistry};
use chat_relay::service::{ChatService, SessionService};
use chat_relay::storage::postgres::PostgresStore;
use chat_relay::storage::ChatStore;
use chat_relay::ws::handler::ws_handler;
use chat_relay::{api, auth::TokenVerifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = RelayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting chat-relay");

    // Connect storage
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let store: Arc<dyn ChatStore> = Arc::new(PostgresStore::new(pool));

    // Build domain layer
    let registry = Arc::new(SessionRegistry::new());
    let event_bus = EventBus::new(config.event_bus_capacity);
    let verifier: Arc<dyn TokenVerifier> =
        Arc::new(StaticTokenVerifier::new(config.auth_tokens.clone()));

    // Build service layer
    let sessions = Arc::new(SessionService::new(
        registry,
        Arc::clone(&verifier),
        Arc::clone(&store),
        event_bus.clone(),
    ));
    let chat = Arc::new(ChatService::new(Arc::clone(&store), event_bus.clone()));

    // Build application state
    let app_state = AppState {
        sessions,
        chat,
        event_bus,
        verifier,
        auth_handshake_timeout: Duration::from_secs(config.auth_handshake_timeout_secs),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
