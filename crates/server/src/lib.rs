//! TalkShelf Chat Server Library
//!
//! Rooms, membership, an append-only per-room message log, AI fact-check
//! annotations and live SSE subscriptions.

pub mod auth;
pub mod config;
pub mod error;
pub mod factcheck;
pub mod handlers;
pub mod models;
pub mod store;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use auth::AuthManager;
use config::{AppState, ChatServerConfig};
use factcheck::FactCheckManager;
use handlers::{
    create_room, get_fact_checks, get_messages, join_room, leave_room, list_rooms, login, logout,
    me, send_message, signup, subscribe,
};
use store::JsonChatStore;

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    info!("=== TalkShelf Server ===");
    info!("Features: Auth | Rooms | Ordered Message Log | Fact-Check | SSE");

    talkshelf_common::init_structure()?;

    let config = ChatServerConfig::default();
    config.ensure_dirs().await?;

    info!("Storage directory: {:?}", config.storage_dir);
    info!("Users database: {:?}", config.users_db_path);

    let auth = Arc::new(AuthManager::new(&config.users_db_path).await?);
    info!("Auth Manager initialized");

    let store = Arc::new(JsonChatStore::new(config.clone()).await?);
    info!("JSON ChatStore initialized");

    let fact_check = if std::env::var("DISABLE_FACT_CHECK").is_err() {
        info!(
            "[FactCheck] Pipeline initialized (model: {})",
            config.fact_check_model
        );
        Some(Arc::new(FactCheckManager::with_genai(&config, store.clone())))
    } else {
        info!("[FactCheck] Pipeline disabled");
        None
    };

    let app_state = AppState {
        config: config.clone(),
        store,
        auth,
        fact_check,
    };

    let app = Router::new()
        // Auth endpoints
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        // Room registry and membership
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{room_id}/join", post(join_room))
        .route("/rooms/{room_id}/leave", post(leave_room))
        // Message log
        .route(
            "/rooms/{room_id}/messages",
            get(get_messages).post(send_message),
        )
        .route("/rooms/{room_id}/factchecks", get(get_fact_checks))
        // Live subscription (SSE)
        .route("/rooms/{room_id}/subscribe", get(subscribe))
        // Health check
        .route("/health", get(health_check))
        .with_state(app_state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("TalkShelf Chat Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK - TalkShelf Chat Server"
}
