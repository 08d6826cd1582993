//! Club Hub Backend
//!
//! REST data access service for clubs, users and notifications stored in a
//! remote hierarchical tree, plus the local session slot.

mod api;
mod config;
mod db;
mod errors;
mod models;
mod session;
mod store;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use session::SessionStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub sessions: Arc<SessionStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Club Hub Backend");
    tracing::info!("Session database path: {:?}", config.session_db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.database_url.is_some() && config.database_auth.is_none() {
        tracing::warn!("No database auth token configured (CLUBHUB_DATABASE_AUTH)");
    }

    // Open the tree store and local session storage
    let store = db::open_store(&config)?;
    let repo = Arc::new(Repository::new(store));
    let sessions = Arc::new(SessionStore::open(&config.session_db_path).await?);

    let state = AppState { repo, sessions };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Clubs
        .route("/clubs", get(api::list_clubs).post(api::create_club))
        .route("/clubs/by-name/{name}", get(api::get_club_by_name))
        .route("/clubs/{id}", get(api::get_club).patch(api::update_club))
        .route("/clubs/{id}/join-requests", post(api::add_join_request))
        .route("/clubs/{id}/questions", post(api::add_question))
        // Users
        .route("/users", get(api::list_users).post(api::create_user))
        .route("/users/{email}", get(api::get_user))
        .route("/users/{email}/role", put(api::update_user_role))
        .route("/users/{email}/admin-clubs", get(api::list_admin_clubs))
        .route("/users/{email}/is-admin", get(api::get_admin_status))
        .route(
            "/users/{email}/notifications",
            get(api::list_user_notifications),
        )
        .route(
            "/users/{email}/notifications/unread-count",
            get(api::get_unread_count),
        )
        .route(
            "/users/{email}/notifications/read-all",
            post(api::mark_all_notifications_read),
        )
        // Notifications
        .route("/notifications", post(api::create_notification))
        .route("/notifications/{id}", delete(api::delete_notification))
        .route("/notifications/{id}/read", post(api::mark_notification_read))
        // Local session
        .route(
            "/session/current-user",
            get(api::get_current_user)
                .put(api::set_current_user)
                .delete(api::clear_current_user),
        );

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
