mod handlers;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::registry::ProjectRegistry;

pub fn create_router(registry: ProjectRegistry) -> Router {
    let api = Router::new()
        // Registry
        .route("/projects", get(handlers::list_projects))
        .route("/projects", post(handlers::create_project))
        .route("/projects/recent", get(handlers::recent_projects))
        // Project orchestrators
        .route("/projects/{id}", get(handlers::get_project))
        .route("/projects/{id}/setup", post(handlers::setup_project))
        .route("/projects/{id}/sandbox", post(handlers::initialize_sandbox))
        .route("/projects/{id}/config", put(handlers::update_config))
        .route("/projects/{id}/config/sandbox", post(handlers::write_config_to_sandbox))
        // Streams
        .route("/projects/{id}/plan", post(handlers::plan))
        .route("/projects/{id}/iterate", post(handlers::iterate))
        .route("/projects/{id}/events", get(handlers::watch_project))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(registry)
}
