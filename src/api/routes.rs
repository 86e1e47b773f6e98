use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/models", get(handlers::list_models))
        .route("/predict/:model_name", post(handlers::predict))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics));

    // Unmatched paths serve the frontend, falling back to index.html
    let router = match state.frontend_dir.as_deref() {
        Some(dir) if dir.is_dir() => {
            info!(dir = %dir.display(), "Serving frontend");
            router.fallback_service(
                ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
            )
        }
        Some(dir) => {
            warn!(dir = %dir.display(), "Frontend directory not found, not serving it");
            router.fallback(handlers::not_found)
        }
        None => router.fallback(handlers::not_found),
    };

    router.with_state(state).layer(cors)
}
