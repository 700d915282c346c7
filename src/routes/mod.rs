pub mod auth;
pub mod health;
pub mod products;
pub mod uploads;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get};
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::config::MediaBackend;
use crate::error::AppError;
use crate::state::AppState;

/// Inline base64 images make request bodies large.
pub const BODY_LIMIT_BYTES: usize = 5 * 1024 * 1024;

/// The full HTTP surface: JSON API, local uploads and the optional
/// static client.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health))
        .merge(auth::router())
        .merge(products::router())
        .merge(users::router())
        .route("/api/{*rest}", any(api_not_found));

    if state.config.media.backend == MediaBackend::Local {
        router = router.merge(uploads::router());
    }

    router = match &state.config.server.static_dir {
        Some(dir) => {
            let index = ServeFile::new(dir.join("index.html"));
            router.fallback_service(ServeDir::new(dir).fallback(index))
        }
        None => router.fallback(not_found),
    };

    router
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn api_not_found() -> AppError {
    AppError::NotFound("Route not found".into())
}

async fn not_found() -> AppError {
    AppError::NotFound("Not found".into())
}
