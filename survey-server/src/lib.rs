//! survey-server library - session store and HTTP API for the
//! audio-text matching survey

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod store;

use store::SessionStore;

/// Maximum accepted JSON request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    /// Static front-end files served for unmatched paths
    pub site_root: Option<PathBuf>,
}

impl AppState {
    /// Create new application state
    pub fn new(store: SessionStore) -> Self {
        Self {
            store: Arc::new(store),
            site_root: None,
        }
    }

    pub fn with_site_root(mut self, site_root: Option<PathBuf>) -> Self {
        self.site_root = site_root;
        self
    }
}

/// Build application router
///
/// All origins are allowed; the survey page may be hosted elsewhere.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let site_root = state.site_root.clone();

    let api = Router::new()
        .route("/api/session", post(api::ensure_session))
        .route("/api/session/:participant_id", get(api::get_session))
        .route("/api/progress", post(api::save_progress))
        .route("/api/results.json", get(api::results_json))
        .route("/api/results.csv", get(api::results_csv))
        .merge(api::health_routes())
        .with_state(state);

    let router = match site_root {
        Some(root) => api.fallback_service(ServeDir::new(root)),
        None => api,
    };

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
