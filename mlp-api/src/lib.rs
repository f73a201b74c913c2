//! mlp-api library - HTTP service for the Mountain Legacy Project asset manager
//!
//! Every model in the catalog gets the same set of list/show/new/edit/remove
//! routes. A session middleware resolves the caller's role before any
//! handler runs; handlers check that role against the in-memory permission
//! table before touching the database.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use mlp_common::db::Permissions;
use mlp_common::schema::CATALOG;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod pagination;
pub mod routes;

pub use error::{ApiError, ApiResult};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,
    /// Permission table loaded at startup
    pub permissions: Arc<Permissions>,
    /// Directory that `fs_path` values are relative to
    pub library_root: Arc<PathBuf>,
    /// Lifetime of a new login session
    pub session_ttl: chrono::Duration,
    /// Mark the session cookie `Secure`
    pub secure_cookie: bool,
}

impl AppState {
    /// Create new application state with a 24 hour session lifetime
    pub fn new(db: PgPool, permissions: Permissions, library_root: PathBuf) -> Self {
        Self {
            db,
            permissions: Arc::new(permissions),
            library_root: Arc::new(library_root),
            session_ttl: chrono::Duration::hours(24),
            secure_cookie: false,
        }
    }

    pub fn with_sessions(mut self, ttl: chrono::Duration, secure_cookie: bool) -> Self {
        self.session_ttl = ttl;
        self.secure_cookie = secure_cookie;
        self
    }
}

/// Build application router
///
/// `/health` is public. Everything under `/api` passes through the session
/// middleware, which attaches a [`api::auth::Principal`] (a visitor when no
/// valid session cookie is present). Unmatched routes get a JSON 404.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/login", post(api::auth::login))
        .route("/api/logout", post(api::auth::logout))
        .route("/api/auth/session", get(api::auth::current_session))
        .route("/api/users/register", post(api::users::register))
        .route("/api/nodes/show/:id", get(api::nodes::show_node))
        .route("/api/files/list", get(api::files::list_files))
        .route("/api/files/download/raw", get(api::files::download_raw))
        .route("/api/files/download/:id", get(api::files::download))
        .route("/api/options", get(api::options::get_options))
        .route("/api/metadata/:model", get(api::metadata::get_metadata))
        .merge(routes::model_routes(&CATALOG))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::session_middleware,
        ));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .fallback(api::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
