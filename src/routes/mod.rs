pub mod account;
pub mod admin;
pub mod likes;
pub mod members;
pub mod messages;
pub mod uploads;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::AppResult;
use crate::state::AppState;

/// Assembles the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(account::router())
        .merge(members::router())
        .merge(likes::router())
        .merge(messages::router())
        .merge(admin::router())
        .merge(uploads::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// GET /health
async fn health(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(Json(json!({ "status": "ok", "users": users })))
}
