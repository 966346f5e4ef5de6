use axum::routing::post;
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/account/register", post(handlers::register))
        .route("/api/account/login", post(handlers::login))
        .route("/api/account/logout", post(handlers::logout))
}
