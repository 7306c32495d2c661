//! Operator endpoints, mounted under `admin.path_prefix` and guarded by a bearer key.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/routes", get(get_routes))
        .route("/errors", get(get_errors))
        .route("/reload", post(post_reload))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
