use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/public/{username}", get(handlers::get_public_profile))
        .route("/username-available/{username}", get(handlers::check_username));

    let protected_routes = Router::new()
        .route("/me", get(handlers::get_my_profile).put(handlers::update_my_profile))
        .route("/me/complete", post(handlers::complete_my_profile))
        .route("/me/share-link", get(handlers::get_share_link))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
