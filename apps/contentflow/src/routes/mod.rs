pub mod health;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::intake::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Profile
        .route(
            "/api/v1/profile",
            post(handlers::handle_create_profile).get(handlers::handle_get_profile),
        )
        .route("/api/v1/credentials", put(handlers::handle_put_credentials))
        // Content requests
        .route(
            "/api/v1/content-requests",
            post(handlers::handle_create_content_request)
                .get(handlers::handle_list_content_requests),
        )
        .route(
            "/api/v1/content-requests/:id",
            get(handlers::handle_get_content_request),
        )
        .route(
            "/api/v1/content-requests/:id/generated",
            get(handlers::handle_list_generated),
        )
        // Generated pieces
        .route(
            "/api/v1/generated/:id",
            get(handlers::handle_get_generated).patch(handlers::handle_edit_generated),
        )
        .route(
            "/api/v1/generated/:id/posted",
            patch(handlers::handle_mark_posted),
        )
        .with_state(state)
}
