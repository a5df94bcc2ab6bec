use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::feed::FeedClient;

pub mod handlers;
pub mod models;

pub fn create_router(feed: Arc<FeedClient>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/search",
            get(handlers::search_get).post(handlers::search_post),
        )
        .with_state(feed)
        .layer(cors)
}
