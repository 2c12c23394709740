mod api;
mod middleware;
mod public;

use std::sync::Arc;

use axum::Router;

use crate::application::{compose::ComposeService, feed::FeedService, images::ImageService};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub compose: Arc<ComposeService>,
    pub images: Arc<ImageService>,
    pub allowed_image_hosts: Arc<Vec<String>>,
}

/// Assemble the full router: the public page plus the JSON API, wrapped in
/// request-context and response-logging middleware.
pub fn build_router(state: HttpState, upload_body_limit: usize) -> Router {
    public::build_routes()
        .merge(api::build_routes(upload_body_limit))
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::log_responses))
        .layer(axum::middleware::from_fn(middleware::set_request_context))
}
