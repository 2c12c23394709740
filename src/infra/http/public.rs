use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::presentation::views::{IndexTemplate, IndexView, render_template_response};

use super::HttpState;

pub(super) fn build_routes() -> Router<HttpState> {
    Router::new()
        .route("/", get(index))
        .route("/_health", get(health))
}

/// The authoring page: the compose form (hidden until toggled) and every
/// post the store knows about, newest first. A store failure renders the
/// empty-feed placeholder.
async fn index(State(state): State<HttpState>) -> Response {
    let posts = state.feed.load_posts().await;
    let view = IndexView::build(&posts, &state.allowed_image_hosts);
    render_template_response(IndexTemplate { view }, StatusCode::OK)
}

async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
