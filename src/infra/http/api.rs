//! JSON API surface: the ingest relay and the image upload relay.
//!
//! Failure bodies are generic on purpose; the diagnostic detail travels in
//! the attached `ErrorReport` and ends up in the response log, never in the
//! body.

use std::error::Error as StdError;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use axum_extra::extract::Multipart;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::application::{
    compose::ComposeError, error::ErrorReport, images::ImageError, stores::ImagePayload,
};
use crate::domain::posts::PostFields;

use super::HttpState;

const SOURCE_BASE: &str = "infra::http::api";

pub(super) fn build_routes(upload_body_limit: usize) -> Router<HttpState> {
    Router::new()
        .route("/api/createPost", post(create_post))
        .route(
            "/api/uploadImage",
            post(upload_image).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
}

#[derive(Serialize)]
struct CreatePostResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

#[derive(Serialize)]
struct UploadImageResponse {
    url: String,
}

#[derive(Serialize)]
struct ApiErrorBody {
    error: &'static str,
}

fn api_error(
    source: &'static str,
    status: StatusCode,
    public_message: &'static str,
    err: &dyn StdError,
) -> Response {
    let mut response = (status, Json(ApiErrorBody {
        error: public_message,
    }))
        .into_response();
    ErrorReport::from_error(source, status, err).attach(&mut response);
    response
}

async fn create_post(State(state): State<HttpState>, Json(fields): Json<PostFields>) -> Response {
    const SOURCE: &str = "infra::http::api::create_post";

    match state.compose.create_post(fields).await {
        Ok(created) => Json(CreatePostResponse {
            success: true,
            id: created.id,
        })
        .into_response(),
        Err(ComposeError::Domain(err)) => {
            api_error(SOURCE, StatusCode::BAD_REQUEST, "Invalid post fields", &err)
        }
        Err(ComposeError::Store(err)) => api_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create post",
            &err,
        ),
    }
}

async fn upload_image(State(state): State<HttpState>, mut multipart: Multipart) -> Response {
    const SOURCE: &str = "infra::http::api::upload_image";

    let payload = match read_image_payload(&mut multipart).await {
        Ok(payload) => payload,
        Err(err) => {
            let status = match err {
                UploadPayloadError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return api_error(SOURCE, status, "Invalid image upload", &err);
        }
    };

    match state.images.upload(payload).await {
        Ok(url) => Json(UploadImageResponse { url: url.into() }).into_response(),
        Err(ImageError::Domain(err)) => {
            api_error(SOURCE, StatusCode::BAD_REQUEST, "Invalid image upload", &err)
        }
        Err(ImageError::Host(err)) => {
            api_error(SOURCE, StatusCode::BAD_GATEWAY, "Image upload failed", &err)
        }
    }
}

#[derive(Debug, Error)]
enum UploadPayloadError {
    #[error("multipart request is missing an `image` field")]
    Missing,
    #[error("multipart form data could not be read")]
    InvalidFormData,
    #[error("uploaded file exceeds the request size limit")]
    PayloadTooLarge,
    #[error("failed to read multipart payload: {detail}")]
    Read { detail: String },
}

async fn read_image_payload(
    multipart: &mut Multipart,
) -> Result<ImagePayload, UploadPayloadError> {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("image") {
                    continue;
                }

                let filename = field
                    .file_name()
                    .map(|value| value.to_string())
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| "upload.bin".to_string());

                let content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .unwrap_or_default();

                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| UploadPayloadError::Read {
                        detail: err.to_string(),
                    })?;

                return Ok(ImagePayload {
                    filename,
                    content_type,
                    bytes,
                });
            }
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = SOURCE_BASE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                return Err(match status {
                    StatusCode::PAYLOAD_TOO_LARGE => UploadPayloadError::PayloadTooLarge,
                    StatusCode::BAD_REQUEST => UploadPayloadError::InvalidFormData,
                    _ => UploadPayloadError::Read {
                        detail: err.to_string(),
                    },
                });
            }
        }
    }

    Err(UploadPayloadError::Missing)
}
