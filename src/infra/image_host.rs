//! HTTP adapter for the external image host.
//!
//! The host takes a multipart form with an `image` field, keyed by an API
//! credential in the query string, and answers with JSON carrying the public
//! URL on success or an error message on failure.

use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use url::Url;

use crate::application::stores::{ImageHost, ImagePayload, StoreError};

use super::content_store::user_agent;
use super::error::InfraError;

pub struct HttpImageHost {
    client: Client,
    upload_url: Url,
    api_key: String,
}

impl HttpImageHost {
    pub fn new(upload_url: Url, api_key: impl Into<String>) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build HTTP client: {err}"))
            })?;

        Ok(Self {
            client,
            upload_url,
            api_key: api_key.into(),
        })
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    data: Option<UploadData>,
    error: Option<UploadErrorBody>,
}

#[derive(Deserialize)]
struct UploadData {
    url: String,
}

#[derive(Deserialize)]
struct UploadErrorBody {
    message: Option<String>,
}

#[async_trait]
impl ImageHost for HttpImageHost {
    async fn upload(&self, payload: ImagePayload) -> Result<Url, StoreError> {
        let mut url = self.upload_url.clone();
        url.query_pairs_mut().append_pair("key", &self.api_key);

        let form = Form::new().part("image", build_image_part(&payload));

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| StoreError::transport(err.to_string()))
            .inspect_err(note_failure)?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| StoreError::transport(err.to_string()))
            .inspect_err(note_failure)?;

        if !status.is_success() {
            let detail = match serde_json::from_slice::<UploadResponse>(&bytes) {
                Ok(UploadResponse {
                    error: Some(UploadErrorBody {
                        message: Some(message),
                    }),
                    ..
                }) => message,
                _ => String::from_utf8_lossy(&bytes).into_owned(),
            };
            let err = StoreError::upstream_status(status.as_u16(), detail);
            note_failure(&err);
            return Err(err);
        }

        let parsed: UploadResponse = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::malformed(format!("upload response: {err}")))
            .inspect_err(note_failure)?;

        let raw = parsed
            .data
            .map(|data| data.url)
            .ok_or_else(|| StoreError::malformed("upload response is missing `data.url`"))
            .inspect_err(note_failure)?;

        Url::parse(&raw)
            .map_err(|err| StoreError::malformed(format!("upload URL `{raw}`: {err}")))
            .inspect_err(note_failure)
    }
}

/// The host needs a filename and a content type on the part; fall back to a
/// guess from the filename, then to octet-stream, rather than failing the
/// upload over a label.
fn build_image_part(payload: &ImagePayload) -> Part {
    let mime = if payload.content_type.trim().is_empty() {
        mime_guess::from_path(&payload.filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    } else {
        payload.content_type.clone()
    };

    let part = Part::bytes(payload.bytes.to_vec()).file_name(payload.filename.clone());
    match part.mime_str(&mime) {
        Ok(part) => part,
        Err(_) => Part::bytes(payload.bytes.to_vec()).file_name(payload.filename.clone()),
    }
}

fn note_failure(_err: &StoreError) {
    metrics::counter!("scrawl_store_failures_total").increment(1);
}
