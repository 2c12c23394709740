//! Image upload pipeline: one file in, one public URL out.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::domain::error::DomainError;

use super::stores::{ImageHost, ImagePayload, StoreError};

#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Host(#[from] StoreError),
}

pub struct ImageService {
    host: Arc<dyn ImageHost>,
}

impl ImageService {
    pub fn new(host: Arc<dyn ImageHost>) -> Self {
        Self { host }
    }

    pub async fn upload(&self, payload: ImagePayload) -> Result<Url, ImageError> {
        if payload.bytes.is_empty() {
            return Err(DomainError::validation("uploaded image file is empty").into());
        }

        let size = payload.bytes.len();
        let filename = payload.filename.clone();
        let url = self.host.upload(payload).await?;

        metrics::counter!("scrawl_images_uploaded_total").increment(1);
        info!(
            target = "scrawl::images",
            filename = %filename,
            bytes = size,
            url = %url,
            "image uploaded"
        );
        Ok(url)
    }
}
