//! Ports to the two remote resources: the content store and the image host.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::domain::posts::{PostDraft, PostRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("upstream responded with status {status}: {detail}")]
    UpstreamStatus { status: u16, detail: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

impl StoreError {
    pub fn upstream_status(status: u16, detail: impl Into<String>) -> Self {
        Self::UpstreamStatus {
            status,
            detail: detail.into(),
        }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self::Transport(detail.into())
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedResponse(detail.into())
    }
}

/// Outcome of a create mutation. The id is optional: a store may acknowledge
/// the mutation without echoing the assigned document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPost {
    pub id: Option<String>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Submit one create mutation for `draft`.
    async fn create_post(&self, draft: &PostDraft) -> Result<CreatedPost, StoreError>;

    /// Fetch every post document, unordered.
    async fn list_posts(&self) -> Result<Vec<PostRecord>, StoreError>;
}

/// One image file as received from the compose form.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload the payload and return its public URL.
    async fn upload(&self, payload: ImagePayload) -> Result<Url, StoreError>;
}
