//! The create-post pipeline: validate, normalize, stamp, relay.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::domain::{
    error::DomainError,
    posts::{PostFields, parse_image_url},
};

use super::stores::{ContentStore, CreatedPost, StoreError};

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ComposeService {
    store: Arc<dyn ContentStore>,
    allowed_image_hosts: Arc<Vec<String>>,
}

impl ComposeService {
    pub fn new(store: Arc<dyn ContentStore>, allowed_image_hosts: Arc<Vec<String>>) -> Self {
        Self {
            store,
            allowed_image_hosts,
        }
    }

    /// Normalize the submitted fields, stamp `publishedAt` with the current
    /// time, and relay one create mutation to the content store. Either the
    /// mutation succeeds and the store's answer is returned, or it fails and
    /// nothing observable changes.
    pub async fn create_post(&self, fields: PostFields) -> Result<CreatedPost, ComposeError> {
        let image_url = parse_image_url(&fields.main_image)?;
        if !host_allowed(image_url.host_str(), &self.allowed_image_hosts) {
            return Err(DomainError::validation(format!(
                "`mainImage` host `{}` is not an allowed image host",
                image_url.host_str().unwrap_or_default()
            ))
            .into());
        }

        let draft = fields.into_draft(OffsetDateTime::now_utc())?;
        let created = self.store.create_post(&draft).await?;

        metrics::counter!("scrawl_posts_created_total").increment(1);
        info!(
            target = "scrawl::compose",
            title = %draft.title,
            author = %draft.author,
            post_id = created.id.as_deref().unwrap_or(""),
            "post created"
        );
        Ok(created)
    }
}

/// An empty allow-list permits any host; otherwise the host must match one
/// entry, case-insensitively.
pub fn host_allowed(host: Option<&str>, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let Some(host) = host else {
        return false;
    };
    allowed.iter().any(|entry| entry.eq_ignore_ascii_case(host))
}
