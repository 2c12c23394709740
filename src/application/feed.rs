//! Read side of the page: every post, newest first.

use std::sync::Arc;

use tracing::error;

use crate::domain::posts::{PostRecord, sort_newest_first};

use super::stores::ContentStore;

pub struct FeedService {
    store: Arc<dyn ContentStore>,
}

impl FeedService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Posts for the index page. A store failure degrades to the empty list;
    /// the page shows its placeholder and the failure goes to the log.
    pub async fn load_posts(&self) -> Vec<PostRecord> {
        match self.store.list_posts().await {
            Ok(mut posts) => {
                sort_newest_first(&mut posts);
                posts
            }
            Err(err) => {
                error!(
                    target = "scrawl::feed",
                    error = %err,
                    "failed to query posts; rendering empty feed"
                );
                Vec::new()
            }
        }
    }
}
