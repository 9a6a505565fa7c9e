use futures::future::join_all;
use std::{cmp::Reverse, collections::HashMap, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, warn};
use wall_common::model::{
    Id,
    post::{FeedEntry, Post},
    profile::ProfileMarker,
};
use wall_db::backend::{BackendError, WallBackend};

/// Most posts the feed ever shows.
pub const FEED_LIMIT: u32 = 50;

#[derive(Debug, Error)]
#[error("Fetching the feed failed: {0}")]
pub struct FeedError(#[from] BackendError);

/// The in-memory feed, newest post first.
pub struct FeedStore {
    backend: Arc<dyn WallBackend>,
    entries: Vec<FeedEntry>,
}

impl FeedStore {
    pub fn new(backend: Arc<dyn WallBackend>) -> Self {
        Self {
            backend,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    /// Fetches the most recent posts and joins in their authors' names.
    ///
    /// On failure the previous entries are kept.
    pub async fn load(&mut self) -> Result<&[FeedEntry], FeedError> {
        let posts = match self.backend.fetch_recent_posts(FEED_LIMIT).await {
            Ok(posts) => posts,
            Err(err) => {
                error!(error = %err, "Fetching posts failed, keeping the previous feed");
                return Err(err.into());
            }
        };

        self.entries = self.join_author_names(posts).await;
        debug!(posts = self.entries.len(), "Loaded feed");

        Ok(&self.entries)
    }

    /// Replaces the whole feed with a fresh fetch.
    pub async fn refresh(&mut self) -> Result<&[FeedEntry], FeedError> {
        self.load().await
    }

    async fn join_author_names(&self, posts: Vec<Post>) -> Vec<FeedEntry> {
        let mut author_ids = posts.iter().map(|post| post.author_id).collect::<Vec<_>>();
        author_ids.sort_unstable();
        author_ids.dedup();

        let lookups = author_ids.into_iter().map(|author_id| async move {
            let name = self
                .backend
                .fetch_profile_name(author_id)
                .await
                .unwrap_or_else(|err| {
                    warn!(error = %err, %author_id, "Author name lookup failed");
                    None
                });
            (author_id, name)
        });
        let names: HashMap<Id<ProfileMarker>, Option<String>> =
            join_all(lookups).await.into_iter().collect();

        let mut entries = posts
            .into_iter()
            .map(|post| {
                let name = names.get(&post.author_id).cloned().flatten();
                FeedEntry::new(post, name)
            })
            .collect::<Vec<_>>();
        entries.sort_by_key(|entry| Reverse(entry.post.timestamp));
        entries
    }
}
