use crate::feed::FeedStore;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use wall_common::{
    identity::IdentityProvider,
    model::{
        photo::PhotoUrl,
        post::{InvalidPostMessageError, POST_MESSAGE_MAX_LEN, Post, PostMessage},
    },
};
use wall_db::backend::{BackendError, WallBackend};

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("A post needs a message or a photo")]
    Empty,
    #[error(transparent)]
    Message(#[from] InvalidPostMessageError),
    #[error("Publishing the post failed: {0}")]
    Write(#[from] BackendError),
}

/// A post that has not been submitted yet.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct Draft {
    pub text: String,
    pub photo_url: Option<PhotoUrl>,
}

impl Draft {
    #[must_use]
    pub fn remaining_characters(&self) -> usize {
        POST_MESSAGE_MAX_LEN.saturating_sub(self.text.chars().count())
    }
}

pub struct Composer {
    backend: Arc<dyn WallBackend>,
    identity: Arc<dyn IdentityProvider>,
    draft: Draft,
}

impl Composer {
    pub fn new(backend: Arc<dyn WallBackend>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            backend,
            identity,
            draft: Draft::default(),
        }
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Replaces the draft text, cutting it off at the message length limit.
    pub fn set_text(&mut self, text: &str) {
        self.draft.text = text.chars().take(POST_MESSAGE_MAX_LEN).collect();
    }

    pub fn attach_photo(&mut self, photo_url: PhotoUrl) {
        self.draft.photo_url = Some(photo_url);
    }

    /// Publishes the draft and refreshes `feed`.
    ///
    /// The draft is cleared only after the post was written, so a failed submit can be
    /// retried as is. A failed refresh is logged but does not fail the submit.
    pub async fn submit(&mut self, feed: &mut FeedStore) -> Result<Post, ComposeError> {
        let text = self.draft.text.trim();
        if text.is_empty() && self.draft.photo_url.is_none() {
            debug!("Rejecting empty post");
            return Err(ComposeError::Empty);
        }

        let message = PostMessage::new(text.to_owned())?;
        let post = Post::new(
            self.identity.current(),
            message,
            self.draft.photo_url.clone(),
        );

        if let Err(err) = self.backend.insert_post(&post).await {
            error!(error = %err, post_id = %post.id, "Post insert failed");
            return Err(err.into());
        }

        info!(post_id = %post.id, "Published post");
        self.draft = Draft::default();

        if let Err(err) = feed.refresh().await {
            warn!(error = %err, "Refreshing the feed after posting failed");
        }

        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        composer::{ComposeError, Composer},
        feed::FeedStore,
    };
    use std::sync::Arc;
    use time::OffsetDateTime;
    use wall_common::{
        identity::{FixedIdentity, PUBLIC_PROFILE_ID},
        model::{photo::PhotoUrl, post::POST_MESSAGE_MAX_LEN, profile::Profile},
    };
    use wall_db::{
        backend::WallBackend,
        memory::{Failures, MemoryBackend},
    };

    async fn setup() -> (Arc<MemoryBackend>, Composer, FeedStore) {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .upsert_profile(&Profile::with_defaults(PUBLIC_PROFILE_ID))
            .await
            .unwrap();

        let identity = Arc::new(FixedIdentity::default());
        let composer = Composer::new(backend.clone(), identity);
        let feed = FeedStore::new(backend.clone());

        (backend, composer, feed)
    }

    #[tokio::test]
    async fn submitted_post_leads_the_refreshed_feed() {
        let (_backend, mut composer, mut feed) = setup().await;
        let submitted_at = OffsetDateTime::now_utc();

        composer.set_text("Hello");
        let post = composer.submit(&mut feed).await.unwrap();

        let first = &feed.entries()[0];
        assert_eq!(first.post.message.get(), "Hello");
        assert_eq!(first.post.id, post.id);
        assert!(!first.post.id.get().is_nil());
        assert!(first.post.timestamp >= submitted_at);
        assert_eq!(first.post.author_id, PUBLIC_PROFILE_ID);
        assert_eq!(composer.draft().text, "");
    }

    #[tokio::test]
    async fn every_submission_ends_up_in_order() {
        let (_backend, mut composer, mut feed) = setup().await;

        for message in ["one", "two", "three"] {
            composer.set_text(message);
            composer.submit(&mut feed).await.unwrap();
        }

        let messages = feed
            .entries()
            .iter()
            .map(|entry| entry.post.message.get())
            .collect::<Vec<_>>();
        assert_eq!(messages.len(), 3);
        for message in ["one", "two", "three"] {
            assert!(messages.contains(&message));
        }
        assert!(
            feed.entries()
                .windows(2)
                .all(|pair| pair[0].post.timestamp >= pair[1].post.timestamp)
        );
    }

    #[tokio::test]
    async fn blank_post_without_photo_is_never_written() {
        let (backend, mut composer, mut feed) = setup().await;

        for text in ["", "   \n\t"] {
            composer.set_text(text);
            assert!(matches!(
                composer.submit(&mut feed).await,
                Err(ComposeError::Empty)
            ));
        }

        assert_eq!(backend.calls().await.post_inserts, 0);
    }

    #[tokio::test]
    async fn photo_only_post_is_allowed_and_clears_the_draft() {
        let (_backend, mut composer, mut feed) = setup().await;
        let photo = PhotoUrl::new("memory://wall-photos/public/cat.png".to_owned()).unwrap();

        composer.attach_photo(photo.clone());
        let post = composer.submit(&mut feed).await.unwrap();

        assert!(post.message.is_empty());
        assert_eq!(post.photo_url, Some(photo));
        assert_eq!(composer.draft().photo_url, None);
    }

    #[tokio::test]
    async fn failed_write_keeps_the_draft() {
        let (backend, mut composer, mut feed) = setup().await;
        let photo = PhotoUrl::new("memory://wall-photos/public/cat.png".to_owned()).unwrap();
        backend
            .set_failures(Failures {
                insert_post: true,
                ..Failures::default()
            })
            .await;

        composer.set_text("  try again  ");
        composer.attach_photo(photo.clone());
        assert!(matches!(
            composer.submit(&mut feed).await,
            Err(ComposeError::Write(_))
        ));

        assert_eq!(composer.draft().text, "  try again  ");
        assert_eq!(composer.draft().photo_url, Some(photo));
        assert!(feed.entries().is_empty());

        backend.set_failures(Failures::default()).await;
        let post = composer.submit(&mut feed).await.unwrap();
        assert_eq!(post.message.get(), "try again");
    }

    #[test]
    fn text_is_cut_off_at_the_limit() {
        let backend = Arc::new(MemoryBackend::new());
        let mut composer = Composer::new(backend, Arc::new(FixedIdentity::default()));

        composer.set_text(&"a".repeat(POST_MESSAGE_MAX_LEN + 20));

        assert_eq!(composer.draft().text.chars().count(), POST_MESSAGE_MAX_LEN);
        assert_eq!(composer.draft().remaining_characters(), 0);
    }
}
