use crate::{
    composer::{ComposeError, Composer},
    feed::{FeedError, FeedStore},
    photo::{PhotoUploadError, PhotoUploader},
    profile::{ProfileError, ProfileStore, ProfileView},
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use wall_common::{
    identity::IdentityProvider,
    model::{
        photo::{PhotoFile, PhotoUrl},
        post::Post,
    },
};
use wall_db::{
    backend::{PhotoStore, WallBackend},
    realtime::ProfileSubscription,
};

/// The wall shared by all requests.
///
/// Requests that read or write the wall's state run one at a time under this lock.
/// Photo uploads happen before it is taken.
pub type SharedWall = Arc<Mutex<Wall>>;

#[derive(Debug, Error)]
pub enum WallError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Photo(#[from] PhotoUploadError),
}

/// Everything one visitor of the wall sees and edits.
pub struct Wall {
    pub feed: FeedStore,
    pub profile: ProfileStore,
    pub composer: Composer,
    pub photos: PhotoUploader,
}

impl Wall {
    pub fn new(
        backend: Arc<dyn WallBackend>,
        photo_store: Arc<dyn PhotoStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            feed: FeedStore::new(Arc::clone(&backend)),
            profile: ProfileStore::new(Arc::clone(&backend), Arc::clone(&identity)),
            composer: Composer::new(backend, identity),
            photos: PhotoUploader::new(photo_store),
        }
    }

    /// Loads the feed and the profile. Both are attempted even if one fails.
    pub async fn load(&mut self) -> Result<(), WallError> {
        let (feed, profile) = tokio::join!(self.feed.load(), self.profile.load());
        let posts = feed?.len();
        profile?;

        debug!(posts, "Loaded wall");
        Ok(())
    }

    pub async fn submit_post(&mut self) -> Result<Post, WallError> {
        Ok(self.composer.submit(&mut self.feed).await?)
    }
}

/// Uploads a photo and keeps it as the draft's pending photo.
pub async fn attach_post_photo(wall: &SharedWall, file: PhotoFile) -> Result<PhotoUrl, WallError> {
    let photos = wall.lock().await.photos.clone();
    let url = photos.upload(file).await?;
    wall.lock().await.composer.attach_photo(url.clone());

    Ok(url)
}

/// Uploads a photo and saves it as the profile photo right away.
pub async fn change_profile_photo(
    wall: &SharedWall,
    file: PhotoFile,
) -> Result<ProfileView, WallError> {
    let photos = wall.lock().await.photos.clone();
    let url = photos.upload(file).await?;

    let mut wall = wall.lock().await;
    wall.profile.replace_photo(url).await?;
    Ok(wall.profile.view())
}

/// Applies every change from `subscription` to the wall's profile until the source
/// goes away.
pub async fn follow_profile(wall: SharedWall, mut subscription: ProfileSubscription) {
    let profile_id = subscription.profile_id();
    info!(%profile_id, "Following profile updates");

    while let Some(change) = subscription.recv().await {
        wall.lock().await.profile.apply_change(change);
    }

    debug!(%profile_id, "Profile updates ended");
}
