//! The operations the wall needs from its hosted backend.
//!
//! Rows and realtime updates go through [`WallBackend`], binary objects through
//! [`PhotoStore`]. [`DbClient`](crate::client::DbClient) and
//! [`StorageClient`](crate::storage::StorageClient) talk to the real services,
//! [`MemoryBackend`](crate::memory::MemoryBackend) keeps everything in process.

use crate::{client::DbError, realtime::ProfileSubscription, storage::StorageError};
use async_trait::async_trait;
use thiserror::Error;
use wall_common::model::{
    Id,
    photo::{PhotoUrl, StoragePath, ValidatedPhoto},
    post::Post,
    profile::{Profile, ProfileMarker},
};

pub type Result<T, E = BackendError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("The backend is unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait WallBackend: Send + Sync {
    /// Cheap round trip used to check connectivity.
    async fn ping(&self) -> Result<()>;

    /// Most recent posts first, at most `limit` of them.
    async fn fetch_recent_posts(&self, limit: u32) -> Result<Vec<Post>>;

    async fn fetch_profile_name(&self, profile_id: Id<ProfileMarker>) -> Result<Option<String>>;

    async fn insert_post(&self, post: &Post) -> Result<()>;

    async fn fetch_profile(&self, profile_id: Id<ProfileMarker>) -> Result<Option<Profile>>;

    /// Inserts the profile or overwrites every field of the existing one.
    async fn upsert_profile(&self, profile: &Profile) -> Result<()>;

    /// Starts delivering update events for one profile until the subscription is dropped.
    async fn subscribe_profile(
        &self,
        profile_id: Id<ProfileMarker>,
    ) -> Result<ProfileSubscription>;
}

#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn upload(&self, path: &StoragePath, photo: &ValidatedPhoto) -> Result<()>;

    fn public_url(&self, path: &StoragePath) -> Result<PhotoUrl>;
}
