//! An in-process backend.
//!
//! Used when no database is configured and throughout the tests, which rely on its
//! call counters and injectable failures.

use crate::{
    backend::{BackendError, PhotoStore, Result, WallBackend},
    realtime::ProfileSubscription,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{cmp::Reverse, collections::HashMap};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use wall_common::model::{
    Id,
    photo::{PhotoUrl, StoragePath, ValidatedPhoto},
    post::Post,
    profile::{Profile, ProfileChange, ProfileMarker},
};

pub const MEMORY_PHOTO_BASE_URL: &str = "memory://wall-photos";

/// How many times each write or lookup reached the backend.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CallCounts {
    pub post_fetches: usize,
    pub name_lookups: usize,
    pub post_inserts: usize,
    pub profile_fetches: usize,
    pub profile_upserts: usize,
    pub uploads: usize,
}

/// Operations that should fail until reset.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Failures {
    pub fetch_posts: bool,
    pub name_lookups: bool,
    pub insert_post: bool,
    pub fetch_profile: bool,
    pub upsert_profile: bool,
    pub upload: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    posts: Vec<Post>,
    profiles: HashMap<Id<ProfileMarker>, Profile>,
    objects: HashMap<StoragePath, Bytes>,
    subscribers: Vec<(Id<ProfileMarker>, mpsc::Sender<ProfileChange>)>,
    calls: CallCounts,
    failures: Failures,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

fn fail_if(failing: bool, operation: &str) -> Result<()> {
    if failing {
        Err(BackendError::Unavailable(format!("{operation} failed")))
    } else {
        Ok(())
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_failures(&self, failures: Failures) {
        self.state.lock().await.failures = failures;
    }

    pub async fn calls(&self) -> CallCounts {
        self.state.lock().await.calls
    }

    /// Subscriptions whose receiving side is still alive.
    pub async fn active_subscriptions(&self) -> usize {
        self.state
            .lock()
            .await
            .subscribers
            .iter()
            .filter(|(_, sender)| !sender.is_closed())
            .count()
    }

    pub async fn object(&self, path: &StoragePath) -> Option<Bytes> {
        self.state.lock().await.objects.get(path).cloned()
    }

    pub async fn object_count(&self) -> usize {
        self.state.lock().await.objects.len()
    }
}

#[async_trait]
impl WallBackend for MemoryBackend {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_recent_posts(&self, limit: u32) -> Result<Vec<Post>> {
        let mut state = self.state.lock().await;
        state.calls.post_fetches += 1;
        fail_if(state.failures.fetch_posts, "Fetching posts")?;

        let mut posts = state.posts.clone();
        posts.sort_by_key(|post| Reverse(post.timestamp));
        posts.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(posts)
    }

    async fn fetch_profile_name(&self, profile_id: Id<ProfileMarker>) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        state.calls.name_lookups += 1;
        fail_if(state.failures.name_lookups, "Looking up profile name")?;

        Ok(state
            .profiles
            .get(&profile_id)
            .map(|profile| profile.details.name.clone()))
    }

    async fn insert_post(&self, post: &Post) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.post_inserts += 1;
        fail_if(state.failures.insert_post, "Inserting post")?;

        if state.posts.iter().any(|existing| existing.id == post.id) {
            return Err(BackendError::Unavailable(format!(
                "Post {} already exists",
                post.id
            )));
        }

        state.posts.push(post.clone());
        Ok(())
    }

    async fn fetch_profile(&self, profile_id: Id<ProfileMarker>) -> Result<Option<Profile>> {
        let mut state = self.state.lock().await;
        state.calls.profile_fetches += 1;
        fail_if(state.failures.fetch_profile, "Fetching profile")?;

        Ok(state.profiles.get(&profile_id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.profile_upserts += 1;
        fail_if(state.failures.upsert_profile, "Upserting profile")?;

        let updated = state
            .profiles
            .insert(profile.id, profile.clone())
            .is_some();

        // Only updates are published, like the database trigger.
        if updated {
            let change = ProfileChange::from(profile.details.clone());

            state.subscribers.retain(|(_, sender)| !sender.is_closed());
            for (_, sender) in state
                .subscribers
                .iter()
                .filter(|(subscribed_id, _)| *subscribed_id == profile.id)
            {
                if sender.try_send(change.clone()).is_err() {
                    warn!(profile_id = %profile.id, "Dropping profile change for full subscriber");
                }
            }
        }

        Ok(())
    }

    async fn subscribe_profile(
        &self,
        profile_id: Id<ProfileMarker>,
    ) -> Result<ProfileSubscription> {
        let (sender, subscription) = ProfileSubscription::channel(profile_id);
        self.state
            .lock()
            .await
            .subscribers
            .push((profile_id, sender));

        debug!(%profile_id, "Subscribed to in-memory profile updates");
        Ok(subscription)
    }
}

#[async_trait]
impl PhotoStore for MemoryBackend {
    async fn upload(&self, path: &StoragePath, photo: &ValidatedPhoto) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.uploads += 1;
        fail_if(state.failures.upload, "Uploading photo")?;

        state.objects.insert(path.clone(), photo.bytes().clone());
        Ok(())
    }

    fn public_url(&self, path: &StoragePath) -> Result<PhotoUrl> {
        PhotoUrl::new(format!("{MEMORY_PHOTO_BASE_URL}/{path}"))
            .map_err(|err| BackendError::Unavailable(err.to_string()))
    }
}
